//! Manager configuration

use crate::shm::DEFAULT_SHM_MODE;

/// Settings for the default backends
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ManagerConfig {
    /// Permission bits passed to `shm_open` when opening backing objects
    pub shm_mode: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            shm_mode: DEFAULT_SHM_MODE,
        }
    }
}
