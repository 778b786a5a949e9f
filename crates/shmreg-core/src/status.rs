//! Region status summaries

use crate::region::{Backing, RegionDescriptor};
use crate::storage::MemoryKind;

/// Kind-specific status fields
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegionDetail {
    Host { key: String, offset: usize },
    Device { device_id: i32 },
}

/// Summary of one registered region
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionStatus {
    pub name: String,
    pub detail: RegionDetail,
    pub byte_size: usize,
}

impl RegionStatus {
    pub fn kind(&self) -> MemoryKind {
        match self.detail {
            RegionDetail::Host { .. } => MemoryKind::Host,
            RegionDetail::Device { .. } => MemoryKind::Device,
        }
    }

    /// Backing key (host regions only)
    pub fn key(&self) -> Option<&str> {
        match &self.detail {
            RegionDetail::Host { key, .. } => Some(key),
            RegionDetail::Device { .. } => None,
        }
    }

    /// Device id (device regions only)
    pub fn device_id(&self) -> Option<i32> {
        match self.detail {
            RegionDetail::Device { device_id } => Some(device_id),
            RegionDetail::Host { .. } => None,
        }
    }
}

impl RegionStatus {
    pub(crate) fn from_descriptor(desc: &RegionDescriptor) -> Self {
        let detail = match &desc.backing {
            Backing::Host { key, offset } => RegionDetail::Host {
                key: key.clone(),
                offset: *offset,
            },
            Backing::Device { device_id } => RegionDetail::Device {
                device_id: *device_id,
            },
        };
        Self {
            name: desc.name.clone(),
            detail,
            byte_size: desc.byte_size,
        }
    }
}
