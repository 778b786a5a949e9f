//! Memory kind definitions

use std::fmt;

/// Where a registered region lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemoryKind {
    /// POSIX shared memory mapped into this process
    Host,
    /// Device memory opened from a CUDA IPC handle
    Device,
}

impl MemoryKind {
    /// The other kind
    pub fn other(self) -> Self {
        match self {
            MemoryKind::Host => MemoryKind::Device,
            MemoryKind::Device => MemoryKind::Host,
        }
    }

    /// Whether a region of this kind passes an optional kind filter
    pub fn matches(self, filter: Option<MemoryKind>) -> bool {
        filter.map_or(true, |k| k == self)
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryKind::Host => f.write_str("system shared memory"),
            MemoryKind::Device => f.write_str("CUDA shared memory"),
        }
    }
}
