//! Region descriptors and the addressing capability handed to callers

use crate::storage::MemoryKind;

/// Kind-specific part of a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Backing {
    Host { key: String, offset: usize },
    Device { device_id: i32 },
}

/// Registry record for one registered region
#[derive(Debug)]
pub(crate) struct RegionDescriptor {
    pub name: String,
    pub backing: Backing,
    pub byte_size: usize,
    /// Mapping base (host) or opened device pointer (device)
    pub base_address: u64,
}

impl RegionDescriptor {
    pub fn kind(&self) -> MemoryKind {
        match self.backing {
            Backing::Host { .. } => MemoryKind::Host,
            Backing::Device { .. } => MemoryKind::Device,
        }
    }

    pub fn device_id(&self) -> i32 {
        match self.backing {
            Backing::Host { .. } => 0,
            Backing::Device { device_id } => device_id,
        }
    }

    /// Address of `extra_offset` within the region.
    ///
    /// Host regions add their registration offset on top of the mapping base;
    /// device regions are always addressed from the opened pointer.
    pub fn address_at(&self, extra_offset: usize) -> u64 {
        match self.backing {
            Backing::Host { offset, .. } => {
                self.base_address + offset as u64 + extra_offset as u64
            }
            Backing::Device { .. } => self.base_address + extra_offset as u64,
        }
    }

    /// Bytes reachable from `address_at(extra_offset)` without leaving the
    /// mapping `[base_address, base_address + byte_size)`.
    pub fn len_at(&self, extra_offset: usize) -> usize {
        match self.backing {
            Backing::Host { offset, .. } => self
                .byte_size
                .saturating_sub(offset.saturating_add(extra_offset)),
            Backing::Device { .. } => self.byte_size.saturating_sub(extra_offset),
        }
    }
}

/// Bounded view of a registered region, returned by lookups
///
/// Carries the effective address and the number of bytes a caller may touch
/// from it. The view does not keep the region alive: it is only valid until
/// the region is unregistered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionView {
    addr: u64,
    len: usize,
    kind: MemoryKind,
    device_id: i32,
}

impl RegionView {
    pub(crate) fn new(addr: u64, len: usize, kind: MemoryKind, device_id: i32) -> Self {
        Self {
            addr,
            len,
            kind,
            device_id,
        }
    }

    /// Effective address
    pub fn addr(&self) -> u64 {
        self.addr
    }

    /// Bytes available from `addr`
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn kind(&self) -> MemoryKind {
        self.kind
    }

    /// Device id (0 for host regions)
    pub fn device_id(&self) -> i32 {
        self.device_id
    }

    /// Host pointer (only for host regions)
    pub fn as_host_ptr(&self) -> Option<*mut u8> {
        match self.kind {
            MemoryKind::Host => Some(self.addr as usize as *mut u8),
            MemoryKind::Device => None,
        }
    }

    /// Device pointer (only for device regions)
    pub fn as_device_ptr(&self) -> Option<u64> {
        match self.kind {
            MemoryKind::Device => Some(self.addr),
            MemoryKind::Host => None,
        }
    }

    /// Get a mutable slice over a host view
    ///
    /// # Safety
    /// The region must stay registered for `'a` and the caller must ensure no
    /// other writer aliases the returned bytes.
    pub unsafe fn as_host_slice_mut<'a>(&self) -> Option<&'a mut [u8]> {
        let ptr = self.as_host_ptr()?;
        Some(std::slice::from_raw_parts_mut(ptr, self.len))
    }
}
