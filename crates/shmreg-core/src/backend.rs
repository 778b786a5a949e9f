//! Backing strategies plugged into the manager
//!
//! Host regions go through a [`HostBackend`] (open, map, close, unmap) and
//! device regions through a [`DeviceBackend`] (open and close an IPC handle).
//! Both hand back a plain base address so the registry stays kind-agnostic.

use crate::error::BackendError;
use std::os::fd::RawFd;

/// CUDA IPC handle size in bytes (kept in every build for boundary compatibility)
pub const CUDA_IPC_HANDLE_SIZE: usize = 64;

/// CUDA IPC memory handle (64 bytes)
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct CudaIpcHandle {
    pub reserved: [u8; CUDA_IPC_HANDLE_SIZE],
}

impl Default for CudaIpcHandle {
    fn default() -> Self {
        Self {
            reserved: [0u8; CUDA_IPC_HANDLE_SIZE],
        }
    }
}

impl CudaIpcHandle {
    /// Build a handle from raw bytes received over the wire
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let reserved = bytes.try_into().ok()?;
        Some(Self { reserved })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.reserved
    }
}

impl std::fmt::Debug for CudaIpcHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaIpcHandle").finish_non_exhaustive()
    }
}

/// Identity of the OS object behind a backing key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackingId {
    pub dev: u64,
    pub ino: u64,
}

/// Host-mapped region strategy
pub trait HostBackend: Send {
    /// Open the named backing object, returning a raw descriptor
    fn open(&self, key: &str) -> Result<RawFd, BackendError>;

    /// Identify the object behind an open descriptor
    fn identify(&self, fd: RawFd) -> Result<BackingId, BackendError>;

    /// Map `byte_size` bytes at `offset` read/write, returning the base address
    fn map(&self, fd: RawFd, offset: usize, byte_size: usize) -> Result<u64, BackendError>;

    fn close(&self, fd: RawFd) -> Result<(), BackendError>;

    fn unmap(&self, addr: u64, byte_size: usize) -> Result<(), BackendError>;
}

/// Device-IPC region strategy
pub trait DeviceBackend: Send {
    /// Make `device_id` current and open the handle, returning the device pointer
    fn open_ipc(&self, handle: &CudaIpcHandle, device_id: i32) -> Result<u64, BackendError>;

    fn close_ipc(&self, addr: u64, device_id: i32) -> Result<(), BackendError>;
}

/// Device backend for builds without GPU support
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDeviceSupport;

impl DeviceBackend for NoDeviceSupport {
    fn open_ipc(&self, _handle: &CudaIpcHandle, _device_id: i32) -> Result<u64, BackendError> {
        Err(BackendError::DeviceUnsupported)
    }

    fn close_ipc(&self, _addr: u64, _device_id: i32) -> Result<(), BackendError> {
        Err(BackendError::DeviceUnsupported)
    }
}
