//! POSIX shared memory backend

use crate::backend::{BackingId, HostBackend};
use crate::error::BackendError;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{mmap, munmap, shm_open, MapFlags, ProtFlags};
use nix::sys::stat::{fstat, Mode};
use std::num::NonZeroUsize;
use std::os::fd::{BorrowedFd, IntoRawFd, RawFd};
use std::ptr::NonNull;

/// Default permission bits used when opening a backing object
pub const DEFAULT_SHM_MODE: u32 = 0o600;

/// Host backend over `shm_open` and `mmap`
#[derive(Debug, Clone, Copy)]
pub struct PosixShm {
    mode: Mode,
}

impl Default for PosixShm {
    fn default() -> Self {
        Self::with_mode(DEFAULT_SHM_MODE)
    }
}

impl PosixShm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given permission bits for `shm_open`
    pub fn with_mode(mode: u32) -> Self {
        Self {
            mode: Mode::from_bits_truncate(mode as _),
        }
    }
}

impl HostBackend for PosixShm {
    fn open(&self, key: &str) -> Result<RawFd, BackendError> {
        let fd = shm_open(key, OFlag::O_RDWR, self.mode).map_err(|errno| BackendError::Open {
            key: key.to_string(),
            errno,
        })?;
        // Ownership moves to the registry, which closes it explicitly to observe failures.
        Ok(fd.into_raw_fd())
    }

    fn identify(&self, fd: RawFd) -> Result<BackingId, BackendError> {
        let stat = fstat(fd).map_err(BackendError::Stat)?;
        Ok(BackingId {
            dev: stat.st_dev as u64,
            ino: stat.st_ino as u64,
        })
    }

    fn map(&self, fd: RawFd, offset: usize, byte_size: usize) -> Result<u64, BackendError> {
        let length = NonZeroUsize::new(byte_size).ok_or(BackendError::Map(Errno::EINVAL))?;
        let offset = i64::try_from(offset).map_err(|_| BackendError::Map(Errno::EOVERFLOW))?;

        // SAFETY: fd stays open for the duration of this call.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let addr = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                borrowed,
                offset as _,
            )
        }
        .map_err(BackendError::Map)?;

        Ok(addr.as_ptr() as usize as u64)
    }

    fn close(&self, fd: RawFd) -> Result<(), BackendError> {
        nix::unistd::close(fd).map_err(BackendError::Close)
    }

    fn unmap(&self, addr: u64, byte_size: usize) -> Result<(), BackendError> {
        let ptr = NonNull::new(addr as usize as *mut std::ffi::c_void)
            .ok_or(BackendError::Unmap(Errno::EINVAL))?;
        // SAFETY: addr and byte_size come from a mapping created by `map`.
        unsafe { munmap(ptr, byte_size) }.map_err(BackendError::Unmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_object() {
        let shm = PosixShm::new();
        let err = shm.open("/shmreg_definitely_missing_object").unwrap_err();
        assert!(matches!(err, BackendError::Open { errno: Errno::ENOENT, .. }));
    }

    #[test]
    fn test_zero_length_map_rejected() {
        let shm = PosixShm::new();
        assert_eq!(shm.map(-1, 0, 0), Err(BackendError::Map(Errno::EINVAL)));
    }

    #[test]
    fn test_unmap_null_rejected() {
        let shm = PosixShm::new();
        assert_eq!(shm.unmap(0, 4096), Err(BackendError::Unmap(Errno::EINVAL)));
    }
}
