//! Failure-injecting backends shared by the registry tests

#![allow(dead_code)]

use nix::errno::Errno;
use parking_lot::Mutex;
use shmreg_core::{BackendError, BackingId, CudaIpcHandle, DeviceBackend, HostBackend};
use std::collections::{HashMap, HashSet};
use std::os::fd::RawFd;
use std::sync::Arc;

pub const HOST_BASE: u64 = 0x1000_0000;
pub const DEVICE_BASE: u64 = 0x7f00_0000_0000;
const STRIDE: u64 = 0x10_0000;

/// One live mock mapping of `len` bytes taken from `offset` in the object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub offset: usize,
    pub len: usize,
}

#[derive(Debug)]
pub struct HostState {
    next_fd: RawFd,
    next_addr: u64,
    /// Descriptors currently open, by key
    pub open_fds: HashMap<RawFd, String>,
    /// Live mappings by base address
    pub mappings: HashMap<u64, Mapping>,
    /// Object identity each key resolves to
    pub identities: HashMap<String, BackingId>,
    pub opens: usize,
    pub fail_open: HashSet<String>,
    pub fail_map: bool,
    pub fail_close: bool,
    pub fail_unmap: HashSet<u64>,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            next_fd: 10,
            next_addr: HOST_BASE,
            open_fds: HashMap::new(),
            mappings: HashMap::new(),
            identities: HashMap::new(),
            opens: 0,
            fail_open: HashSet::new(),
            fail_map: false,
            fail_close: false,
            fail_unmap: HashSet::new(),
        }
    }
}

impl HostState {
    /// `[start, end)` of the live mapping that contains `addr`
    pub fn mapping_containing(&self, addr: u64) -> Option<(u64, u64)> {
        self.mappings
            .iter()
            .map(|(&base, m)| (base, base + m.len as u64))
            .find(|&(start, end)| start <= addr && addr < end)
    }
}

/// Host backend that tracks descriptors and mappings in memory
#[derive(Clone, Default)]
pub struct MockHost(pub Arc<Mutex<HostState>>);

impl MockHost {
    pub fn state(&self) -> parking_lot::MutexGuard<'_, HostState> {
        self.0.lock()
    }
}

impl HostBackend for MockHost {
    fn open(&self, key: &str) -> Result<RawFd, BackendError> {
        let mut s = self.0.lock();
        if s.fail_open.contains(key) {
            return Err(BackendError::Open {
                key: key.to_string(),
                errno: Errno::ENOENT,
            });
        }
        let fd = s.next_fd;
        s.next_fd += 1;
        s.opens += 1;
        s.open_fds.insert(fd, key.to_string());
        Ok(fd)
    }

    fn identify(&self, fd: RawFd) -> Result<BackingId, BackendError> {
        let s = self.0.lock();
        let key = s.open_fds.get(&fd).ok_or(BackendError::Stat(Errno::EBADF))?;
        Ok(s.identities
            .get(key)
            .copied()
            .unwrap_or(BackingId { dev: 1, ino: 1 }))
    }

    fn map(&self, fd: RawFd, offset: usize, byte_size: usize) -> Result<u64, BackendError> {
        let mut s = self.0.lock();
        if !s.open_fds.contains_key(&fd) {
            return Err(BackendError::Map(Errno::EBADF));
        }
        if s.fail_map {
            return Err(BackendError::Map(Errno::ENOMEM));
        }
        let addr = s.next_addr;
        s.next_addr += STRIDE;
        s.mappings.insert(
            addr,
            Mapping {
                offset,
                len: byte_size,
            },
        );
        Ok(addr)
    }

    fn close(&self, fd: RawFd) -> Result<(), BackendError> {
        let mut s = self.0.lock();
        s.open_fds.remove(&fd).ok_or(BackendError::Close(Errno::EBADF))?;
        if s.fail_close {
            return Err(BackendError::Close(Errno::EIO));
        }
        Ok(())
    }

    fn unmap(&self, addr: u64, byte_size: usize) -> Result<(), BackendError> {
        let mut s = self.0.lock();
        if s.fail_unmap.contains(&addr) {
            return Err(BackendError::Unmap(Errno::EINVAL));
        }
        match s.mappings.remove(&addr) {
            Some(mapping) if mapping.len == byte_size => Ok(()),
            _ => Err(BackendError::Unmap(Errno::EINVAL)),
        }
    }
}

#[derive(Debug)]
pub struct DeviceState {
    next_addr: u64,
    /// Open IPC pointers: address -> device id
    pub open: HashMap<u64, i32>,
    pub fail_open: bool,
    pub fail_close: HashSet<u64>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            next_addr: DEVICE_BASE,
            open: HashMap::new(),
            fail_open: false,
            fail_close: HashSet::new(),
        }
    }
}

/// Device backend that fakes IPC pointers
#[derive(Clone, Default)]
pub struct MockDevice(pub Arc<Mutex<DeviceState>>);

impl MockDevice {
    pub fn state(&self) -> parking_lot::MutexGuard<'_, DeviceState> {
        self.0.lock()
    }
}

impl DeviceBackend for MockDevice {
    fn open_ipc(&self, _handle: &CudaIpcHandle, device_id: i32) -> Result<u64, BackendError> {
        let mut s = self.0.lock();
        if s.fail_open {
            return Err(BackendError::Cuda("invalid resource handle".into()));
        }
        let addr = s.next_addr;
        s.next_addr += STRIDE;
        s.open.insert(addr, device_id);
        Ok(addr)
    }

    fn close_ipc(&self, addr: u64, device_id: i32) -> Result<(), BackendError> {
        let mut s = self.0.lock();
        if s.fail_close.contains(&addr) {
            return Err(BackendError::Cuda("invalid device pointer".into()));
        }
        match s.open.remove(&addr) {
            Some(id) if id == device_id => Ok(()),
            _ => Err(BackendError::Cuda("invalid device pointer".into())),
        }
    }
}

pub struct Fixture {
    pub manager: shmreg_core::SharedMemoryManager,
    pub host: MockHost,
    pub device: MockDevice,
}

/// Route registry logs to the test harness (RUST_LOG=debug to see them)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fixture() -> Fixture {
    init_tracing();
    let host = MockHost::default();
    let device = MockDevice::default();
    let manager = shmreg_core::SharedMemoryManager::builder()
        .host_backend(host.clone())
        .device_backend(device.clone())
        .build();
    Fixture {
        manager,
        host,
        device,
    }
}
