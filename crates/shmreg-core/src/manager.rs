//! Shared memory region manager

use crate::api::{V1, V2};
use crate::backend::{BackingId, CudaIpcHandle, DeviceBackend, HostBackend};
use crate::backing::BackingIndex;
use crate::config::ManagerConfig;
use crate::error::BackendError;
use crate::region::{Backing, RegionDescriptor, RegionView};
use crate::shm::PosixShm;
use crate::status::RegionStatus;
use crate::storage::MemoryKind;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, error, warn};

/// Registry of named shared memory regions
///
/// Every operation holds one lock for its whole duration, so registration,
/// lookup, status and unregistration never interleave. Regions still
/// registered when the manager is dropped are released best-effort.
pub struct SharedMemoryManager {
    state: Mutex<State>,
}

/// Builder for [`SharedMemoryManager`]
pub struct ManagerBuilder {
    config: ManagerConfig,
    host: Option<Box<dyn HostBackend>>,
    device: Option<Box<dyn DeviceBackend>>,
}

impl ManagerBuilder {
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the POSIX shm backend
    pub fn host_backend(mut self, backend: impl HostBackend + 'static) -> Self {
        self.host = Some(Box::new(backend));
        self
    }

    /// Replace the default device backend
    pub fn device_backend(mut self, backend: impl DeviceBackend + 'static) -> Self {
        self.device = Some(Box::new(backend));
        self
    }

    pub fn build(self) -> SharedMemoryManager {
        let shm_mode = self.config.shm_mode;
        let host = self
            .host
            .unwrap_or_else(|| Box::new(PosixShm::with_mode(shm_mode)) as Box<dyn HostBackend>);
        let device = self.device.unwrap_or_else(default_device_backend);

        SharedMemoryManager {
            state: Mutex::new(State {
                regions: HashMap::new(),
                backing: BackingIndex::default(),
                host,
                device,
            }),
        }
    }
}

#[cfg(feature = "cuda")]
fn default_device_backend() -> Box<dyn DeviceBackend> {
    Box::new(crate::cuda::CudaIpc::new())
}

#[cfg(not(feature = "cuda"))]
fn default_device_backend() -> Box<dyn DeviceBackend> {
    Box::new(crate::backend::NoDeviceSupport)
}

impl Default for SharedMemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMemoryManager {
    /// Create a manager with the default backends
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ManagerBuilder {
        ManagerBuilder {
            config: ManagerConfig::default(),
            host: None,
            device: None,
        }
    }

    /// Legacy surface: unfiltered unregister and status
    pub fn v1(&self) -> V1<'_> {
        V1::new(self)
    }

    /// Kind-filtered surface
    pub fn v2(&self) -> V2<'_> {
        V2::new(self)
    }

    /// Register a region of the POSIX shared memory object `key`
    ///
    /// Maps `byte_size` bytes starting at `offset` read/write. The descriptor
    /// used for mapping is closed before this returns.
    pub fn register_host(
        &self,
        name: &str,
        key: &str,
        offset: usize,
        byte_size: usize,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.check_new(name, byte_size)?;

        let (base_address, identity) =
            state
                .map_host(key, offset, byte_size)
                .map_err(|source| Error::Register {
                    name: name.to_string(),
                    kind: MemoryKind::Host,
                    source,
                })?;

        state.backing.acquire(key, identity);
        state.regions.insert(
            name.to_string(),
            RegionDescriptor {
                name: name.to_string(),
                backing: Backing::Host {
                    key: key.to_string(),
                    offset,
                },
                byte_size,
                base_address,
            },
        );
        debug!(
            "registered system shared memory region '{}' (key {}, offset {}, {} bytes)",
            name, key, offset, byte_size
        );
        Ok(())
    }

    /// Register device memory exported by another process through `handle`
    pub fn register_device(
        &self,
        name: &str,
        handle: &CudaIpcHandle,
        byte_size: usize,
        device_id: i32,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.check_new(name, byte_size)?;

        let base_address =
            state
                .device
                .open_ipc(handle, device_id)
                .map_err(|source| Error::Register {
                    name: name.to_string(),
                    kind: MemoryKind::Device,
                    source,
                })?;

        state.regions.insert(
            name.to_string(),
            RegionDescriptor {
                name: name.to_string(),
                backing: Backing::Device { device_id },
                byte_size,
                base_address,
            },
        );
        debug!(
            "registered CUDA shared memory region '{}' (device {}, {} bytes)",
            name, device_id, byte_size
        );
        Ok(())
    }

    /// Resolve `extra_offset` bytes into region `name`
    pub fn lookup(&self, name: &str, extra_offset: usize) -> Result<RegionView> {
        let state = self.state.lock();
        let desc = state.regions.get(name).ok_or_else(|| Error::NotFound {
            name: name.to_string(),
            kind: None,
        })?;

        if extra_offset > desc.byte_size {
            return Err(Error::OutOfRange {
                name: name.to_string(),
                offset: extra_offset,
                byte_size: desc.byte_size,
            });
        }

        Ok(RegionView::new(
            desc.address_at(extra_offset),
            desc.len_at(extra_offset),
            desc.kind(),
            desc.device_id(),
        ))
    }

    /// Release region `name`. Absent names, and regions not matching `kind`
    /// when given, are left alone and reported as success.
    pub fn unregister(&self, name: &str, kind: Option<MemoryKind>) -> Result<()> {
        self.state.lock().unregister(name, kind)
    }

    /// Release every region matching `kind`, continuing past failures
    pub fn unregister_all(&self, kind: Option<MemoryKind>) -> Result<()> {
        self.state.lock().unregister_all(kind)
    }

    /// Summaries of registered regions ordered by name
    ///
    /// With `name` set (and non-empty), returns just that region, failing if
    /// it is absent or registered as the other kind than `kind`.
    pub fn status(
        &self,
        name: Option<&str>,
        kind: Option<MemoryKind>,
    ) -> Result<Vec<RegionStatus>> {
        let state = self.state.lock();

        match name.filter(|n| !n.is_empty()) {
            None => {
                let mut regions: Vec<RegionStatus> = state
                    .regions
                    .values()
                    .filter(|desc| desc.kind().matches(kind))
                    .map(RegionStatus::from_descriptor)
                    .collect();
                regions.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(regions)
            }
            Some(name) => {
                let desc = state.regions.get(name).ok_or_else(|| Error::NotFound {
                    name: name.to_string(),
                    kind,
                })?;
                if let Some(requested) = kind {
                    if desc.kind() != requested {
                        return Err(Error::KindMismatch {
                            name: name.to_string(),
                            registered: requested.other(),
                            requested,
                        });
                    }
                }
                Ok(vec![RegionStatus::from_descriptor(desc)])
            }
        }
    }

    /// Number of registered regions
    pub fn len(&self) -> usize {
        self.state.lock().regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.lock().regions.contains_key(name)
    }

    /// Number of registered host regions aliasing backing key `key`
    pub fn backing_refs(&self, key: &str) -> usize {
        self.state.lock().backing.refs(key)
    }
}

impl Drop for SharedMemoryManager {
    fn drop(&mut self) {
        if let Err(e) = self.state.get_mut().unregister_all(None) {
            error!("shared memory regions leaked at teardown: {}", e);
        }
    }
}

/// Lock-protected registry state
struct State {
    regions: HashMap<String, RegionDescriptor>,
    backing: BackingIndex,
    host: Box<dyn HostBackend>,
    device: Box<dyn DeviceBackend>,
}

impl State {
    fn check_new(&self, name: &str, byte_size: usize) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidRegion {
                name: name.to_string(),
                reason: "name must not be empty",
            });
        }
        if self.regions.contains_key(name) {
            return Err(Error::AlreadyExists(name.to_string()));
        }
        if byte_size == 0 {
            return Err(Error::InvalidRegion {
                name: name.to_string(),
                reason: "byte size must be positive",
            });
        }
        Ok(())
    }

    /// Open `key`, map the requested window and close the descriptor
    fn map_host(
        &self,
        key: &str,
        offset: usize,
        byte_size: usize,
    ) -> std::result::Result<(u64, BackingId), BackendError> {
        let fd = self.host.open(key)?;

        let mapped = self.host.identify(fd).and_then(|identity| {
            if !self.backing.admits(key, identity) {
                return Err(BackendError::IdentityChanged {
                    key: key.to_string(),
                });
            }
            let addr = self.host.map(fd, offset, byte_size)?;
            Ok((addr, identity))
        });

        let (addr, identity) = match mapped {
            Ok(mapped) => mapped,
            Err(e) => {
                if let Err(close_err) = self.host.close(fd) {
                    warn!("failed to close descriptor for '{}': {}", key, close_err);
                }
                return Err(e);
            }
        };

        // The mapping outlives the descriptor.
        if let Err(e) = self.host.close(fd) {
            if let Err(unmap_err) = self.host.unmap(addr, byte_size) {
                warn!("failed to unmap '{}' after close failure: {}", key, unmap_err);
            }
            return Err(e);
        }

        Ok((addr, identity))
    }

    fn unregister(&mut self, name: &str, filter: Option<MemoryKind>) -> Result<()> {
        let Some(desc) = self.regions.get(name) else {
            return Ok(());
        };
        if !desc.kind().matches(filter) {
            return Ok(());
        }

        let released = match desc.backing {
            Backing::Host { .. } => self.host.unmap(desc.base_address, desc.byte_size),
            Backing::Device { device_id } => self.device.close_ipc(desc.base_address, device_id),
        };
        if let Err(source) = released {
            return Err(Error::Unregister {
                name: name.to_string(),
                kind: desc.kind(),
                source,
            });
        }

        if let Some(desc) = self.regions.remove(name) {
            if let Backing::Host { key, .. } = &desc.backing {
                self.backing.release(key);
            }
        }
        debug!("unregistered shared memory region '{}'", name);
        Ok(())
    }

    fn unregister_all(&mut self, filter: Option<MemoryKind>) -> Result<()> {
        let mut names: Vec<String> = self
            .regions
            .values()
            .filter(|desc| desc.kind().matches(filter))
            .map(|desc| desc.name.clone())
            .collect();
        names.sort();

        let mut failed = Vec::new();
        for name in names {
            if let Err(e) = self.unregister(&name, filter) {
                warn!("{}", e);
                failed.push(name);
            }
        }

        if failed.is_empty() {
            return Ok(());
        }

        let err = Error::UnregisterAll {
            kind: filter,
            names: failed,
        };
        error!("{}", err);
        Err(err)
    }
}
