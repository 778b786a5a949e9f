//! shmreg - Registry of shared memory regions for zero-copy serving
//!
//! A [`SharedMemoryManager`] maps named regions of POSIX shared memory, or
//! opens CUDA IPC handles, and hands out bounded addresses into them.

pub mod api;
pub mod backend;
mod backing;
pub mod config;
#[cfg(feature = "cuda")]
pub mod cuda;
pub mod error;
pub mod manager;
pub mod region;
pub mod shm;
pub mod status;
pub mod storage;

pub use api::{V1, V2};
pub use backend::{BackingId, CudaIpcHandle, DeviceBackend, HostBackend, NoDeviceSupport};
pub use config::ManagerConfig;
#[cfg(feature = "cuda")]
pub use cuda::CudaIpc;
pub use error::{BackendError, Error, ErrorKind, Result};
pub use manager::{ManagerBuilder, SharedMemoryManager};
pub use region::RegionView;
pub use shm::PosixShm;
pub use status::{RegionDetail, RegionStatus};
pub use storage::MemoryKind;
