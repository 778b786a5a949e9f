//! CUDA IPC backend

use crate::backend::{CudaIpcHandle, DeviceBackend};
use crate::error::BackendError;
use cudarc::driver::CudaDevice;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Device backend over the CUDA driver IPC API
///
/// Keeps one device context per device id alive for as long as the backend
/// exists, so pointers opened on a device stay valid until closed.
#[derive(Default)]
pub struct CudaIpc {
    devices: Mutex<HashMap<i32, Arc<CudaDevice>>>,
}

impl CudaIpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `device_id` current on the calling thread
    fn bind(&self, device_id: i32) -> Result<(), BackendError> {
        let mut devices = self.devices.lock();
        let device = match devices.get(&device_id) {
            Some(device) => device.clone(),
            None => {
                let ordinal = usize::try_from(device_id)
                    .map_err(|_| BackendError::Cuda(format!("invalid device id {}", device_id)))?;
                let device =
                    CudaDevice::new(ordinal).map_err(|e| BackendError::Cuda(e.to_string()))?;
                devices.insert(device_id, device.clone());
                device
            }
        };
        device
            .bind_to_thread()
            .map_err(|e| BackendError::Cuda(e.to_string()))
    }
}

impl DeviceBackend for CudaIpc {
    fn open_ipc(&self, handle: &CudaIpcHandle, device_id: i32) -> Result<u64, BackendError> {
        self.bind(device_id)?;

        let mut ptr: u64 = 0;
        unsafe {
            let result = cudarc::driver::sys::cuIpcOpenMemHandle(
                &mut ptr as *mut u64 as *mut _,
                *(handle.reserved.as_ptr() as *const _),
                cudarc::driver::sys::CUipcMem_flags::CU_IPC_MEM_LAZY_ENABLE_PEER_ACCESS,
            );
            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                return Err(BackendError::Cuda(format!(
                    "cuIpcOpenMemHandle failed: {:?}",
                    result
                )));
            }
        }

        Ok(ptr)
    }

    fn close_ipc(&self, addr: u64, device_id: i32) -> Result<(), BackendError> {
        self.bind(device_id)?;

        unsafe {
            let result = cudarc::driver::sys::cuIpcCloseMemHandle(addr);
            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                return Err(BackendError::Cuda(format!(
                    "cuIpcCloseMemHandle failed: {:?}",
                    result
                )));
            }
        }
        Ok(())
    }
}
