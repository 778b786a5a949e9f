//! Error types for shmreg

use crate::storage::MemoryKind;
use nix::errno::Errno;
use thiserror::Error;

/// Coarse classification handed to the request layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AlreadyExists,
    NotFound,
    InvalidArgument,
    Internal,
}

/// Failure reported by a host or device backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("unable to open shared memory region '{key}': {errno}")]
    Open { key: String, errno: Errno },

    #[error("unable to stat shared memory descriptor: {0}")]
    Stat(Errno),

    #[error("shared memory key '{key}' no longer refers to the object already mapped under it")]
    IdentityChanged { key: String },

    #[error("unable to map shared memory into process address space: {0}")]
    Map(Errno),

    #[error("unable to close shared memory descriptor: {0}")]
    Close(Errno),

    #[error("unable to munmap shared memory region: {0}")]
    Unmap(Errno),

    #[error("CUDA error: {0}")]
    Cuda(String),

    #[error("GPUs not supported")]
    DeviceUnsupported,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("shared memory region '{0}' already in manager")]
    AlreadyExists(String),

    #[error("Unable to find {} region: '{name}'", scope(.kind))]
    NotFound {
        name: String,
        kind: Option<MemoryKind>,
    },

    #[error("The region named '{name}' is registered as {registered}, not {requested}")]
    KindMismatch {
        name: String,
        registered: MemoryKind,
        requested: MemoryKind,
    },

    #[error("invalid shared memory region '{name}': {reason}")]
    InvalidRegion { name: String, reason: &'static str },

    #[error("offset {offset} is out of range for region '{name}' of {byte_size} bytes")]
    OutOfRange {
        name: String,
        offset: usize,
        byte_size: usize,
    },

    #[error("failed to register {kind} region '{name}': {source}")]
    Register {
        name: String,
        kind: MemoryKind,
        #[source]
        source: BackendError,
    },

    #[error("failed to unregister {kind} region '{name}': {source}")]
    Unregister {
        name: String,
        kind: MemoryKind,
        #[source]
        source: BackendError,
    },

    #[error("Failed to unregister the following {} regions: {}", scope(.kind), .names.join(", "))]
    UnregisterAll {
        kind: Option<MemoryKind>,
        names: Vec<String>,
    },
}

fn scope(kind: &Option<MemoryKind>) -> String {
    match kind {
        Some(k) => k.to_string(),
        None => "shared memory".to_string(),
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::NotFound { .. } | Error::KindMismatch { .. } => ErrorKind::NotFound,
            Error::InvalidRegion { .. } | Error::OutOfRange { .. } | Error::Register { .. } => {
                ErrorKind::InvalidArgument
            }
            Error::Unregister { source, .. } => match source {
                BackendError::Unmap(_) => ErrorKind::Internal,
                _ => ErrorKind::InvalidArgument,
            },
            Error::UnregisterAll { .. } => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = Error::KindMismatch {
            name: "r".into(),
            registered: MemoryKind::Host,
            requested: MemoryKind::Device,
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            err.to_string(),
            "The region named 'r' is registered as system shared memory, not CUDA shared memory"
        );

        let err = Error::Unregister {
            name: "r".into(),
            kind: MemoryKind::Host,
            source: BackendError::Unmap(Errno::EINVAL),
        };
        assert_eq!(err.kind(), ErrorKind::Internal);

        let err = Error::Unregister {
            name: "g".into(),
            kind: MemoryKind::Device,
            source: BackendError::DeviceUnsupported,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("GPUs not supported"));
    }

    #[test]
    fn test_messages_name_region() {
        let err = Error::NotFound {
            name: "a".into(),
            kind: None,
        };
        assert_eq!(err.to_string(), "Unable to find shared memory region: 'a'");

        let err = Error::NotFound {
            name: "a".into(),
            kind: Some(MemoryKind::Device),
        };
        assert_eq!(err.to_string(), "Unable to find CUDA shared memory region: 'a'");

        let err = Error::UnregisterAll {
            kind: Some(MemoryKind::Host),
            names: vec!["x".into(), "y".into()],
        };
        assert_eq!(
            err.to_string(),
            "Failed to unregister the following system shared memory regions: x, y"
        );
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
