use std::io;

use thiserror::Error;

/// Result alias used across the HAL.
pub type HalResult<T> = std::result::Result<T, HalError>;

/// Error taxonomy surfaced to the camera framework.
///
/// Every variant maps onto the negative errno the framework-facing
/// operations table reports via [`HalError::errno`].
#[derive(Debug, Error)]
pub enum HalError {
    #[error("device busy: {0}")]
    Busy(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no device: {0}")]
    NoDevice(String),
    #[error("i/o failure during {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("not supported: {0}")]
    NotSupported(String),
}

impl HalError {
    pub fn busy(message: impl Into<String>) -> Self {
        Self::Busy(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn no_device(message: impl Into<String>) -> Self {
        Self::NoDevice(message.into())
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported(message.into())
    }

    /// The negative errno this error propagates as across the device-ops
    /// table. I/O failures keep the kernel's errno when one is available.
    pub fn errno(&self) -> i32 {
        match self {
            Self::Busy(_) => -libc::EBUSY,
            Self::InvalidArgument(_) => -libc::EINVAL,
            Self::NoDevice(_) => -libc::ENODEV,
            Self::Io { source, .. } => source.raw_os_error().map_or(-libc::EIO, |e| -e),
            Self::Timeout(_) => -libc::ETIME,
            Self::NotSupported(_) => -libc::ENOSYS,
        }
    }
}
