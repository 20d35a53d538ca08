//! Camera HAL v3.4 core for Linux V4L2 capture devices.
//!
//! This crate bridges a generic camera framework to `/dev/video*` nodes:
//! capture requests go in through a per-camera pipeline, V4L2 ioctls drive
//! the device, and per-frame results come back asynchronously over a
//! callback channel.
//!
//! The core splits into three pieces:
//! - the request/result pipeline state machine ([`camera::V4l2Camera`]),
//! - the composable metadata engine ([`metadata`]) assembling static
//!   characteristics, templates and per-frame results from independent
//!   partial components,
//! - the serialized V4L2 device wrapper ([`v4l2::V4l2Wrapper`]) with
//!   user-pointer buffer handling coupled to a graphics-buffer mapper.
//!
//! # Usage
//! ```rust,no_run
//! use std::sync::Arc;
//! use v4l2_camera_hal::{V4l2Camera, V4l2Wrapper};
//!
//! # fn mapper() -> Arc<dyn v4l2_camera_hal::v4l2::BufferMapper> { unimplemented!() }
//! let wrapper = Arc::new(V4l2Wrapper::for_path("/dev/video0", mapper()));
//! let camera = V4l2Camera::new(0, wrapper);
//! camera.open().expect("failed to open camera");
//! ```

pub mod camera;
pub mod characteristics;
pub mod errors;
pub mod fence;
pub mod metadata;
pub mod request;
pub mod stream;
pub mod templates;
pub mod testing;
pub mod v4l2;

// Re-exports for convenience
pub use camera::{CameraInfo, Facing, V4l2Camera, DEVICE_API_VERSION_3_4};
pub use errors::{HalError, HalResult};
pub use fence::Fence;
pub use metadata::{MetadataBlock, MetadataRegistry};
pub use request::{
    BufferStatus, CameraCallbacks, CaptureRequest, CaptureResult, ErrorCode, NotifyMessage,
    ResultBuffer, StreamBuffer,
};
pub use stream::{Stream, StreamConfig, StreamType};
pub use templates::RequestTemplate;
pub use v4l2::{BufferHandle, HalPixelFormat, V4l2Wrapper};

/// Initialize logging for the HAL
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "v4l2_camera_hal=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
