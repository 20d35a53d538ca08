//! V4L2 device access: raw videodev2 FFI, the ioctl seam, gralloc
//! bookkeeping and the serialized device wrapper.

pub mod format;
pub mod gralloc;
pub mod raw;
pub mod videodev;
pub mod wrapper;

pub use format::{HalPixelFormat, StreamFormat};
pub use gralloc::{BufferHandle, BufferMapper, GrallocBridge, MappedRegion};
pub use videodev::{DevicePath, KernelVideodev, Videodev, VideodevProvider};
pub use wrapper::{ControlQuery, DequeuedBuffer, V4l2Wrapper};
