//! Capture requests, results and the framework callback channel.

use crate::fence::Fence;
use crate::metadata::MetadataBlock;
use crate::v4l2::gralloc::BufferHandle;

/// An output buffer attached to a request.
#[derive(Debug)]
pub struct StreamBuffer {
    pub stream_id: u64,
    pub buffer: BufferHandle,
    /// Signals when the HAL may start writing. Consumed before enqueue.
    pub acquire_fence: Option<Fence>,
}

/// One unit of capture work from the framework.
///
/// Empty `settings` mean "reuse the last non-empty settings". Input buffers
/// are not modeled: this core forbids reprocessing.
#[derive(Debug)]
pub struct CaptureRequest {
    pub frame_number: u32,
    pub settings: MetadataBlock,
    pub output_buffers: Vec<StreamBuffer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStatus {
    Ok,
    Error,
}

/// An output buffer as returned in a result. The release fence is always
/// cleared: the buffer is ready the moment the result is delivered.
#[derive(Debug)]
pub struct ResultBuffer {
    pub stream_id: u64,
    pub buffer: BufferHandle,
    pub status: BufferStatus,
    pub release_fence: Option<Fence>,
}

/// The single result a request produces.
#[derive(Debug)]
pub struct CaptureResult {
    pub frame_number: u32,
    pub metadata: MetadataBlock,
    pub buffers: Vec<ResultBuffer>,
    pub partial_result: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Device,
    Request,
    Result,
    Buffer,
}

/// Out-of-band notifications preceding results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyMessage {
    Shutter {
        frame_number: u32,
        timestamp_ns: i64,
    },
    Error {
        frame_number: u32,
        error_code: ErrorCode,
    },
}

/// The framework's callback channel. Implementations must tolerate calls
/// from the camera's worker threads.
pub trait CameraCallbacks: Send + Sync {
    fn notify(&self, message: NotifyMessage);
    fn process_capture_result(&self, result: CaptureResult);
}
