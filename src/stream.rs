//! Configured output streams and stream-set validation.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

use crate::errors::{HalError, HalResult};
use crate::v4l2::format::HalPixelFormat;

/// JFIF data space; the only one this HAL produces, forced on every stream.
pub const DATA_SPACE_JFIF: i32 = 0x8C2_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamType {
    Output,
    Input,
}

/// One stream as requested by the framework during stream configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamConfig {
    /// Framework identity; stable across reconfigurations of the same
    /// surface.
    pub id: u64,
    pub stream_type: StreamType,
    pub width: u32,
    pub height: u32,
    pub format: HalPixelFormat,
    pub usage: u64,
    pub rotation_degrees: u32,
}

/// A configured output surface.
#[derive(Debug, Serialize)]
pub struct Stream {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub format: HalPixelFormat,
    pub usage: u64,
    pub data_space: i32,
    max_buffers: AtomicU32,
}

impl Stream {
    pub(crate) fn from_config(config: &StreamConfig) -> Self {
        Self {
            id: config.id,
            width: config.width,
            height: config.height,
            format: config.format,
            usage: config.usage,
            data_space: DATA_SPACE_JFIF,
            max_buffers: AtomicU32::new(0),
        }
    }

    pub(crate) fn matches(&self, config: &StreamConfig) -> bool {
        self.id == config.id
            && self.width == config.width
            && self.height == config.height
            && self.format == config.format
            && self.usage == config.usage
    }

    pub fn max_buffers(&self) -> u32 {
        self.max_buffers.load(Ordering::Acquire)
    }

    pub(crate) fn set_max_buffers(&self, count: u32) {
        self.max_buffers.store(count, Ordering::Release);
    }
}

/// Validates a requested stream set and returns the shared
/// (format, width, height) triple.
///
/// This core drives a single V4L2 stream, so every requested stream must
/// share one format and size; input streams are not supported at all.
pub fn validate_stream_set(
    configs: &[StreamConfig],
) -> HalResult<(HalPixelFormat, u32, u32)> {
    if configs.is_empty() {
        return Err(HalError::invalid_argument("no streams in configuration"));
    }
    for config in configs {
        if config.stream_type == StreamType::Input {
            return Err(HalError::invalid_argument(format!(
                "input stream {} not supported",
                config.id
            )));
        }
        if config.rotation_degrees != 0 {
            return Err(HalError::invalid_argument(format!(
                "stream {} requests rotation {}",
                config.id, config.rotation_degrees
            )));
        }
        if config.width == 0 || config.height == 0 {
            return Err(HalError::invalid_argument(format!(
                "stream {} has empty geometry",
                config.id
            )));
        }
    }

    let first = &configs[0];
    let shape = (first.format, first.width, first.height);
    for config in &configs[1..] {
        if (config.format, config.width, config.height) != shape {
            return Err(HalError::invalid_argument(
                "streams differ in format or geometry; one capture stream only",
            ));
        }
    }
    Ok(shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(id: u64, width: u32, height: u32) -> StreamConfig {
        StreamConfig {
            id,
            stream_type: StreamType::Output,
            width,
            height,
            format: HalPixelFormat::Ycbcr420Flex,
            usage: 0,
            rotation_degrees: 0,
        }
    }

    #[test]
    fn accepts_matching_output_streams() {
        let configs = vec![output(1, 640, 480), output(2, 640, 480)];
        let (format, width, height) = validate_stream_set(&configs).unwrap();
        assert_eq!(format, HalPixelFormat::Ycbcr420Flex);
        assert_eq!((width, height), (640, 480));
    }

    #[test]
    fn rejects_empty_set() {
        assert!(validate_stream_set(&[]).is_err());
    }

    #[test]
    fn rejects_mismatched_geometry() {
        let configs = vec![output(1, 640, 480), output(2, 1280, 720)];
        assert!(matches!(
            validate_stream_set(&configs),
            Err(HalError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_input_streams() {
        let mut config = output(1, 640, 480);
        config.stream_type = StreamType::Input;
        assert!(validate_stream_set(&[config]).is_err());
    }

    #[test]
    fn rejects_rotation() {
        let mut config = output(1, 640, 480);
        config.rotation_degrees = 90;
        assert!(validate_stream_set(&[config]).is_err());
    }

    #[test]
    fn stream_reuse_matches_on_identity_and_shape() {
        let config = output(1, 640, 480);
        let stream = Stream::from_config(&config);
        assert!(stream.matches(&config));
        assert!(!stream.matches(&output(1, 1280, 720)));
        assert!(!stream.matches(&output(2, 640, 480)));
        assert_eq!(stream.data_space, DATA_SPACE_JFIF);
    }
}
