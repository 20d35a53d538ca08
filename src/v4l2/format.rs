//! Pixel-format taxonomy and format negotiation types.

use serde::Serialize;

use crate::v4l2::raw;

/// The framework's pixel-format taxonomy, restricted to what this HAL can
/// negotiate. Numeric ids follow the graphics-format convention the
/// framework uses on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HalPixelFormat {
    /// Flexible YCbCr 4:2:0; the required preview/video format.
    Ycbcr420Flex,
    /// Interleaved YCbCr 4:2:2 (YUYV).
    Ycbcr422Interleaved,
    /// Opaque byte container; JPEG-compressed output.
    Blob,
    /// Packed 24-bit RGB.
    Rgb888,
}

impl HalPixelFormat {
    /// Wire id used in stream-configuration metadata entries.
    pub fn id(self) -> i32 {
        match self {
            HalPixelFormat::Ycbcr420Flex => 0x23,
            HalPixelFormat::Ycbcr422Interleaved => 0x14,
            HalPixelFormat::Blob => 0x21,
            HalPixelFormat::Rgb888 => 0x03,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0x23 => Some(HalPixelFormat::Ycbcr420Flex),
            0x14 => Some(HalPixelFormat::Ycbcr422Interleaved),
            0x21 => Some(HalPixelFormat::Blob),
            0x03 => Some(HalPixelFormat::Rgb888),
            _ => None,
        }
    }

    /// Maps a driver-reported fourcc into the taxonomy. Unrecognized
    /// fourccs return `None` and are discarded by discovery.
    pub fn from_v4l2(fourcc: u32) -> Option<Self> {
        match fourcc {
            raw::PIX_FMT_YUV420 | raw::PIX_FMT_YVU420 | raw::PIX_FMT_NV12 | raw::PIX_FMT_NV21 => {
                Some(HalPixelFormat::Ycbcr420Flex)
            }
            raw::PIX_FMT_YUYV => Some(HalPixelFormat::Ycbcr422Interleaved),
            raw::PIX_FMT_JPEG | raw::PIX_FMT_MJPEG => Some(HalPixelFormat::Blob),
            raw::PIX_FMT_RGB24 => Some(HalPixelFormat::Rgb888),
            _ => None,
        }
    }

    /// The fourcc requested from the driver when negotiating this format.
    pub fn to_v4l2(self) -> u32 {
        match self {
            HalPixelFormat::Ycbcr420Flex => raw::PIX_FMT_YUV420,
            HalPixelFormat::Ycbcr422Interleaved => raw::PIX_FMT_YUYV,
            HalPixelFormat::Blob => raw::PIX_FMT_JPEG,
            HalPixelFormat::Rgb888 => raw::PIX_FMT_RGB24,
        }
    }
}

pub fn fourcc_to_string(fourcc: u32) -> String {
    let bytes = fourcc.to_le_bytes();
    bytes
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

/// A negotiated capture format: what `S_FMT` requests and what the driver
/// reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub buf_type: u32,
    pub fourcc: u32,
    pub width: u32,
    pub height: u32,
    /// Driver-filled; zero in a request means "driver chooses".
    pub bytes_per_line: u32,
    /// Driver-filled image size in bytes.
    pub min_buffer_size: u32,
}

impl StreamFormat {
    pub fn for_capture(fourcc: u32, width: u32, height: u32) -> Self {
        Self {
            buf_type: raw::BUF_TYPE_VIDEO_CAPTURE,
            fourcc,
            width,
            height,
            bytes_per_line: 0,
            min_buffer_size: 0,
        }
    }

    /// Whether this format satisfies `requested`. Only the caller-chosen
    /// fields participate; driver-filled layout fields do not.
    pub fn matches_request(&self, requested: &StreamFormat) -> bool {
        self.buf_type == requested.buf_type
            && self.fourcc == requested.fourcc
            && self.width == requested.width
            && self.height == requested.height
    }

    pub(crate) fn to_raw(self) -> raw::Format {
        let mut format = raw::Format::zeroed();
        format.type_ = self.buf_type;
        format.fmt.pix = raw::PixFormat {
            width: self.width,
            height: self.height,
            pixelformat: self.fourcc,
            bytesperline: self.bytes_per_line,
            sizeimage: self.min_buffer_size,
            ..Default::default()
        };
        format
    }

    pub(crate) fn from_raw(format: &raw::Format) -> Self {
        let pix = unsafe { format.fmt.pix };
        Self {
            buf_type: format.type_,
            fourcc: pix.pixelformat,
            width: pix.width,
            height: pix.height,
            bytes_per_line: pix.bytesperline,
            min_buffer_size: pix.sizeimage,
        }
    }
}
