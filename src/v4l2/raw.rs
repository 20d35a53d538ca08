//! FFI definitions compatible with `videodev2.h`, limited to the ioctls this
//! HAL issues. Not a general-purpose binding; nothing here is a public API
//! surface for callers outside the wrapper.

#![allow(dead_code)]

use nix::{ioctl_readwrite, ioctl_write_ptr};

// Buffer types and memory modes.
pub const BUF_TYPE_VIDEO_CAPTURE: u32 = 1;
pub const MEMORY_MMAP: u32 = 1;
pub const MEMORY_USERPTR: u32 = 2;

// Control types.
pub const CTRL_TYPE_INTEGER: u32 = 1;
pub const CTRL_TYPE_BOOLEAN: u32 = 2;
pub const CTRL_TYPE_MENU: u32 = 3;
pub const CTRL_TYPE_BUTTON: u32 = 4;
pub const CTRL_TYPE_INTEGER64: u32 = 5;
pub const CTRL_TYPE_CTRL_CLASS: u32 = 6;
pub const CTRL_TYPE_STRING: u32 = 7;
pub const CTRL_TYPE_BITMASK: u32 = 8;
pub const CTRL_TYPE_INTEGER_MENU: u32 = 9;

// Control flags.
pub const CTRL_FLAG_DISABLED: u32 = 0x0001;
pub const CTRL_FLAG_NEXT_CTRL: u32 = 0x8000_0000;

// Frame size / interval enumeration types.
pub const FRMSIZE_TYPE_DISCRETE: u32 = 1;
pub const FRMSIZE_TYPE_CONTINUOUS: u32 = 2;
pub const FRMSIZE_TYPE_STEPWISE: u32 = 3;
pub const FRMIVAL_TYPE_DISCRETE: u32 = 1;
pub const FRMIVAL_TYPE_CONTINUOUS: u32 = 2;
pub const FRMIVAL_TYPE_STEPWISE: u32 = 3;

// Control ids (user class).
pub const CID_BRIGHTNESS: u32 = 0x0098_0900;
pub const CID_AUTO_WHITE_BALANCE: u32 = 0x0098_090c;
pub const CID_POWER_LINE_FREQUENCY: u32 = 0x0098_0918;
pub const POWER_LINE_FREQUENCY_DISABLED: i64 = 0;
pub const POWER_LINE_FREQUENCY_50HZ: i64 = 1;
pub const POWER_LINE_FREQUENCY_60HZ: i64 = 2;
pub const POWER_LINE_FREQUENCY_AUTO: i64 = 3;

// Control ids (camera class).
pub const CID_EXPOSURE_AUTO: u32 = 0x009a_0901;
pub const EXPOSURE_AUTO: i64 = 0;
pub const EXPOSURE_MANUAL: i64 = 1;
pub const CID_FOCUS_AUTO: u32 = 0x009a_090c;

pub const fn fourcc(code: &[u8; 4]) -> u32 {
    (code[0] as u32) | ((code[1] as u32) << 8) | ((code[2] as u32) << 16) | ((code[3] as u32) << 24)
}

pub const PIX_FMT_YUV420: u32 = fourcc(b"YU12");
pub const PIX_FMT_YVU420: u32 = fourcc(b"YV12");
pub const PIX_FMT_NV12: u32 = fourcc(b"NV12");
pub const PIX_FMT_NV21: u32 = fourcc(b"NV21");
pub const PIX_FMT_YUYV: u32 = fourcc(b"YUYV");
pub const PIX_FMT_JPEG: u32 = fourcc(b"JPEG");
pub const PIX_FMT_MJPEG: u32 = fourcc(b"MJPG");
pub const PIX_FMT_RGB24: u32 = fourcc(b"RGB3");

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fract {
    pub numerator: u32,
    pub denominator: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct FmtDesc {
    pub index: u32,
    pub type_: u32,
    pub flags: u32,
    pub description: [u8; 32],
    pub pixelformat: u32,
    pub mbus_code: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FrmSizeDiscrete {
    pub width: u32,
    pub height: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FrmSizeStepwise {
    pub min_width: u32,
    pub max_width: u32,
    pub step_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub step_height: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union FrmSizeUnion {
    pub discrete: FrmSizeDiscrete,
    pub stepwise: FrmSizeStepwise,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct FrmSizeEnum {
    pub index: u32,
    pub pixel_format: u32,
    pub type_: u32,
    pub size: FrmSizeUnion,
    pub reserved: [u32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FrmIvalStepwise {
    pub min: Fract,
    pub max: Fract,
    pub step: Fract,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union FrmIvalUnion {
    pub discrete: Fract,
    pub stepwise: FrmIvalStepwise,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct FrmIvalEnum {
    pub index: u32,
    pub pixel_format: u32,
    pub width: u32,
    pub height: u32,
    pub type_: u32,
    pub interval: FrmIvalUnion,
    pub reserved: [u32; 2],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct QueryCtrl {
    pub id: u32,
    pub type_: u32,
    pub name: [u8; 32],
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
    pub flags: u32,
    pub reserved: [u32; 2],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union QueryMenuUnion {
    pub name: [u8; 32],
    pub value: i64,
}

// Packed in the kernel header: the 64-bit union member sits at offset 8.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct QueryMenu {
    pub id: u32,
    pub index: u32,
    pub un: QueryMenuUnion,
    pub reserved: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct QueryExtCtrl {
    pub id: u32,
    pub type_: u32,
    pub name: [u8; 32],
    pub minimum: i64,
    pub maximum: i64,
    pub step: u64,
    pub default_value: i64,
    pub flags: u32,
    pub elem_size: u32,
    pub elems: u32,
    pub nr_of_dims: u32,
    pub dims: [u32; 4],
    pub reserved: [u32; 32],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Control {
    pub id: u32,
    pub value: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PixFormat {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub bytesperline: u32,
    pub sizeimage: u32,
    pub colorspace: u32,
    pub priv_: u32,
    pub flags: u32,
    pub ycbcr_enc: u32,
    pub quantization: u32,
    pub xfer_func: u32,
}

// The kernel union is 200 bytes and 8-aligned (it carries pointers in the
// overlay member); the u64 filler reproduces both properties.
#[repr(C)]
#[derive(Clone, Copy)]
pub union FormatUnion {
    pub pix: PixFormat,
    pub raw_data: [u64; 25],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct Format {
    pub type_: u32,
    pub fmt: FormatUnion,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestBuffers {
    pub count: u32,
    pub type_: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub flags: u8,
    pub reserved: [u8; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeCode {
    pub type_: u32,
    pub flags: u32,
    pub frames: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub userbits: [u8; 4],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union BufferM {
    pub offset: u32,
    pub userptr: libc::c_ulong,
    pub planes: *mut libc::c_void,
    pub fd: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct Buffer {
    pub index: u32,
    pub type_: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub timestamp: libc::timeval,
    pub timecode: TimeCode,
    pub sequence: u32,
    pub memory: u32,
    pub m: BufferM,
    pub length: u32,
    pub reserved2: u32,
    pub request_fd: i32,
}

macro_rules! zeroed_ctor {
    ($($ty:ident),+ $(,)?) => {
        $(impl $ty {
            pub fn zeroed() -> Self {
                // All-zero bit patterns are valid for these POD structs.
                unsafe { std::mem::zeroed() }
            }
        })+
    };
}

zeroed_ctor!(
    FmtDesc,
    FrmSizeEnum,
    FrmIvalEnum,
    QueryCtrl,
    QueryMenu,
    QueryExtCtrl,
    Control,
    Format,
    RequestBuffers,
    Buffer,
);

ioctl_readwrite!(vidioc_enum_fmt, b'V', 2, FmtDesc);
ioctl_readwrite!(vidioc_s_fmt, b'V', 5, Format);
ioctl_readwrite!(vidioc_reqbufs, b'V', 8, RequestBuffers);
ioctl_readwrite!(vidioc_querybuf, b'V', 9, Buffer);
ioctl_readwrite!(vidioc_qbuf, b'V', 15, Buffer);
ioctl_readwrite!(vidioc_dqbuf, b'V', 17, Buffer);
ioctl_write_ptr!(vidioc_streamon, b'V', 18, libc::c_int);
ioctl_write_ptr!(vidioc_streamoff, b'V', 19, libc::c_int);
ioctl_readwrite!(vidioc_g_ctrl, b'V', 27, Control);
ioctl_readwrite!(vidioc_s_ctrl, b'V', 28, Control);
ioctl_readwrite!(vidioc_queryctrl, b'V', 36, QueryCtrl);
ioctl_readwrite!(vidioc_querymenu, b'V', 37, QueryMenu);
ioctl_readwrite!(vidioc_enum_framesizes, b'V', 74, FrmSizeEnum);
ioctl_readwrite!(vidioc_enum_frameintervals, b'V', 75, FrmIvalEnum);
ioctl_readwrite!(vidioc_query_ext_ctrl, b'V', 103, QueryExtCtrl);
