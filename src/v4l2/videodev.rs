//! The ioctl seam between the wrapper and a video device node.
//!
//! Production traffic goes through [`KernelVideodev`]; tests substitute a
//! scripted fake behind the same trait.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::{Path, PathBuf};

use crate::errors::{HalError, HalResult};
use crate::v4l2::raw;

/// One method per ioctl this HAL issues. Arguments follow the kernel
/// calling convention: the struct is both input and output.
pub trait Videodev: Send {
    fn query_ext_ctrl(&self, query: &mut raw::QueryExtCtrl) -> io::Result<()>;
    fn query_ctrl(&self, query: &mut raw::QueryCtrl) -> io::Result<()>;
    fn query_menu(&self, menu: &mut raw::QueryMenu) -> io::Result<()>;
    fn g_ctrl(&self, control: &mut raw::Control) -> io::Result<()>;
    fn s_ctrl(&self, control: &mut raw::Control) -> io::Result<()>;
    fn s_fmt(&self, format: &mut raw::Format) -> io::Result<()>;
    fn enum_fmt(&self, desc: &mut raw::FmtDesc) -> io::Result<()>;
    fn enum_frame_sizes(&self, sizes: &mut raw::FrmSizeEnum) -> io::Result<()>;
    fn enum_frame_intervals(&self, intervals: &mut raw::FrmIvalEnum) -> io::Result<()>;
    fn req_bufs(&self, request: &mut raw::RequestBuffers) -> io::Result<()>;
    fn query_buf(&self, buffer: &mut raw::Buffer) -> io::Result<()>;
    fn qbuf(&self, buffer: &mut raw::Buffer) -> io::Result<()>;
    fn dqbuf(&self, buffer: &mut raw::Buffer) -> io::Result<()>;
    fn stream_on(&self, buf_type: u32) -> io::Result<()>;
    fn stream_off(&self, buf_type: u32) -> io::Result<()>;
}

/// Opens [`Videodev`] instances; the wrapper holds one per camera and opens
/// a fresh device on every connect.
pub trait VideodevProvider: Send + Sync {
    fn open(&self) -> HalResult<Box<dyn Videodev>>;
    fn describe(&self) -> String;
}

fn ioctl_retry(mut op: impl FnMut() -> nix::Result<libc::c_int>) -> io::Result<()> {
    loop {
        match op() {
            Ok(_) => return Ok(()),
            Err(nix::errno::Errno::EINTR) => continue,
            Err(errno) => return Err(io::Error::from_raw_os_error(errno as i32)),
        }
    }
}

/// A real `/dev/video*` node.
pub struct KernelVideodev {
    fd: OwnedFd,
}

impl KernelVideodev {
    pub fn open(path: &Path) -> HalResult<Self> {
        // std retries EINTR internally on open.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| HalError::io(format!("opening {}", path.display()), e))?;
        Ok(Self { fd: file.into() })
    }
}

impl Videodev for KernelVideodev {
    fn query_ext_ctrl(&self, query: &mut raw::QueryExtCtrl) -> io::Result<()> {
        ioctl_retry(|| unsafe { raw::vidioc_query_ext_ctrl(self.fd.as_raw_fd(), query) })
    }

    fn query_ctrl(&self, query: &mut raw::QueryCtrl) -> io::Result<()> {
        ioctl_retry(|| unsafe { raw::vidioc_queryctrl(self.fd.as_raw_fd(), query) })
    }

    fn query_menu(&self, menu: &mut raw::QueryMenu) -> io::Result<()> {
        ioctl_retry(|| unsafe { raw::vidioc_querymenu(self.fd.as_raw_fd(), menu) })
    }

    fn g_ctrl(&self, control: &mut raw::Control) -> io::Result<()> {
        ioctl_retry(|| unsafe { raw::vidioc_g_ctrl(self.fd.as_raw_fd(), control) })
    }

    fn s_ctrl(&self, control: &mut raw::Control) -> io::Result<()> {
        ioctl_retry(|| unsafe { raw::vidioc_s_ctrl(self.fd.as_raw_fd(), control) })
    }

    fn s_fmt(&self, format: &mut raw::Format) -> io::Result<()> {
        ioctl_retry(|| unsafe { raw::vidioc_s_fmt(self.fd.as_raw_fd(), format) })
    }

    fn enum_fmt(&self, desc: &mut raw::FmtDesc) -> io::Result<()> {
        ioctl_retry(|| unsafe { raw::vidioc_enum_fmt(self.fd.as_raw_fd(), desc) })
    }

    fn enum_frame_sizes(&self, sizes: &mut raw::FrmSizeEnum) -> io::Result<()> {
        ioctl_retry(|| unsafe { raw::vidioc_enum_framesizes(self.fd.as_raw_fd(), sizes) })
    }

    fn enum_frame_intervals(&self, intervals: &mut raw::FrmIvalEnum) -> io::Result<()> {
        ioctl_retry(|| unsafe { raw::vidioc_enum_frameintervals(self.fd.as_raw_fd(), intervals) })
    }

    fn req_bufs(&self, request: &mut raw::RequestBuffers) -> io::Result<()> {
        ioctl_retry(|| unsafe { raw::vidioc_reqbufs(self.fd.as_raw_fd(), request) })
    }

    fn query_buf(&self, buffer: &mut raw::Buffer) -> io::Result<()> {
        ioctl_retry(|| unsafe { raw::vidioc_querybuf(self.fd.as_raw_fd(), buffer) })
    }

    fn qbuf(&self, buffer: &mut raw::Buffer) -> io::Result<()> {
        ioctl_retry(|| unsafe { raw::vidioc_qbuf(self.fd.as_raw_fd(), buffer) })
    }

    fn dqbuf(&self, buffer: &mut raw::Buffer) -> io::Result<()> {
        ioctl_retry(|| unsafe { raw::vidioc_dqbuf(self.fd.as_raw_fd(), buffer) })
    }

    fn stream_on(&self, buf_type: u32) -> io::Result<()> {
        let arg = buf_type as libc::c_int;
        ioctl_retry(|| unsafe { raw::vidioc_streamon(self.fd.as_raw_fd(), &arg) })
    }

    fn stream_off(&self, buf_type: u32) -> io::Result<()> {
        let arg = buf_type as libc::c_int;
        ioctl_retry(|| unsafe { raw::vidioc_streamoff(self.fd.as_raw_fd(), &arg) })
    }
}

/// Provider for a device node path, e.g. `/dev/video0`.
pub struct DevicePath {
    path: PathBuf,
}

impl DevicePath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl VideodevProvider for DevicePath {
    fn open(&self) -> HalResult<Box<dyn Videodev>> {
        Ok(Box::new(KernelVideodev::open(&self.path)?))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
