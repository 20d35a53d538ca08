//! Thread-safe V4L2 device handle.
//!
//! One mutex serializes every ioctl-bearing operation and guards the cached
//! connection state: the open device, the negotiated format, the
//! driver-reported buffer count and the extended-control-query capability.

use std::sync::{Arc, Mutex};

use crate::errors::{HalError, HalResult};
use crate::v4l2::format::{fourcc_to_string, StreamFormat};
use crate::v4l2::gralloc::{BufferHandle, BufferMapper, GrallocBridge};
use crate::v4l2::raw;
use crate::v4l2::videodev::{DevicePath, Videodev, VideodevProvider};

/// Driver-independent view of a control query, normalized to the extended
/// shape regardless of which ioctl produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlQuery {
    pub id: u32,
    pub control_type: u32,
    pub minimum: i64,
    pub maximum: i64,
    pub step: u64,
    pub default_value: i64,
    pub flags: u32,
    pub elem_size: u32,
    pub elems: u32,
    pub nr_of_dims: u32,
    pub dims: [u32; 4],
}

impl ControlQuery {
    fn from_extended(query: &raw::QueryExtCtrl) -> Self {
        Self {
            id: query.id,
            control_type: query.type_,
            minimum: query.minimum,
            maximum: query.maximum,
            step: query.step,
            default_value: query.default_value,
            flags: query.flags,
            elem_size: query.elem_size,
            elems: query.elems,
            nr_of_dims: query.nr_of_dims,
            dims: query.dims,
        }
    }

    fn from_legacy(query: &raw::QueryCtrl) -> Self {
        // Bitmask controls widen 32 -> 64 with zero extension for maximum
        // and default_value, per the V4L2 documentation. Everything else is
        // an ordinary sign extension.
        let (minimum, maximum, default_value) = if query.type_ == raw::CTRL_TYPE_BITMASK {
            (
                query.minimum as u32 as i64,
                query.maximum as u32 as i64,
                query.default_value as u32 as i64,
            )
        } else {
            (
                query.minimum as i64,
                query.maximum as i64,
                query.default_value as i64,
            )
        };
        Self {
            id: query.id,
            control_type: query.type_,
            minimum,
            maximum,
            step: query.step.max(0) as u64,
            default_value,
            flags: query.flags,
            elem_size: std::mem::size_of::<i32>() as u32,
            elems: 1,
            nr_of_dims: 0,
            dims: [0; 4],
        }
    }
}

/// A buffer handed back by the driver.
#[derive(Debug, Clone, Copy)]
pub struct DequeuedBuffer {
    pub handle: BufferHandle,
    pub index: u32,
    pub bytes_used: u32,
    pub sequence: u32,
}

struct Connection {
    device: Box<dyn Videodev>,
    extended_query_supported: bool,
    /// Negotiated format and the matching driver buffer count.
    format: Option<(StreamFormat, u32)>,
    streaming: bool,
}

/// Serialized access to one video capture device.
pub struct V4l2Wrapper {
    provider: Box<dyn VideodevProvider>,
    gralloc: GrallocBridge,
    connection: Mutex<Option<Connection>>,
}

impl V4l2Wrapper {
    pub fn new(provider: Box<dyn VideodevProvider>, mapper: Arc<dyn BufferMapper>) -> Self {
        Self {
            provider,
            gralloc: GrallocBridge::new(mapper),
            connection: Mutex::new(None),
        }
    }

    pub fn for_path(path: &str, mapper: Arc<dyn BufferMapper>) -> Self {
        Self::new(Box::new(DevicePath::new(path)), mapper)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.lock().expect("lock poisoned").is_some()
    }

    /// Opens the device and probes for extended control query support.
    pub fn connect(&self) -> HalResult<()> {
        let mut guard = self.connection.lock().expect("lock poisoned");
        if guard.is_some() {
            return Err(HalError::busy(format!(
                "{} is already connected",
                self.provider.describe()
            )));
        }

        let device = self.provider.open()?;
        let mut probe = raw::QueryExtCtrl::zeroed();
        probe.id = raw::CTRL_FLAG_NEXT_CTRL;
        let extended_query_supported = match device.query_ext_ctrl(&mut probe) {
            Ok(()) => true,
            // ENOTTY means the ioctl itself is missing; any other failure
            // (including "no controls at all") still proves support.
            Err(e) => e.raw_os_error() != Some(libc::ENOTTY),
        };
        log::info!(
            "connected to {} (extended control queries: {})",
            self.provider.describe(),
            extended_query_supported
        );

        *guard = Some(Connection {
            device,
            extended_query_supported,
            format: None,
            streaming: false,
        });
        Ok(())
    }

    /// Closes the device, drops the format cache and releases any buffers
    /// the gralloc bridge still holds locked.
    pub fn disconnect(&self) -> HalResult<()> {
        let mut guard = self.connection.lock().expect("lock poisoned");
        if guard.take().is_none() {
            log::warn!("disconnect on unconnected {}", self.provider.describe());
        }
        drop(guard);
        self.gralloc.unlock_all();
        Ok(())
    }

    pub fn query_control(&self, id: u32) -> HalResult<ControlQuery> {
        let mut guard = self.connection.lock().expect("lock poisoned");
        let conn = connected(&mut guard)?;

        if conn.extended_query_supported {
            let mut query = raw::QueryExtCtrl::zeroed();
            query.id = id;
            match conn.device.query_ext_ctrl(&mut query) {
                Ok(()) => return Ok(ControlQuery::from_extended(&query)),
                Err(e) if e.raw_os_error() == Some(libc::ENOTTY) => {
                    log::warn!("extended control query unimplemented, falling back");
                }
                Err(e) => return Err(HalError::io(format!("query_ext_ctrl {id:#x}"), e)),
            }
        }

        let mut query = raw::QueryCtrl::zeroed();
        query.id = id;
        conn.device
            .query_ctrl(&mut query)
            .map_err(|e| HalError::io(format!("queryctrl {id:#x}"), e))?;
        Ok(ControlQuery::from_legacy(&query))
    }

    /// Checks whether `index` is a valid entry of a menu control.
    pub fn query_menu(&self, id: u32, index: i64) -> HalResult<()> {
        let mut guard = self.connection.lock().expect("lock poisoned");
        let conn = connected(&mut guard)?;
        let mut menu = raw::QueryMenu::zeroed();
        menu.id = id;
        menu.index = index as u32;
        conn.device
            .query_menu(&mut menu)
            .map_err(|e| HalError::io(format!("querymenu {id:#x}[{index}]"), e))
    }

    pub fn get_control(&self, id: u32) -> HalResult<i32> {
        let mut guard = self.connection.lock().expect("lock poisoned");
        let conn = connected(&mut guard)?;
        let mut control = raw::Control { id, value: 0 };
        conn.device
            .g_ctrl(&mut control)
            .map_err(|e| HalError::io(format!("g_ctrl {id:#x}"), e))?;
        Ok(control.value)
    }

    /// Writes `desired` and returns the value the driver settled on.
    pub fn set_control(&self, id: u32, desired: i32) -> HalResult<i32> {
        let mut guard = self.connection.lock().expect("lock poisoned");
        let conn = connected(&mut guard)?;
        let mut control = raw::Control { id, value: desired };
        conn.device
            .s_ctrl(&mut control)
            .map_err(|e| HalError::io(format!("s_ctrl {id:#x}"), e))?;
        Ok(control.value)
    }

    pub fn stream_on(&self) -> HalResult<()> {
        let mut guard = self.connection.lock().expect("lock poisoned");
        let conn = connected(&mut guard)?;
        if conn.streaming {
            return Ok(());
        }
        conn.device
            .stream_on(raw::BUF_TYPE_VIDEO_CAPTURE)
            .map_err(|e| HalError::io("streamon", e))?;
        conn.streaming = true;
        Ok(())
    }

    /// Stops streaming. The driver returns every queued buffer on stream
    /// off, so all gralloc locks are released too.
    pub fn stream_off(&self) -> HalResult<()> {
        let mut guard = self.connection.lock().expect("lock poisoned");
        let conn = connected(&mut guard)?;
        let result = if conn.streaming {
            conn.device
                .stream_off(raw::BUF_TYPE_VIDEO_CAPTURE)
                .map_err(|e| HalError::io("streamoff", e))
        } else {
            Ok(())
        };
        conn.streaming = false;
        drop(guard);
        self.gralloc.unlock_all();
        result
    }

    /// Negotiates `desired` and returns the driver's buffer count. Skips the
    /// ioctls entirely when the format already matches; rejects any driver
    /// coercion of the requested parameters.
    pub fn set_format(&self, desired: &StreamFormat) -> HalResult<u32> {
        let mut guard = self.connection.lock().expect("lock poisoned");
        let conn = connected(&mut guard)?;

        if let Some((current, max_buffers)) = conn.format {
            if current.matches_request(desired) {
                return Ok(max_buffers);
            }
        }

        let mut raw_format = desired.to_raw();
        conn.device
            .s_fmt(&mut raw_format)
            .map_err(|e| HalError::io("s_fmt", e))?;
        let actual = StreamFormat::from_raw(&raw_format);
        if !actual.matches_request(desired) {
            return Err(HalError::invalid_argument(format!(
                "driver coerced format to {}x{} {}",
                actual.width,
                actual.height,
                fourcc_to_string(actual.fourcc)
            )));
        }

        let max_buffers = setup_buffers(conn, &self.gralloc)?;
        conn.format = Some((actual, max_buffers));
        log::info!(
            "format set to {}x{} {} ({} buffers)",
            actual.width,
            actual.height,
            fourcc_to_string(actual.fourcc),
            max_buffers
        );
        Ok(max_buffers)
    }

    /// Enqueues `handle` as the device's user-pointer buffer.
    pub fn enqueue_buffer(&self, handle: BufferHandle) -> HalResult<()> {
        let mut guard = self.connection.lock().expect("lock poisoned");
        let conn = connected(&mut guard)?;
        if conn.format.is_none() {
            return Err(HalError::invalid_argument(
                "enqueue_buffer before set_format",
            ));
        }

        let mut buffer = raw::Buffer::zeroed();
        buffer.type_ = raw::BUF_TYPE_VIDEO_CAPTURE;
        buffer.memory = raw::MEMORY_USERPTR;
        buffer.index = 0;
        conn.device
            .query_buf(&mut buffer)
            .map_err(|e| HalError::io("querybuf", e))?;

        let region = self.gralloc.lock(handle, buffer.length as usize)?;
        buffer.m.userptr = region.addr as libc::c_ulong;
        buffer.length = region.len as u32;
        if let Err(e) = conn.device.qbuf(&mut buffer) {
            let _ = self.gralloc.unlock_by_addr(region.addr);
            return Err(HalError::io("qbuf", e));
        }
        Ok(())
    }

    /// Dequeues the filled buffer and unlocks its gralloc mapping.
    pub fn dequeue_buffer(&self) -> HalResult<DequeuedBuffer> {
        let mut guard = self.connection.lock().expect("lock poisoned");
        let conn = connected(&mut guard)?;
        let mut buffer = raw::Buffer::zeroed();
        buffer.type_ = raw::BUF_TYPE_VIDEO_CAPTURE;
        buffer.memory = raw::MEMORY_USERPTR;
        conn.device
            .dqbuf(&mut buffer)
            .map_err(|e| HalError::io("dqbuf", e))?;

        let addr = unsafe { buffer.m.userptr } as usize;
        let handle = self.gralloc.unlock_by_addr(addr)?;
        Ok(DequeuedBuffer {
            handle,
            index: buffer.index,
            bytes_used: buffer.bytesused,
            sequence: buffer.sequence,
        })
    }

    /// Fourccs the driver can capture, in enumeration order.
    pub fn enumerate_formats(&self) -> HalResult<Vec<u32>> {
        let mut guard = self.connection.lock().expect("lock poisoned");
        let conn = connected(&mut guard)?;
        let mut formats = Vec::new();
        for index in 0.. {
            let mut desc = raw::FmtDesc::zeroed();
            desc.index = index;
            desc.type_ = raw::BUF_TYPE_VIDEO_CAPTURE;
            match conn.device.enum_fmt(&mut desc) {
                Ok(()) => formats.push(desc.pixelformat),
                Err(e) if e.raw_os_error() == Some(libc::EINVAL) => break,
                Err(e) => return Err(HalError::io("enum_fmt", e)),
            }
        }
        Ok(formats)
    }

    /// Frame sizes supported for `fourcc`. Stepwise and continuous ranges
    /// contribute their two extremes.
    pub fn enumerate_frame_sizes(&self, fourcc: u32) -> HalResult<Vec<(u32, u32)>> {
        let mut guard = self.connection.lock().expect("lock poisoned");
        let conn = connected(&mut guard)?;
        let mut sizes = Vec::new();
        for index in 0.. {
            let mut entry = raw::FrmSizeEnum::zeroed();
            entry.index = index;
            entry.pixel_format = fourcc;
            match conn.device.enum_frame_sizes(&mut entry) {
                Ok(()) => match entry.type_ {
                    raw::FRMSIZE_TYPE_DISCRETE => {
                        let d = unsafe { entry.size.discrete };
                        sizes.push((d.width, d.height));
                    }
                    _ => {
                        let s = unsafe { entry.size.stepwise };
                        sizes.push((s.min_width, s.min_height));
                        sizes.push((s.max_width, s.max_height));
                        break;
                    }
                },
                Err(e) if e.raw_os_error() == Some(libc::EINVAL) => break,
                Err(e) => return Err(HalError::io("enum_framesizes", e)),
            }
        }
        sizes.sort_unstable();
        sizes.dedup();
        Ok(sizes)
    }

    /// Min and max frame duration in nanoseconds for `fourcc` at `size`.
    pub fn frame_duration_range(&self, fourcc: u32, size: (u32, u32)) -> HalResult<(i64, i64)> {
        let mut guard = self.connection.lock().expect("lock poisoned");
        let conn = connected(&mut guard)?;
        let mut min = i64::MAX;
        let mut max = i64::MIN;
        for index in 0.. {
            let mut entry = raw::FrmIvalEnum::zeroed();
            entry.index = index;
            entry.pixel_format = fourcc;
            entry.width = size.0;
            entry.height = size.1;
            match conn.device.enum_frame_intervals(&mut entry) {
                Ok(()) => match entry.type_ {
                    raw::FRMIVAL_TYPE_DISCRETE => {
                        let duration = fract_to_ns(unsafe { entry.interval.discrete });
                        min = min.min(duration);
                        max = max.max(duration);
                    }
                    _ => {
                        let s = unsafe { entry.interval.stepwise };
                        min = min.min(fract_to_ns(s.min));
                        max = max.max(fract_to_ns(s.max));
                        break;
                    }
                },
                Err(e) if e.raw_os_error() == Some(libc::EINVAL) => break,
                Err(e) => return Err(HalError::io("enum_frameintervals", e)),
            }
        }
        if min == i64::MAX {
            return Err(HalError::not_supported(format!(
                "no frame intervals for {} at {}x{}",
                fourcc_to_string(fourcc),
                size.0,
                size.1
            )));
        }
        Ok((min, max))
    }
}

fn connected<'a>(guard: &'a mut Option<Connection>) -> HalResult<&'a mut Connection> {
    guard
        .as_mut()
        .ok_or_else(|| HalError::no_device("device not connected"))
}

/// Requests the single user-pointer buffer the one-stream pipeline uses.
fn setup_buffers(conn: &mut Connection, gralloc: &GrallocBridge) -> HalResult<u32> {
    let mut request = raw::RequestBuffers::zeroed();
    request.count = 1;
    request.type_ = raw::BUF_TYPE_VIDEO_CAPTURE;
    request.memory = raw::MEMORY_USERPTR;
    let result = conn
        .device
        .req_bufs(&mut request)
        .map_err(|e| HalError::io("reqbufs", e));
    // Re-requesting buffers invalidates whatever was queued before.
    gralloc.unlock_all();
    result?;
    if request.count < 1 {
        return Err(HalError::no_device("driver granted zero buffers"));
    }
    Ok(request.count)
}

fn fract_to_ns(fract: raw::Fract) -> i64 {
    if fract.denominator == 0 {
        return i64::MAX;
    }
    (fract.numerator as i64)
        .saturating_mul(1_000_000_000)
        .checked_div(fract.denominator as i64)
        .unwrap_or(i64::MAX)
}
