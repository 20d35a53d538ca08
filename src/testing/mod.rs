//! Offline test doubles: a scriptable video device, an in-memory buffer
//! mapper and a recording callback channel. No hardware required.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::errors::{HalError, HalResult};
use crate::request::{CameraCallbacks, CaptureResult, NotifyMessage};
use crate::v4l2::gralloc::{BufferHandle, BufferMapper, MappedRegion};
use crate::v4l2::raw;
use crate::v4l2::videodev::{Videodev, VideodevProvider};
use crate::v4l2::wrapper::V4l2Wrapper;
use crate::camera::V4l2Camera;

fn errno(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

/// Description of one scripted control.
#[derive(Debug, Clone)]
pub struct FakeControl {
    pub control_type: u32,
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
    pub flags: u32,
    /// Valid menu indexes, for menu-typed controls.
    pub menu_entries: Vec<u32>,
    pub value: i32,
}

impl FakeControl {
    pub fn boolean(default_value: i32) -> Self {
        Self {
            control_type: raw::CTRL_TYPE_BOOLEAN,
            minimum: 0,
            maximum: 1,
            step: 1,
            default_value,
            flags: 0,
            menu_entries: Vec::new(),
            value: default_value,
        }
    }

    pub fn menu(minimum: i32, maximum: i32, default_value: i32, entries: Vec<u32>) -> Self {
        Self {
            control_type: raw::CTRL_TYPE_MENU,
            minimum,
            maximum,
            step: 1,
            default_value,
            flags: 0,
            menu_entries: entries,
            value: default_value,
        }
    }
}

/// Per-ioctl call counters, for idempotence assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoctlCounters {
    pub s_fmt: u32,
    pub reqbufs: u32,
    pub qbuf: u32,
    pub dqbuf: u32,
    pub stream_on: u32,
    pub stream_off: u32,
}

struct FakeState {
    controls: BTreeMap<u32, FakeControl>,
    formats: Vec<u32>,
    frame_sizes: BTreeMap<u32, Vec<(u32, u32)>>,
    /// (fourcc, width, height) -> frame intervals as fractions of a second.
    frame_intervals: BTreeMap<(u32, u32, u32), Vec<(u32, u32)>>,
    /// Forced errno for VIDIOC_QUERY_EXT_CTRL; models pre-extended drivers.
    ext_ctrl_errno: Option<i32>,
    /// Driver-side coercion of requested width/height.
    coerce_size_to: Option<(u32, u32)>,
    reqbufs_grant: u32,
    qbuf_errno: Option<i32>,
    dqbuf_errno: Option<i32>,
    current_format: Option<(u32, u32, u32)>,
    queued: VecDeque<(libc::c_ulong, u32)>,
    streaming: bool,
    sequence: u32,
    counters: IoctlCounters,
}

impl FakeState {
    fn sizeimage(&self) -> u32 {
        match self.current_format {
            Some((_, width, height)) => width * height * 2,
            None => 0,
        }
    }
}

/// A scriptable V4L2 device. Cloning shares the scripted state, so a test
/// can keep a handle while the wrapper owns the connection.
#[derive(Clone)]
pub struct FakeDevice {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDevice {
    /// A device satisfying the HAL's baseline: YUV 4:2:0 plus JPEG at two
    /// sizes, 15-30 FPS.
    pub fn new() -> Self {
        let sizes = vec![(640u32, 480u32), (1280, 720)];
        let intervals = vec![(1u32, 30u32), (1, 15)];
        let mut frame_sizes = BTreeMap::new();
        let mut frame_intervals = BTreeMap::new();
        for fourcc in [raw::PIX_FMT_YUV420, raw::PIX_FMT_JPEG] {
            frame_sizes.insert(fourcc, sizes.clone());
            for &(w, h) in &sizes {
                frame_intervals.insert((fourcc, w, h), intervals.clone());
            }
        }
        Self {
            state: Arc::new(Mutex::new(FakeState {
                controls: BTreeMap::new(),
                formats: vec![raw::PIX_FMT_YUV420, raw::PIX_FMT_JPEG],
                frame_sizes,
                frame_intervals,
                ext_ctrl_errno: None,
                coerce_size_to: None,
                reqbufs_grant: 1,
                qbuf_errno: None,
                dqbuf_errno: None,
                current_format: None,
                queued: VecDeque::new(),
                streaming: false,
                sequence: 0,
                counters: IoctlCounters::default(),
            })),
        }
    }

    pub fn add_control(&self, id: u32, control: FakeControl) -> &Self {
        self.state
            .lock()
            .expect("lock poisoned")
            .controls
            .insert(id, control);
        self
    }

    pub fn set_formats(&self, formats: Vec<u32>) -> &Self {
        self.state.lock().expect("lock poisoned").formats = formats;
        self
    }

    /// Makes VIDIOC_QUERY_EXT_CTRL fail with `code` (e.g. ENOTTY).
    pub fn fail_ext_ctrl_with(&self, code: i32) -> &Self {
        self.state.lock().expect("lock poisoned").ext_ctrl_errno = Some(code);
        self
    }

    pub fn coerce_size_to(&self, width: u32, height: u32) -> &Self {
        self.state.lock().expect("lock poisoned").coerce_size_to = Some((width, height));
        self
    }

    pub fn fail_qbuf_with(&self, code: i32) -> &Self {
        self.state.lock().expect("lock poisoned").qbuf_errno = Some(code);
        self
    }

    pub fn control_value(&self, id: u32) -> Option<i32> {
        self.state
            .lock()
            .expect("lock poisoned")
            .controls
            .get(&id)
            .map(|c| c.value)
    }

    pub fn counters(&self) -> IoctlCounters {
        self.state.lock().expect("lock poisoned").counters
    }

    pub fn queued_len(&self) -> usize {
        self.state.lock().expect("lock poisoned").queued.len()
    }
}

impl VideodevProvider for FakeDevice {
    fn open(&self) -> HalResult<Box<dyn Videodev>> {
        Ok(Box::new(FakeConnection {
            state: self.state.clone(),
        }))
    }

    fn describe(&self) -> String {
        "fake-videodev".to_string()
    }
}

struct FakeConnection {
    state: Arc<Mutex<FakeState>>,
}

impl Videodev for FakeConnection {
    fn query_ext_ctrl(&self, query: &mut raw::QueryExtCtrl) -> io::Result<()> {
        let state = self.state.lock().expect("lock poisoned");
        if let Some(code) = state.ext_ctrl_errno {
            return Err(errno(code));
        }
        let id = query.id & !raw::CTRL_FLAG_NEXT_CTRL;
        if id == 0 {
            // NEXT_CTRL probe from connect: report the first control when
            // one exists.
            return match state.controls.iter().next() {
                Some((&first_id, control)) => {
                    fill_ext(query, first_id, control);
                    Ok(())
                }
                None => Err(errno(libc::EINVAL)),
            };
        }
        match state.controls.get(&id) {
            Some(control) => {
                fill_ext(query, id, control);
                Ok(())
            }
            None => Err(errno(libc::EINVAL)),
        }
    }

    fn query_ctrl(&self, query: &mut raw::QueryCtrl) -> io::Result<()> {
        let state = self.state.lock().expect("lock poisoned");
        match state.controls.get(&query.id) {
            Some(control) => {
                query.type_ = control.control_type;
                query.minimum = control.minimum;
                query.maximum = control.maximum;
                query.step = control.step;
                query.default_value = control.default_value;
                query.flags = control.flags;
                Ok(())
            }
            None => Err(errno(libc::EINVAL)),
        }
    }

    fn query_menu(&self, menu: &mut raw::QueryMenu) -> io::Result<()> {
        let state = self.state.lock().expect("lock poisoned");
        let id = menu.id;
        let index = menu.index;
        match state.controls.get(&id) {
            Some(control) if control.menu_entries.contains(&index) => Ok(()),
            _ => Err(errno(libc::EINVAL)),
        }
    }

    fn g_ctrl(&self, control: &mut raw::Control) -> io::Result<()> {
        let state = self.state.lock().expect("lock poisoned");
        match state.controls.get(&control.id) {
            Some(c) => {
                control.value = c.value;
                Ok(())
            }
            None => Err(errno(libc::EINVAL)),
        }
    }

    fn s_ctrl(&self, control: &mut raw::Control) -> io::Result<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        match state.controls.get_mut(&control.id) {
            Some(c) => {
                c.value = control.value.clamp(c.minimum, c.maximum);
                control.value = c.value;
                Ok(())
            }
            None => Err(errno(libc::EINVAL)),
        }
    }

    fn s_fmt(&self, format: &mut raw::Format) -> io::Result<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.counters.s_fmt += 1;
        let mut pix = unsafe { format.fmt.pix };
        if let Some((width, height)) = state.coerce_size_to {
            pix.width = width;
            pix.height = height;
        }
        pix.bytesperline = pix.width * 2;
        pix.sizeimage = pix.width * pix.height * 2;
        state.current_format = Some((pix.pixelformat, pix.width, pix.height));
        format.fmt.pix = pix;
        Ok(())
    }

    fn enum_fmt(&self, desc: &mut raw::FmtDesc) -> io::Result<()> {
        let state = self.state.lock().expect("lock poisoned");
        match state.formats.get(desc.index as usize) {
            Some(&fourcc) => {
                desc.pixelformat = fourcc;
                Ok(())
            }
            None => Err(errno(libc::EINVAL)),
        }
    }

    fn enum_frame_sizes(&self, sizes: &mut raw::FrmSizeEnum) -> io::Result<()> {
        let state = self.state.lock().expect("lock poisoned");
        let list = state
            .frame_sizes
            .get(&sizes.pixel_format)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        match list.get(sizes.index as usize) {
            Some(&(width, height)) => {
                sizes.type_ = raw::FRMSIZE_TYPE_DISCRETE;
                sizes.size.discrete = raw::FrmSizeDiscrete { width, height };
                Ok(())
            }
            None => Err(errno(libc::EINVAL)),
        }
    }

    fn enum_frame_intervals(&self, intervals: &mut raw::FrmIvalEnum) -> io::Result<()> {
        let state = self.state.lock().expect("lock poisoned");
        let key = (intervals.pixel_format, intervals.width, intervals.height);
        let list = state
            .frame_intervals
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        match list.get(intervals.index as usize) {
            Some(&(numerator, denominator)) => {
                intervals.type_ = raw::FRMIVAL_TYPE_DISCRETE;
                intervals.interval.discrete = raw::Fract {
                    numerator,
                    denominator,
                };
                Ok(())
            }
            None => Err(errno(libc::EINVAL)),
        }
    }

    fn req_bufs(&self, request: &mut raw::RequestBuffers) -> io::Result<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.counters.reqbufs += 1;
        state.queued.clear();
        request.count = state.reqbufs_grant;
        Ok(())
    }

    fn query_buf(&self, buffer: &mut raw::Buffer) -> io::Result<()> {
        let state = self.state.lock().expect("lock poisoned");
        if state.current_format.is_none() {
            return Err(errno(libc::EINVAL));
        }
        if buffer.index != 0 {
            return Err(errno(libc::EINVAL));
        }
        buffer.length = state.sizeimage();
        Ok(())
    }

    fn qbuf(&self, buffer: &mut raw::Buffer) -> io::Result<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.counters.qbuf += 1;
        if let Some(code) = state.qbuf_errno {
            return Err(errno(code));
        }
        if !state.queued.is_empty() {
            // The single user-pointer slot is taken.
            return Err(errno(libc::EINVAL));
        }
        let userptr = unsafe { buffer.m.userptr };
        state.queued.push_back((userptr, buffer.length));
        Ok(())
    }

    fn dqbuf(&self, buffer: &mut raw::Buffer) -> io::Result<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.counters.dqbuf += 1;
        if let Some(code) = state.dqbuf_errno {
            return Err(errno(code));
        }
        match state.queued.pop_front() {
            Some((userptr, length)) => {
                state.sequence += 1;
                buffer.index = 0;
                buffer.m.userptr = userptr;
                buffer.length = length;
                buffer.bytesused = length;
                buffer.sequence = state.sequence;
                Ok(())
            }
            None => Err(errno(libc::EAGAIN)),
        }
    }

    fn stream_on(&self, _buf_type: u32) -> io::Result<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.counters.stream_on += 1;
        state.streaming = true;
        Ok(())
    }

    fn stream_off(&self, _buf_type: u32) -> io::Result<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.counters.stream_off += 1;
        state.streaming = false;
        state.queued.clear();
        Ok(())
    }
}

fn fill_ext(query: &mut raw::QueryExtCtrl, id: u32, control: &FakeControl) {
    query.id = id;
    query.type_ = control.control_type;
    query.minimum = control.minimum as i64;
    query.maximum = control.maximum as i64;
    query.step = control.step.max(0) as u64;
    query.default_value = control.default_value as i64;
    query.flags = control.flags;
    query.elem_size = std::mem::size_of::<i32>() as u32;
    query.elems = 1;
    query.nr_of_dims = 0;
    query.dims = [0; 4];
}

struct FakeBuffer {
    storage: Box<[u8]>,
    locked: bool,
}

/// Allocates fixed-size heap buffers per handle; stands in for the
/// framework's graphics allocator.
pub struct FakeBufferMapper {
    buffer_size: usize,
    buffers: Mutex<HashMap<u64, FakeBuffer>>,
}

impl FakeBufferMapper {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            buffers: Mutex::new(HashMap::new()),
        }
    }

    pub fn active_locks(&self) -> usize {
        self.buffers
            .lock()
            .expect("lock poisoned")
            .values()
            .filter(|b| b.locked)
            .count()
    }
}

impl BufferMapper for FakeBufferMapper {
    fn lock(&self, handle: BufferHandle, _size: usize) -> HalResult<MappedRegion> {
        let mut buffers = self.buffers.lock().expect("lock poisoned");
        let buffer = buffers.entry(handle.0).or_insert_with(|| FakeBuffer {
            storage: vec![0u8; self.buffer_size].into_boxed_slice(),
            locked: false,
        });
        if buffer.locked {
            return Err(HalError::invalid_argument(format!(
                "buffer {handle:?} is already locked"
            )));
        }
        buffer.locked = true;
        Ok(MappedRegion {
            addr: buffer.storage.as_ptr() as usize,
            len: buffer.storage.len(),
        })
    }

    fn unlock(&self, handle: BufferHandle) -> HalResult<()> {
        let mut buffers = self.buffers.lock().expect("lock poisoned");
        match buffers.get_mut(&handle.0) {
            Some(buffer) if buffer.locked => {
                buffer.locked = false;
                Ok(())
            }
            _ => Err(HalError::invalid_argument(format!(
                "buffer {handle:?} is not locked"
            ))),
        }
    }
}

#[derive(Default)]
struct Recorded {
    notifications: Vec<NotifyMessage>,
    results: Vec<CaptureResult>,
}

/// Captures callbacks for assertions; supports waiting on asynchronous
/// results.
#[derive(Default)]
pub struct RecordingCallbacks {
    recorded: Mutex<Recorded>,
    cv: Condvar,
}

impl RecordingCallbacks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notifications(&self) -> Vec<NotifyMessage> {
        self.recorded
            .lock()
            .expect("lock poisoned")
            .notifications
            .clone()
    }

    pub fn result_count(&self) -> usize {
        self.recorded.lock().expect("lock poisoned").results.len()
    }

    pub fn with_results<R>(&self, f: impl FnOnce(&[CaptureResult]) -> R) -> R {
        f(&self.recorded.lock().expect("lock poisoned").results)
    }

    /// Waits until at least `count` results arrived. Returns false on
    /// timeout.
    pub fn wait_for_results(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut recorded = self.recorded.lock().expect("lock poisoned");
        while recorded.results.len() < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let (guard, _) = self
                .cv
                .wait_timeout(recorded, remaining)
                .expect("lock poisoned");
            recorded = guard;
        }
        true
    }
}

impl CameraCallbacks for RecordingCallbacks {
    fn notify(&self, message: NotifyMessage) {
        self.recorded
            .lock()
            .expect("lock poisoned")
            .notifications
            .push(message);
        self.cv.notify_all();
    }

    fn process_capture_result(&self, result: CaptureResult) {
        self.recorded
            .lock()
            .expect("lock poisoned")
            .results
            .push(result);
        self.cv.notify_all();
    }
}

/// A wrapper over a fresh default fake device.
pub fn fake_wrapper() -> (Arc<V4l2Wrapper>, FakeDevice, Arc<FakeBufferMapper>) {
    let device = FakeDevice::new();
    let mapper = Arc::new(FakeBufferMapper::new(1280 * 720 * 2));
    let wrapper = Arc::new(V4l2Wrapper::new(Box::new(device.clone()), mapper.clone()));
    (wrapper, device, mapper)
}

/// A camera over a fresh default fake device.
pub fn fake_camera(id: u32) -> (V4l2Camera, FakeDevice, Arc<FakeBufferMapper>) {
    let (wrapper, device, mapper) = fake_wrapper();
    (V4l2Camera::new(id, wrapper), device, mapper)
}
