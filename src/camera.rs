//! Per-camera request/result pipeline.
//!
//! A camera moves through closed -> opened -> configured -> streaming and
//! back. Two worker threads drive capture: the enqueuer applies settings and
//! feeds the device, the dequeuer collects filled buffers and issues the
//! shutter notification plus the single result every accepted request is
//! owed.

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;

use crate::characteristics::{build_registry, build_static_characteristics};
use crate::errors::{HalError, HalResult};
use crate::metadata::registry::MetadataRegistry;
use crate::metadata::tags;
use crate::metadata::MetadataBlock;
use crate::request::{
    BufferStatus, CameraCallbacks, CaptureRequest, CaptureResult, ErrorCode, NotifyMessage,
    ResultBuffer,
};
use crate::stream::{validate_stream_set, Stream, StreamConfig};
use crate::templates::{build_template, RequestTemplate};
use crate::v4l2::format::StreamFormat;
use crate::v4l2::gralloc::BufferHandle;
use crate::v4l2::wrapper::V4l2Wrapper;

/// How long to wait for a buffer's acquire fence before failing the request.
const FENCE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Wire value for the device API version this HAL implements.
pub const DEVICE_API_VERSION_3_4: u32 = 0x304;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Facing {
    Back,
    Front,
    /// V4L2 cannot determine orientation; external is the honest answer.
    External,
}

/// Static per-camera info reported alongside characteristics.
#[derive(Debug, Clone, Serialize)]
pub struct CameraInfo {
    pub id: u32,
    pub device_version: u32,
    pub facing: Facing,
    pub orientation: u32,
    pub resource_cost: u32,
    pub conflicting_devices: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
enum Phase {
    Closed,
    Opened,
    Configured,
    Streaming,
}

/// A request that survived validation, detached from its fences.
struct PendingRequest {
    frame_number: u32,
    settings: Arc<MetadataBlock>,
    buffers: Vec<(u64, BufferHandle)>,
}

struct QueueInner<T> {
    items: VecDeque<T>,
    capacity: usize,
    closed: bool,
}

/// FIFO handoff between the framework thread and the workers. A closed
/// queue still yields its remaining items so shutdown can drain them.
struct RequestQueue<T> {
    inner: Mutex<QueueInner<T>>,
    cv: Condvar,
}

impl<T> RequestQueue<T> {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                capacity,
                closed: false,
            }),
            cv: Condvar::new(),
        }
    }

    /// Blocks while the queue is full. Returns the item when the queue is
    /// closed instead of accepting it.
    fn push_wait(&self, item: T) -> Result<(), T> {
        let mut g = self.inner.lock().expect("lock poisoned");
        loop {
            if g.closed {
                return Err(item);
            }
            if g.capacity == 0 || g.items.len() < g.capacity {
                g.items.push_back(item);
                self.cv.notify_all();
                return Ok(());
            }
            g = self.cv.wait(g).expect("lock poisoned");
        }
    }

    /// Blocks until an item arrives; `None` once closed and drained.
    fn pop_wait(&self) -> Option<T> {
        let mut g = self.inner.lock().expect("lock poisoned");
        loop {
            if let Some(item) = g.items.pop_front() {
                self.cv.notify_all();
                return Some(item);
            }
            if g.closed {
                return None;
            }
            g = self.cv.wait(g).expect("lock poisoned");
        }
    }

    fn close(&self) {
        self.inner.lock().expect("lock poisoned").closed = true;
        self.cv.notify_all();
    }

    fn reopen(&self) {
        let mut g = self.inner.lock().expect("lock poisoned");
        g.closed = false;
        g.items.clear();
    }
}

struct PipelineState {
    phase: Phase,
    callbacks: Option<Arc<dyn CameraCallbacks>>,
    streams: Vec<Arc<Stream>>,
    /// Last settings block that passed validation; reused by empty-settings
    /// requests, invalidated by stream reconfiguration.
    last_settings: Option<Arc<MetadataBlock>>,
    last_frame_number: Option<u32>,
}

#[derive(Default)]
struct StaticCache {
    characteristics: Option<Arc<MetadataBlock>>,
    templates: HashMap<RequestTemplate, Arc<MetadataBlock>>,
}

struct CameraInner {
    id: u32,
    device: Arc<V4l2Wrapper>,
    registry: Mutex<Option<Arc<MetadataRegistry>>>,
    state: Mutex<PipelineState>,
    static_info: Mutex<StaticCache>,
    waiting: RequestQueue<PendingRequest>,
    in_flight: RequestQueue<PendingRequest>,
    /// Tokens for the device's single user-pointer slot: the enqueuer takes
    /// one before QBUF, the dequeuer returns it after DQBUF. Keeps a second
    /// buffer from being queued while the slot is occupied.
    device_slots: RequestQueue<()>,
    /// Accepted requests that have not reached their terminal callback yet.
    /// Covers the window where a request sits in neither queue.
    outstanding: AtomicUsize,
    closing: AtomicBool,
}

/// One camera as exposed through the framework's device-operations table.
pub struct V4l2Camera {
    inner: Arc<CameraInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl V4l2Camera {
    pub fn new(id: u32, device: Arc<V4l2Wrapper>) -> Self {
        Self {
            inner: Arc::new(CameraInner {
                id,
                device,
                registry: Mutex::new(None),
                state: Mutex::new(PipelineState {
                    phase: Phase::Closed,
                    callbacks: None,
                    streams: Vec::new(),
                    last_settings: None,
                    last_frame_number: None,
                }),
                static_info: Mutex::new(StaticCache::default()),
                waiting: RequestQueue::new(0),
                in_flight: RequestQueue::new(1),
                device_slots: RequestQueue::new(1),
                outstanding: AtomicUsize::new(0),
                closing: AtomicBool::new(false),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> u32 {
        self.inner.id
    }

    pub fn info(&self) -> CameraInfo {
        CameraInfo {
            id: self.inner.id,
            device_version: DEVICE_API_VERSION_3_4,
            facing: Facing::External,
            orientation: 0,
            resource_cost: 100,
            conflicting_devices: Vec::new(),
        }
    }

    /// Connects the device and assembles its metadata. Fails `Busy` when the
    /// camera is already open.
    pub fn open(&self) -> HalResult<()> {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        if state.phase != Phase::Closed {
            return Err(HalError::busy(format!(
                "camera {} is already open",
                self.inner.id
            )));
        }

        self.inner.device.connect()?;
        let registry = match build_registry(&self.inner.device) {
            Ok(registry) => Arc::new(registry),
            Err(e) => {
                let _ = self.inner.device.disconnect();
                return Err(e);
            }
        };
        *self.inner.registry.lock().expect("lock poisoned") = Some(registry);
        *self.inner.static_info.lock().expect("lock poisoned") = StaticCache::default();

        self.inner.closing.store(false, Ordering::Release);
        self.inner.outstanding.store(0, Ordering::Release);
        self.inner.waiting.reopen();
        self.inner.in_flight.reopen();
        self.inner.device_slots.reopen();
        let _ = self.inner.device_slots.push_wait(());

        let mut workers = self.workers.lock().expect("lock poisoned");
        let enqueue_inner = self.inner.clone();
        workers.push(
            std::thread::Builder::new()
                .name(format!("v4l2-camera{}-enqueue", self.inner.id))
                .spawn(move || enqueue_loop(enqueue_inner))
                .map_err(|e| HalError::io("spawning enqueue worker", e))?,
        );
        let dequeue_inner = self.inner.clone();
        workers.push(
            std::thread::Builder::new()
                .name(format!("v4l2-camera{}-dequeue", self.inner.id))
                .spawn(move || dequeue_loop(dequeue_inner))
                .map_err(|e| HalError::io("spawning dequeue worker", e))?,
        );

        state.phase = Phase::Opened;
        log::info!("camera {} opened", self.inner.id);
        Ok(())
    }

    /// Stores the framework callback channel and pre-populates the static
    /// characteristics and templates. Idempotent per open session.
    pub fn initialize(&self, callbacks: Arc<dyn CameraCallbacks>) -> HalResult<()> {
        {
            let mut state = self.inner.state.lock().expect("lock poisoned");
            if state.phase == Phase::Closed {
                return Err(HalError::no_device("initialize on a closed camera"));
            }
            state.callbacks = Some(callbacks);
        }
        self.static_characteristics()?;
        Ok(())
    }

    /// The camera's static characteristics, built lazily and shared
    /// read-only afterwards.
    pub fn static_characteristics(&self) -> HalResult<Arc<MetadataBlock>> {
        let registry = self.registry()?;
        let mut cache = self.inner.static_info.lock().expect("lock poisoned");
        ensure_static(&registry, &mut cache)?;
        Ok(cache.characteristics.clone().expect("just built"))
    }

    /// Default request settings for a template; `None` for valid but
    /// unsupported template ids.
    pub fn construct_default_request_settings(
        &self,
        template: RequestTemplate,
    ) -> HalResult<Option<Arc<MetadataBlock>>> {
        if !template.is_supported() {
            return Ok(None);
        }
        let registry = self.registry()?;
        let mut cache = self.inner.static_info.lock().expect("lock poisoned");
        ensure_static(&registry, &mut cache)?;
        if let Some(block) = cache.templates.get(&template) {
            return Ok(Some(block.clone()));
        }
        let base = cache.characteristics.clone().expect("just built");
        let block = Arc::new(build_template(&registry, &base, template)?);
        cache.templates.insert(template, block.clone());
        Ok(Some(block))
    }

    /// Replaces the active stream set. A failed validation leaves the
    /// previous configuration untouched.
    pub fn configure_streams(&self, configs: &[StreamConfig]) -> HalResult<()> {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        match state.phase {
            Phase::Closed => return Err(HalError::no_device("camera not open")),
            Phase::Streaming => {
                return Err(HalError::busy("requests still in flight"));
            }
            Phase::Opened | Phase::Configured => {}
        }
        if self.inner.outstanding.load(Ordering::Acquire) != 0 {
            return Err(HalError::busy("requests still queued"));
        }

        let (format, width, height) = validate_stream_set(configs)?;

        self.inner.device.stream_off()?;
        let max_buffers = self
            .inner
            .device
            .set_format(&StreamFormat::for_capture(format.to_v4l2(), width, height))?;

        let mut streams: Vec<Arc<Stream>> = Vec::with_capacity(configs.len());
        for config in configs {
            let stream = state
                .streams
                .iter()
                .find(|s| s.matches(config))
                .cloned()
                .unwrap_or_else(|| Arc::new(Stream::from_config(config)));
            stream.set_max_buffers(max_buffers);
            streams.push(stream);
        }
        // Streams absent from the new set are dropped here.
        state.streams = streams;
        state.last_settings = None;
        state.phase = Phase::Configured;
        log::info!(
            "camera {} configured {} stream(s) at {}x{}",
            self.inner.id,
            configs.len(),
            width,
            height
        );
        Ok(())
    }

    /// Accepts one unit of capture work. Completion is asynchronous: the
    /// result arrives over the callback channel from the worker threads.
    pub fn process_capture_request(&self, mut request: CaptureRequest) -> HalResult<()> {
        let (callbacks, settings) = {
            let mut state = self.inner.state.lock().expect("lock poisoned");
            match state.phase {
                Phase::Configured | Phase::Streaming => {}
                _ => return Err(HalError::invalid_argument("no streams configured")),
            }
            let callbacks = state
                .callbacks
                .clone()
                .ok_or_else(|| HalError::invalid_argument("camera not initialized"))?;

            if let Some(last) = state.last_frame_number {
                if request.frame_number <= last {
                    return Err(HalError::invalid_argument(format!(
                        "frame number {} not monotonic (last {})",
                        request.frame_number, last
                    )));
                }
            }

            if request.output_buffers.is_empty() {
                return Err(HalError::invalid_argument("request has no output buffers"));
            }
            if request.output_buffers.len() > 1 {
                // One V4L2 buffer slot; request-per-stream fan-out is not
                // implemented.
                return Err(HalError::invalid_argument(
                    "multiple output buffers per request not supported",
                ));
            }
            for buffer in &request.output_buffers {
                if !state.streams.iter().any(|s| s.id == buffer.stream_id) {
                    return Err(HalError::invalid_argument(format!(
                        "buffer references unknown stream {}",
                        buffer.stream_id
                    )));
                }
            }

            let settings = if request.settings.is_empty() {
                state.last_settings.clone().ok_or_else(|| {
                    HalError::invalid_argument("empty settings with no prior request")
                })?
            } else {
                let registry = self.registry()?;
                if !registry.is_valid_request(&request.settings)? {
                    return Err(HalError::invalid_argument(
                        "request settings rejected by metadata validation",
                    ));
                }
                let settings = Arc::new(std::mem::take(&mut request.settings));
                state.last_settings = Some(settings.clone());
                settings
            };

            state.last_frame_number = Some(request.frame_number);
            state.phase = Phase::Streaming;
            // Accepted from here on: exactly one terminal callback follows.
            self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
            (callbacks, settings)
        };

        // Fence waits happen outside every lock.
        let fences: Vec<_> = request
            .output_buffers
            .iter_mut()
            .filter_map(|b| b.acquire_fence.take())
            .collect();
        for fence in fences {
            if let Err(e) = fence.wait(FENCE_TIMEOUT) {
                log::error!(
                    "camera {} frame {}: acquire fence failed: {e}",
                    self.inner.id,
                    request.frame_number
                );
                deliver_request_error(&callbacks, pending_from(&request, settings));
                mark_request_done(&self.inner);
                return Ok(());
            }
        }

        let pending = pending_from(&request, settings);
        if let Err(rejected) = self.inner.waiting.push_wait(pending) {
            // Closing underneath us; the request still gets its one result.
            deliver_request_error(&callbacks, rejected);
            mark_request_done(&self.inner);
        }
        Ok(())
    }

    /// Writes a diagnostic snapshot of the camera to `out`.
    pub fn dump(&self, out: &mut dyn Write) -> std::io::Result<()> {
        #[derive(Serialize)]
        struct DumpState<'a> {
            id: u32,
            phase: Phase,
            busy: bool,
            streams: Vec<&'a Stream>,
        }

        let state = self.inner.state.lock().expect("lock poisoned");
        let snapshot = DumpState {
            id: self.inner.id,
            phase: state.phase,
            busy: state.phase == Phase::Streaming,
            streams: state.streams.iter().map(|s| s.as_ref()).collect(),
        };
        serde_json::to_writer_pretty(&mut *out, &snapshot)?;
        out.write_all(b"\n")
    }

    /// Mid-capture flush is not implemented at this layer.
    pub fn flush(&self) -> HalResult<()> {
        Err(HalError::not_supported("flush"))
    }

    /// Shuts the pipeline down and releases the device. Outstanding
    /// requests are drained to error results first.
    pub fn close(&self) -> HalResult<()> {
        {
            let state = self.inner.state.lock().expect("lock poisoned");
            if state.phase == Phase::Closed {
                return Err(HalError::invalid_argument("camera not open"));
            }
        }

        self.inner.closing.store(true, Ordering::Release);
        self.inner.waiting.close();
        self.inner.in_flight.close();
        self.inner.device_slots.close();
        for worker in self.workers.lock().expect("lock poisoned").drain(..) {
            if worker.join().is_err() {
                log::error!("camera {} worker panicked", self.inner.id);
            }
        }

        let _ = self.inner.device.stream_off();
        self.inner.device.disconnect()?;
        *self.inner.registry.lock().expect("lock poisoned") = None;

        let mut state = self.inner.state.lock().expect("lock poisoned");
        state.phase = Phase::Closed;
        state.callbacks = None;
        state.streams.clear();
        state.last_settings = None;
        state.last_frame_number = None;
        log::info!("camera {} closed", self.inner.id);
        Ok(())
    }

    /// The currently configured streams.
    pub fn configured_streams(&self) -> Vec<Arc<Stream>> {
        self.inner
            .state
            .lock()
            .expect("lock poisoned")
            .streams
            .clone()
    }

    fn registry(&self) -> HalResult<Arc<MetadataRegistry>> {
        self.inner
            .registry
            .lock()
            .expect("lock poisoned")
            .clone()
            .ok_or_else(|| HalError::no_device("camera not open"))
    }
}

impl Drop for V4l2Camera {
    fn drop(&mut self) {
        let open = {
            let state = self.inner.state.lock().expect("lock poisoned");
            state.phase != Phase::Closed
        };
        if open {
            if let Err(e) = self.close() {
                log::warn!("camera {} close during drop failed: {e}", self.inner.id);
            }
        }
    }
}

fn ensure_static(registry: &MetadataRegistry, cache: &mut StaticCache) -> HalResult<()> {
    if cache.characteristics.is_some() {
        return Ok(());
    }
    let (characteristics, preview) = build_static_characteristics(registry)?;
    cache.characteristics = Some(Arc::new(characteristics));
    cache
        .templates
        .insert(RequestTemplate::Preview, Arc::new(preview));
    Ok(())
}

fn pending_from(request: &CaptureRequest, settings: Arc<MetadataBlock>) -> PendingRequest {
    PendingRequest {
        frame_number: request.frame_number,
        settings,
        buffers: request
            .output_buffers
            .iter()
            .map(|b| (b.stream_id, b.buffer))
            .collect(),
    }
}

fn callbacks_of(inner: &CameraInner) -> Option<Arc<dyn CameraCallbacks>> {
    inner.state.lock().expect("lock poisoned").callbacks.clone()
}

fn error_buffers(pending: &PendingRequest) -> Vec<ResultBuffer> {
    pending
        .buffers
        .iter()
        .map(|&(stream_id, buffer)| ResultBuffer {
            stream_id,
            buffer,
            status: BufferStatus::Error,
            release_fence: None,
        })
        .collect()
}

/// The one-error-result path: an ERROR_REQUEST notify followed by a result
/// returning every buffer with error status.
fn deliver_request_error(callbacks: &Arc<dyn CameraCallbacks>, pending: PendingRequest) {
    callbacks.notify(NotifyMessage::Error {
        frame_number: pending.frame_number,
        error_code: ErrorCode::Request,
    });
    callbacks.process_capture_result(CaptureResult {
        frame_number: pending.frame_number,
        metadata: MetadataBlock::new(),
        buffers: error_buffers(&pending),
        partial_result: 1,
    });
}

fn send_request_error(inner: &CameraInner, pending: PendingRequest) {
    match callbacks_of(inner) {
        Some(callbacks) => deliver_request_error(&callbacks, pending),
        None => log::error!(
            "camera {}: dropping error result for frame {} with no callbacks",
            inner.id,
            pending.frame_number
        ),
    }
    mark_request_done(inner);
}

/// Marks one accepted request terminal and lets the pipeline fall back to
/// the configured state once nothing is outstanding.
fn mark_request_done(inner: &CameraInner) {
    inner.outstanding.fetch_sub(1, Ordering::AcqRel);
    let mut state = inner.state.lock().expect("lock poisoned");
    if state.phase == Phase::Streaming && inner.outstanding.load(Ordering::Acquire) == 0 {
        state.phase = Phase::Configured;
    }
}

fn enqueue_loop(inner: Arc<CameraInner>) {
    while let Some(pending) = inner.waiting.pop_wait() {
        if inner.closing.load(Ordering::Acquire) {
            send_request_error(&inner, pending);
            continue;
        }
        // Wait for the device's buffer slot; a closed token queue means the
        // camera is shutting down.
        if inner.device_slots.pop_wait().is_none() {
            send_request_error(&inner, pending);
            continue;
        }
        if let Err(e) = enqueue_one(&inner, &pending) {
            log::error!(
                "camera {} frame {}: enqueue failed: {e}",
                inner.id,
                pending.frame_number
            );
            let _ = inner.device_slots.push_wait(());
            send_request_error(&inner, pending);
            continue;
        }
        if let Err(rejected) = inner.in_flight.push_wait(pending) {
            let _ = inner.device_slots.push_wait(());
            send_request_error(&inner, rejected);
        }
    }
    log::debug!("camera {} enqueue worker exiting", inner.id);
}

fn enqueue_one(inner: &CameraInner, pending: &PendingRequest) -> HalResult<()> {
    let registry = inner
        .registry
        .lock()
        .expect("lock poisoned")
        .clone()
        .ok_or_else(|| HalError::no_device("registry gone"))?;
    registry.apply_request(&pending.settings)?;
    let (_, handle) = pending.buffers[0];
    inner.device.enqueue_buffer(handle)?;
    inner.device.stream_on()?;
    Ok(())
}

fn dequeue_loop(inner: Arc<CameraInner>) {
    while let Some(pending) = inner.in_flight.pop_wait() {
        let completion = complete_one(&inner, &pending);
        // The slot frees once DQBUF has settled, success or not.
        let _ = inner.device_slots.push_wait(());
        match completion {
            Ok(()) => mark_request_done(&inner),
            Err(e) => {
                log::error!(
                    "camera {} frame {}: completion failed: {e}",
                    inner.id,
                    pending.frame_number
                );
                send_request_error(&inner, pending);
            }
        }
    }
    log::debug!("camera {} dequeue worker exiting", inner.id);
}

fn complete_one(inner: &CameraInner, pending: &PendingRequest) -> HalResult<()> {
    let dequeued = inner.device.dequeue_buffer()?;
    let (stream_id, handle) = pending.buffers[0];
    if dequeued.handle != handle {
        log::warn!(
            "camera {}: dequeued {:?} but frame {} queued {:?}",
            inner.id,
            dequeued.handle,
            pending.frame_number,
            handle
        );
    }

    let registry = inner
        .registry
        .lock()
        .expect("lock poisoned")
        .clone()
        .ok_or_else(|| HalError::no_device("registry gone"))?;
    let mut metadata = (*pending.settings).clone();
    registry.fill_result(&mut metadata)?;
    let timestamp_ns = metadata
        .get_one::<i64>(tags::SENSOR_TIMESTAMP)
        .ok_or_else(|| {
            HalError::invalid_argument("result metadata missing the shutter timestamp")
        })?;

    let callbacks =
        callbacks_of(inner).ok_or_else(|| HalError::invalid_argument("no callbacks"))?;
    callbacks.notify(NotifyMessage::Shutter {
        frame_number: pending.frame_number,
        timestamp_ns,
    });
    callbacks.process_capture_result(CaptureResult {
        frame_number: pending.frame_number,
        metadata,
        buffers: vec![ResultBuffer {
            stream_id,
            buffer: handle,
            status: BufferStatus::Ok,
            release_fence: None,
        }],
        partial_result: 1,
    });
    Ok(())
}
