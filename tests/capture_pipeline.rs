//! End-to-end capture behavior over the fake device: the happy path, the
//! one-result-per-request guarantee and the error paths.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use v4l2_camera_hal::errors::HalError;
use v4l2_camera_hal::metadata::tags;
use v4l2_camera_hal::stream::{StreamConfig, StreamType};
use v4l2_camera_hal::testing::{fake_camera, RecordingCallbacks};
use v4l2_camera_hal::{
    BufferHandle, BufferStatus, CaptureRequest, ErrorCode, Fence, HalPixelFormat, MetadataBlock,
    NotifyMessage, RequestTemplate, StreamBuffer,
};

const RESULT_TIMEOUT: Duration = Duration::from_secs(5);

fn preview_stream(id: u64) -> StreamConfig {
    StreamConfig {
        id,
        stream_type: StreamType::Output,
        width: 640,
        height: 480,
        format: HalPixelFormat::Ycbcr420Flex,
        usage: 0,
        rotation_degrees: 0,
    }
}

fn signaled_fence() -> Fence {
    let (mut tx, rx) = UnixStream::pair().unwrap();
    tx.write_all(&[1]).unwrap();
    std::mem::forget(tx);
    Fence::new(rx.into())
}

fn request(frame_number: u32, settings: MetadataBlock, handle: u64) -> CaptureRequest {
    CaptureRequest {
        frame_number,
        settings,
        output_buffers: vec![StreamBuffer {
            stream_id: 1,
            buffer: BufferHandle(handle),
            acquire_fence: Some(signaled_fence()),
        }],
    }
}

fn ready_camera() -> (
    v4l2_camera_hal::V4l2Camera,
    std::sync::Arc<RecordingCallbacks>,
    v4l2_camera_hal::testing::FakeDevice,
    std::sync::Arc<v4l2_camera_hal::testing::FakeBufferMapper>,
) {
    let (camera, device, mapper) = fake_camera(0);
    let callbacks = RecordingCallbacks::new();
    camera.open().unwrap();
    camera.initialize(callbacks.clone()).unwrap();
    camera.configure_streams(&[preview_stream(1)]).unwrap();
    (camera, callbacks, device, mapper)
}

fn preview_settings(camera: &v4l2_camera_hal::V4l2Camera) -> MetadataBlock {
    (*camera
        .construct_default_request_settings(RequestTemplate::Preview)
        .unwrap()
        .unwrap())
    .clone()
}

#[test]
fn capture_happy_path_yields_one_shutter_and_one_result() {
    let (camera, callbacks, _device, mapper) = ready_camera();
    let settings = preview_settings(&camera);

    camera
        .process_capture_request(request(1, settings, 100))
        .unwrap();
    assert!(callbacks.wait_for_results(1, RESULT_TIMEOUT));

    let notifications = callbacks.notifications();
    let shutters: Vec<_> = notifications
        .iter()
        .filter(|n| matches!(n, NotifyMessage::Shutter { .. }))
        .collect();
    assert_eq!(shutters.len(), 1);
    let NotifyMessage::Shutter {
        frame_number,
        timestamp_ns,
    } = *shutters[0]
    else {
        unreachable!()
    };
    assert_eq!(frame_number, 1);
    assert!(timestamp_ns > 0);

    assert_eq!(callbacks.result_count(), 1);
    callbacks.with_results(|results| {
        let result = &results[0];
        assert_eq!(result.frame_number, 1);
        assert_eq!(result.partial_result, 1);
        assert_eq!(result.buffers.len(), 1);
        assert_eq!(result.buffers[0].status, BufferStatus::Ok);
        assert_eq!(result.buffers[0].buffer, BufferHandle(100));
        assert!(result.buffers[0].release_fence.is_none());
        // The shutter timestamp is the result's sensor timestamp.
        assert_eq!(
            result.metadata.get_one::<i64>(tags::SENSOR_TIMESTAMP),
            Some(timestamp_ns)
        );
    });

    // No buffer stays locked once its result is out.
    assert_eq!(mapper.active_locks(), 0);
    camera.close().unwrap();
}

#[test]
fn empty_settings_reuse_the_last_valid_settings() {
    let (camera, callbacks, _device, _mapper) = ready_camera();
    let settings = preview_settings(&camera);

    camera
        .process_capture_request(request(1, settings, 100))
        .unwrap();
    camera
        .process_capture_request(request(2, MetadataBlock::new(), 101))
        .unwrap();
    assert!(callbacks.wait_for_results(2, RESULT_TIMEOUT));

    callbacks.with_results(|results| {
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].frame_number, 1);
        assert_eq!(results[1].frame_number, 2);
        // Reused settings produce a fully populated result too.
        assert!(results[1]
            .metadata
            .get_one::<u8>(tags::CONTROL_AE_MODE)
            .is_some());
    });
    camera.close().unwrap();
}

#[test]
fn first_request_with_empty_settings_is_rejected() {
    let (camera, _callbacks, _device, _mapper) = ready_camera();
    let err = camera
        .process_capture_request(request(1, MetadataBlock::new(), 100))
        .unwrap_err();
    assert_eq!(err.errno(), -libc::EINVAL);
    camera.close().unwrap();
}

#[test]
fn timestamps_and_frame_numbers_are_monotonic() {
    let (camera, callbacks, _device, _mapper) = ready_camera();
    let settings = preview_settings(&camera);

    for frame in 1..=4u32 {
        camera
            .process_capture_request(request(frame, settings.clone(), 100 + frame as u64))
            .unwrap();
    }
    assert!(callbacks.wait_for_results(4, RESULT_TIMEOUT));

    let mut shutters = Vec::new();
    for n in callbacks.notifications() {
        if let NotifyMessage::Shutter {
            frame_number,
            timestamp_ns,
        } = n
        {
            shutters.push((frame_number, timestamp_ns));
        }
    }
    assert_eq!(shutters.len(), 4);
    for pair in shutters.windows(2) {
        assert!(pair[1].0 > pair[0].0, "frame numbers must increase");
        assert!(pair[1].1 > pair[0].1, "timestamps must increase");
    }
    camera.close().unwrap();
}

#[test]
fn non_monotonic_frame_numbers_are_rejected() {
    let (camera, callbacks, _device, _mapper) = ready_camera();
    let settings = preview_settings(&camera);

    camera
        .process_capture_request(request(5, settings.clone(), 100))
        .unwrap();
    assert!(callbacks.wait_for_results(1, RESULT_TIMEOUT));

    let err = camera
        .process_capture_request(request(5, settings, 101))
        .unwrap_err();
    assert_eq!(err.errno(), -libc::EINVAL);
    camera.close().unwrap();
}

#[test]
fn invalid_settings_are_rejected_up_front() {
    let (camera, callbacks, _device, _mapper) = ready_camera();
    let mut settings = preview_settings(&camera);
    settings.set_one(tags::CONTROL_AE_MODE, 99u8);

    let err = camera
        .process_capture_request(request(1, settings, 100))
        .unwrap_err();
    assert_eq!(err.errno(), -libc::EINVAL);
    // Rejected before acceptance: no notify, no result.
    assert_eq!(callbacks.result_count(), 0);
    assert!(callbacks.notifications().is_empty());
    camera.close().unwrap();
}

#[test]
fn device_failure_turns_into_a_request_error() {
    let (camera, callbacks, device, _mapper) = ready_camera();
    device.fail_qbuf_with(libc::EIO);
    let settings = preview_settings(&camera);

    camera
        .process_capture_request(request(1, settings, 100))
        .unwrap();
    assert!(callbacks.wait_for_results(1, RESULT_TIMEOUT));

    let notifications = callbacks.notifications();
    assert!(notifications.iter().any(|n| matches!(
        n,
        NotifyMessage::Error {
            frame_number: 1,
            error_code: ErrorCode::Request,
        }
    )));
    callbacks.with_results(|results| {
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].buffers[0].status, BufferStatus::Error);
        assert!(results[0].buffers[0].release_fence.is_none());
    });
    camera.close().unwrap();
}

#[test]
fn requests_before_configuration_are_rejected() {
    let (camera, _device, _mapper) = fake_camera(0);
    camera.open().unwrap();
    camera.initialize(RecordingCallbacks::new()).unwrap();
    let err = camera
        .process_capture_request(request(1, MetadataBlock::new(), 100))
        .unwrap_err();
    assert_eq!(err.errno(), -libc::EINVAL);
    camera.close().unwrap();
}

#[test]
fn multiple_output_buffers_are_rejected() {
    let (camera, _callbacks, _device, _mapper) = ready_camera();
    let settings = preview_settings(&camera);
    let mut req = request(1, settings, 100);
    req.output_buffers.push(StreamBuffer {
        stream_id: 1,
        buffer: BufferHandle(101),
        acquire_fence: None,
    });
    let err = camera.process_capture_request(req).unwrap_err();
    assert_eq!(err.errno(), -libc::EINVAL);
    camera.close().unwrap();
}

#[test]
fn open_close_lifecycle() {
    let (camera, _device, _mapper) = fake_camera(0);
    assert!(matches!(camera.close(), Err(HalError::InvalidArgument(_))));

    camera.open().unwrap();
    assert!(matches!(camera.open(), Err(HalError::Busy(_))));
    assert!(matches!(camera.flush(), Err(HalError::NotSupported(_))));
    camera.close().unwrap();

    // Reopen works and rebuilds the metadata.
    camera.open().unwrap();
    camera.initialize(RecordingCallbacks::new()).unwrap();
    camera.close().unwrap();
}

#[test]
fn dump_reports_id_and_streams() {
    let (camera, _callbacks, _device, _mapper) = ready_camera();
    let mut out = Vec::new();
    camera.dump(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("\"id\": 0"));
    assert!(text.contains("Ycbcr420Flex"));
    camera.close().unwrap();
}

#[test]
fn info_reports_the_external_profile() {
    let (camera, _device, _mapper) = fake_camera(3);
    let info = camera.info();
    assert_eq!(info.id, 3);
    assert_eq!(info.device_version, 0x304);
    assert_eq!(info.facing, v4l2_camera_hal::Facing::External);
    assert_eq!(info.orientation, 0);
    assert_eq!(info.resource_cost, 100);
    assert!(info.conflicting_devices.is_empty());
}
