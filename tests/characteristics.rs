//! Static characteristics and template assembly over the fake device.

use v4l2_camera_hal::characteristics::{build_registry, discover_formats};
use v4l2_camera_hal::errors::HalError;
use v4l2_camera_hal::metadata::tags;
use v4l2_camera_hal::testing::{fake_camera, fake_wrapper, RecordingCallbacks};
use v4l2_camera_hal::v4l2::raw;
use v4l2_camera_hal::{HalPixelFormat, RequestTemplate};

#[test]
fn discovery_collapses_fourccs_into_the_hal_taxonomy() {
    let (wrapper, _device, _mapper) = fake_wrapper();
    wrapper.connect().unwrap();
    let formats = discover_formats(&wrapper).unwrap();

    assert!(formats
        .iter()
        .any(|f| f.format == HalPixelFormat::Ycbcr420Flex && f.width == 640));
    assert!(formats
        .iter()
        .any(|f| f.format == HalPixelFormat::Blob && f.width == 1280));
    for entry in &formats {
        assert!(entry.min_frame_duration_ns > 0);
        assert!(entry.max_frame_duration_ns >= entry.min_frame_duration_ns);
    }
}

#[test]
fn registry_components_own_disjoint_tags() {
    let (wrapper, _device, _mapper) = fake_wrapper();
    wrapper.connect().unwrap();
    let registry = build_registry(&wrapper).unwrap();
    registry.validate_tag_disjointness().unwrap();
    assert!(!registry.is_empty());
}

#[test]
fn device_without_jpeg_is_rejected() {
    let (wrapper, device, _mapper) = fake_wrapper();
    device.set_formats(vec![raw::PIX_FMT_YUV420]);
    wrapper.connect().unwrap();
    assert!(matches!(
        build_registry(&wrapper),
        Err(HalError::NotSupported(_))
    ));
}

#[test]
fn device_without_yuv_is_rejected() {
    let (wrapper, device, _mapper) = fake_wrapper();
    device.set_formats(vec![raw::PIX_FMT_JPEG]);
    wrapper.connect().unwrap();
    assert!(matches!(
        build_registry(&wrapper),
        Err(HalError::NotSupported(_))
    ));
}

#[test]
fn static_characteristics_cover_the_baseline() {
    let (camera, _device, _mapper) = fake_camera(0);
    camera.open().unwrap();
    camera.initialize(RecordingCallbacks::new()).unwrap();
    let block = camera.static_characteristics().unwrap();

    // Stream configurations come in 4-tuples.
    let configs = block
        .get::<i32>(tags::SCALER_AVAILABLE_STREAM_CONFIGURATIONS)
        .unwrap();
    assert_eq!(configs.len() % 4, 0);
    assert!(!configs.is_empty());

    let durations = block
        .get::<i64>(tags::SCALER_AVAILABLE_MIN_FRAME_DURATIONS)
        .unwrap();
    assert_eq!(durations.len(), configs.len());

    // FPS ranges derived from 15..30 include the flat 30 range.
    let ranges = block
        .get::<(i32, i32)>(tags::CONTROL_AE_AVAILABLE_TARGET_FPS_RANGES)
        .unwrap();
    assert!(ranges.contains(&(15, 30)));
    assert!(ranges.contains(&(30, 30)));

    assert_eq!(
        block.get::<i32>(tags::SENSOR_INFO_PIXEL_ARRAY_SIZE),
        Some(vec![1280, 720])
    );
    assert_eq!(
        block.get::<i32>(tags::SENSOR_INFO_ACTIVE_ARRAY_SIZE),
        Some(vec![0, 0, 1280, 720])
    );
    assert_eq!(
        block.get_one::<u8>(tags::INFO_SUPPORTED_HARDWARE_LEVEL),
        Some(tags::values::HARDWARE_LEVEL_EXTERNAL)
    );
    // Fakes are informative only but must be present.
    assert!(block.contains(tags::SENSOR_INFO_PHYSICAL_SIZE));
    assert!(block.contains(tags::LENS_INFO_AVAILABLE_FOCAL_LENGTHS));
    assert!(block.contains(tags::LENS_INFO_AVAILABLE_APERTURES));
    camera.close().unwrap();
}

#[test]
fn key_lists_are_derived_from_the_preview_template() {
    let (camera, _device, _mapper) = fake_camera(0);
    camera.open().unwrap();
    camera.initialize(RecordingCallbacks::new()).unwrap();
    let block = camera.static_characteristics().unwrap();
    let preview = camera
        .construct_default_request_settings(RequestTemplate::Preview)
        .unwrap()
        .unwrap();

    let request_keys = block
        .get::<i32>(tags::REQUEST_AVAILABLE_REQUEST_KEYS)
        .unwrap();
    let template_tags: Vec<i32> = preview.tags().iter().map(|&t| t as i32).collect();
    assert_eq!(request_keys, template_tags);
    assert_eq!(
        block.get::<i32>(tags::REQUEST_AVAILABLE_RESULT_KEYS).unwrap(),
        template_tags
    );

    // The characteristics key list includes itself.
    let characteristics_keys = block
        .get::<i32>(tags::REQUEST_AVAILABLE_CHARACTERISTICS_KEYS)
        .unwrap();
    assert!(
        characteristics_keys.contains(&(tags::REQUEST_AVAILABLE_CHARACTERISTICS_KEYS as i32))
    );
    for tag in block.tags() {
        if tag == tags::REQUEST_AVAILABLE_CHARACTERISTICS_KEYS {
            continue;
        }
        if tag == tags::REQUEST_AVAILABLE_REQUEST_KEYS
            || tag == tags::REQUEST_AVAILABLE_RESULT_KEYS
        {
            continue;
        }
        assert!(
            characteristics_keys.contains(&(tag as i32)),
            "missing {tag:#x}"
        );
    }
    camera.close().unwrap();
}

#[test]
fn unsupported_templates_return_absent() {
    let (camera, _device, _mapper) = fake_camera(0);
    camera.open().unwrap();
    camera.initialize(RecordingCallbacks::new()).unwrap();
    assert!(camera
        .construct_default_request_settings(RequestTemplate::ZeroShutterLag)
        .unwrap()
        .is_none());
    assert!(camera
        .construct_default_request_settings(RequestTemplate::Manual)
        .unwrap()
        .is_none());
    camera.close().unwrap();
}

#[test]
fn templates_set_intent_fps_and_focus() {
    let (camera, _device, _mapper) = fake_camera(0);
    camera.open().unwrap();
    camera.initialize(RecordingCallbacks::new()).unwrap();

    let preview = camera
        .construct_default_request_settings(RequestTemplate::Preview)
        .unwrap()
        .unwrap();
    assert_eq!(
        preview.get_one::<u8>(tags::CONTROL_CAPTURE_INTENT),
        Some(tags::values::CAPTURE_INTENT_PREVIEW)
    );
    // Flat preview rate.
    assert_eq!(
        preview.get_one::<(i32, i32)>(tags::CONTROL_AE_TARGET_FPS_RANGE),
        Some((30, 30))
    );
    assert_eq!(
        preview.get_one::<u8>(tags::CONTROL_AE_MODE),
        Some(tags::values::AE_MODE_ON)
    );
    assert_eq!(
        preview.get_one::<u8>(tags::CONTROL_AF_MODE),
        Some(tags::values::AF_MODE_OFF)
    );

    let still = camera
        .construct_default_request_settings(RequestTemplate::StillCapture)
        .unwrap()
        .unwrap();
    assert_eq!(
        still.get_one::<u8>(tags::CONTROL_CAPTURE_INTENT),
        Some(tags::values::CAPTURE_INTENT_STILL_CAPTURE)
    );
    // Variable still-capture rate prefers the widest match to (5, 30).
    assert_eq!(
        still.get_one::<(i32, i32)>(tags::CONTROL_AE_TARGET_FPS_RANGE),
        Some((15, 30))
    );

    // Template queries are cached: same block both times.
    let again = camera
        .construct_default_request_settings(RequestTemplate::Preview)
        .unwrap()
        .unwrap();
    assert!(std::sync::Arc::ptr_eq(&preview, &again));
    camera.close().unwrap();
}
