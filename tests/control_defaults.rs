//! Partial-component semantics: menu defaults, delegate round-trips and
//! device-backed enum construction.

use std::sync::{Arc, Mutex};

use v4l2_camera_hal::errors::{HalError, HalResult};
use v4l2_camera_hal::metadata::control::{ControlDelegate, TaggedControl};
use v4l2_camera_hal::metadata::menu::MenuOptions;
use v4l2_camera_hal::metadata::tags;
use v4l2_camera_hal::metadata::{enum_control, ControlOptions, EnumMap, MetadataBlock, PartialMetadata};
use v4l2_camera_hal::testing::{fake_wrapper, FakeControl};
use v4l2_camera_hal::v4l2::raw;
use v4l2_camera_hal::RequestTemplate;

#[test]
fn menu_defaults_stay_within_the_option_set() {
    let options = MenuOptions::new(vec![1u8, 10, 19, 30]);
    for id in 1..=5 {
        let template = RequestTemplate::from_id(id).unwrap();
        let value = options.default_for_template(template).unwrap();
        assert!([1u8, 10, 19, 30].contains(&value), "template {id}: {value}");
    }
}

#[test]
fn empty_menu_yields_no_device_for_every_template() {
    let options = MenuOptions::<u8>::new(Vec::new());
    for id in 1..=5 {
        let template = RequestTemplate::from_id(id).unwrap();
        assert!(matches!(
            options.default_for_template(template),
            Err(HalError::NoDevice(_))
        ));
    }
}

/// Delegate that records every write, for observing set-through behavior.
struct RecordingDelegate {
    value: Mutex<u8>,
    set_calls: Mutex<Vec<u8>>,
}

impl RecordingDelegate {
    fn new(initial: u8) -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(initial),
            set_calls: Mutex::new(Vec::new()),
        })
    }
}

impl ControlDelegate<u8> for RecordingDelegate {
    fn get(&self) -> HalResult<u8> {
        Ok(*self.value.lock().unwrap())
    }

    fn set(&self, value: &u8) -> HalResult<()> {
        self.set_calls.lock().unwrap().push(*value);
        *self.value.lock().unwrap() = *value;
        Ok(())
    }
}

#[test]
fn aberration_delegate_set_get_round_trip() {
    let delegate = RecordingDelegate::new(0);
    let control = TaggedControl::new(
        tags::COLOR_CORRECTION_ABERRATION_MODE,
        Some(tags::COLOR_CORRECTION_AVAILABLE_ABERRATION_MODES),
        Box::new(delegate.clone()),
        Some(Box::new(MenuOptions::new(vec![0u8, 1]))),
    );

    let mut request = MetadataBlock::new();
    request.set_one(tags::COLOR_CORRECTION_ABERRATION_MODE, 1u8);

    assert_eq!(control.supports_request(&request).unwrap(), true);
    control.set_request(&request).unwrap();
    assert_eq!(*delegate.set_calls.lock().unwrap(), vec![1]);

    let mut result = MetadataBlock::new();
    control.populate_dynamic(&mut result).unwrap();
    assert_eq!(
        result.get_one::<u8>(tags::COLOR_CORRECTION_ABERRATION_MODE),
        Some(1)
    );
}

#[test]
fn rejected_request_never_reaches_the_delegate() {
    let delegate = RecordingDelegate::new(0);
    let control = TaggedControl::new(
        tags::COLOR_CORRECTION_ABERRATION_MODE,
        Some(tags::COLOR_CORRECTION_AVAILABLE_ABERRATION_MODES),
        Box::new(delegate.clone()),
        Some(Box::new(MenuOptions::new(vec![0u8, 1]))),
    );

    let mut request = MetadataBlock::new();
    request.set_one(tags::COLOR_CORRECTION_ABERRATION_MODE, 9u8);
    assert_eq!(control.supports_request(&request).unwrap(), false);
    assert!(control.set_request(&request).is_err());
    assert!(delegate.set_calls.lock().unwrap().is_empty());
}

#[test]
fn enum_control_filters_through_the_driver_menu() {
    let (wrapper, device, _mapper) = fake_wrapper();
    // Power-line frequency menu where only 50Hz and 60Hz are valid.
    device.add_control(
        raw::CID_POWER_LINE_FREQUENCY,
        FakeControl::menu(0, 3, 2, vec![1, 2]),
    );
    wrapper.connect().unwrap();

    let control = enum_control(
        wrapper.clone(),
        raw::CID_POWER_LINE_FREQUENCY,
        tags::CONTROL_AE_ANTIBANDING_MODE,
        tags::CONTROL_AE_AVAILABLE_ANTIBANDING_MODES,
        EnumMap::new(vec![
            (raw::POWER_LINE_FREQUENCY_DISABLED, tags::values::AE_ANTIBANDING_MODE_OFF),
            (raw::POWER_LINE_FREQUENCY_50HZ, tags::values::AE_ANTIBANDING_MODE_50HZ),
            (raw::POWER_LINE_FREQUENCY_60HZ, tags::values::AE_ANTIBANDING_MODE_60HZ),
            (raw::POWER_LINE_FREQUENCY_AUTO, tags::values::AE_ANTIBANDING_MODE_AUTO),
        ]),
        &[],
    )
    .unwrap();

    let mut block = MetadataBlock::new();
    control.populate_static(&mut block).unwrap();
    assert_eq!(
        block.get::<u8>(tags::CONTROL_AE_AVAILABLE_ANTIBANDING_MODES),
        Some(vec![
            tags::values::AE_ANTIBANDING_MODE_50HZ,
            tags::values::AE_ANTIBANDING_MODE_60HZ
        ])
    );

    // Writes go through the V4L2 mapping.
    let mut request = MetadataBlock::new();
    request.set_one(
        tags::CONTROL_AE_ANTIBANDING_MODE,
        tags::values::AE_ANTIBANDING_MODE_50HZ,
    );
    control.set_request(&request).unwrap();
    assert_eq!(
        device.control_value(raw::CID_POWER_LINE_FREQUENCY),
        Some(raw::POWER_LINE_FREQUENCY_50HZ as i32)
    );

    let mut result = MetadataBlock::new();
    control.populate_dynamic(&mut result).unwrap();
    assert_eq!(
        result.get_one::<u8>(tags::CONTROL_AE_ANTIBANDING_MODE),
        Some(tags::values::AE_ANTIBANDING_MODE_50HZ)
    );
}

#[test]
fn enum_control_with_no_surviving_mapping_fails() {
    let (wrapper, device, _mapper) = fake_wrapper();
    device.add_control(
        raw::CID_POWER_LINE_FREQUENCY,
        FakeControl::menu(0, 3, 0, vec![0, 3]),
    );
    wrapper.connect().unwrap();

    // The mapping covers none of the driver's valid entries.
    let result = enum_control(
        wrapper.clone(),
        raw::CID_POWER_LINE_FREQUENCY,
        tags::CONTROL_AE_ANTIBANDING_MODE,
        tags::CONTROL_AE_AVAILABLE_ANTIBANDING_MODES,
        EnumMap::new(vec![
            (raw::POWER_LINE_FREQUENCY_50HZ, tags::values::AE_ANTIBANDING_MODE_50HZ),
        ]),
        &[],
    );
    assert!(matches!(result, Err(HalError::NotSupported(_))));
}

#[test]
fn enum_control_on_a_missing_control_fails() {
    let (wrapper, _device, _mapper) = fake_wrapper();
    wrapper.connect().unwrap();
    let result = enum_control(
        wrapper.clone(),
        raw::CID_FOCUS_AUTO,
        tags::CONTROL_AF_MODE,
        tags::CONTROL_AF_AVAILABLE_MODES,
        EnumMap::new(vec![(0, 0), (1, 4)]),
        &[],
    );
    assert!(result.is_err());
}

#[test]
fn boolean_enum_control_offers_both_states() {
    let (wrapper, device, _mapper) = fake_wrapper();
    device.add_control(raw::CID_AUTO_WHITE_BALANCE, FakeControl::boolean(1));
    wrapper.connect().unwrap();

    let control = enum_control(
        wrapper.clone(),
        raw::CID_AUTO_WHITE_BALANCE,
        tags::CONTROL_AWB_MODE,
        tags::CONTROL_AWB_AVAILABLE_MODES,
        EnumMap::new(vec![
            (0, tags::values::AWB_MODE_OFF),
            (1, tags::values::AWB_MODE_AUTO),
        ]),
        &[],
    )
    .unwrap();

    let mut block = MetadataBlock::new();
    control.populate_static(&mut block).unwrap();
    let modes = block.get::<u8>(tags::CONTROL_AWB_AVAILABLE_MODES).unwrap();
    assert!(modes.contains(&tags::values::AWB_MODE_OFF));
    assert!(modes.contains(&tags::values::AWB_MODE_AUTO));
}
