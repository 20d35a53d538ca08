//! Property tests over the metadata engine.

use proptest::collection::vec;
use proptest::prelude::*;

use v4l2_camera_hal::metadata::control::menu_control;
use v4l2_camera_hal::metadata::menu::MenuOptions;
use v4l2_camera_hal::metadata::registry::MetadataRegistry;
use v4l2_camera_hal::metadata::tags;
use v4l2_camera_hal::metadata::{ControlOptions, MetadataBlock, PartialMetadata};
use v4l2_camera_hal::RequestTemplate;

fn template_strategy() -> impl Strategy<Value = RequestTemplate> {
    (1i32..=6).prop_map(|id| RequestTemplate::from_id(id).unwrap())
}

proptest! {
    #[test]
    fn menu_default_is_always_a_member(
        options in vec(any::<u8>(), 1..16),
        template in template_strategy(),
    ) {
        let menu = MenuOptions::new(options.clone());
        let value = menu.default_for_template(template).unwrap();
        prop_assert!(options.contains(&value));
    }

    #[test]
    fn latched_control_round_trips_every_supported_value(
        mut options in vec(any::<u8>(), 1..16),
        pick in any::<prop::sample::Index>(),
    ) {
        options.dedup();
        let value = options[pick.index(options.len())];
        let control = menu_control(
            tags::CONTROL_AE_MODE,
            tags::CONTROL_AE_AVAILABLE_MODES,
            options,
            value,
        );

        let mut request = MetadataBlock::new();
        request.set_one(tags::CONTROL_AE_MODE, value);
        control.set_request(&request).unwrap();

        let mut result = MetadataBlock::new();
        control.populate_dynamic(&mut result).unwrap();
        prop_assert_eq!(result.get_one::<u8>(tags::CONTROL_AE_MODE), Some(value));
    }

    #[test]
    fn rejected_requests_leave_state_untouched(
        initial in any::<u8>(),
        bogus in any::<u8>(),
    ) {
        prop_assume!(bogus != initial);
        let mut registry = MetadataRegistry::new();
        registry.add_component(Box::new(menu_control(
            tags::CONTROL_AE_MODE,
            tags::CONTROL_AE_AVAILABLE_MODES,
            vec![initial],
            initial,
        )));

        let mut request = MetadataBlock::new();
        request.set_one(tags::CONTROL_AE_MODE, bogus);
        prop_assert!(!registry.is_valid_request(&request).unwrap());
        prop_assert!(registry.apply_request(&request).is_err());

        let mut result = MetadataBlock::new();
        registry.fill_result(&mut result).unwrap();
        prop_assert_eq!(result.get_one::<u8>(tags::CONTROL_AE_MODE), Some(initial));
    }

    #[test]
    fn missing_tags_are_always_supported(options in vec(any::<u8>(), 1..8)) {
        let control = menu_control(
            tags::CONTROL_AWB_MODE,
            tags::CONTROL_AWB_AVAILABLE_MODES,
            options,
            0,
        );
        let request = MetadataBlock::new();
        prop_assert!(v4l2_camera_hal::metadata::PartialMetadata::supports_request(
            &control, &request
        ).unwrap());
    }
}
