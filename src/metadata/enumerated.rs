//! Controls backed by a V4L2 device control through a value mapping.

use std::sync::Arc;

use crate::errors::{HalError, HalResult};
use crate::metadata::control::{ControlDelegate, TaggedControl};
use crate::metadata::menu::MenuOptions;
use crate::metadata::tags::Tag;
use crate::templates::RequestTemplate;
use crate::v4l2::raw;
use crate::v4l2::wrapper::V4l2Wrapper;

/// Bidirectional mapping between V4L2 control values and metadata enum
/// values.
#[derive(Debug, Clone)]
pub struct EnumMap {
    pairs: Vec<(i64, u8)>,
}

impl EnumMap {
    pub fn new(pairs: Vec<(i64, u8)>) -> Self {
        Self { pairs }
    }

    pub fn to_metadata(&self, v4l2_value: i64) -> Option<u8> {
        self.pairs
            .iter()
            .find(|(v, _)| *v == v4l2_value)
            .map(|(_, m)| *m)
    }

    pub fn to_v4l2(&self, metadata_value: u8) -> Option<i64> {
        self.pairs
            .iter()
            .find(|(_, m)| *m == metadata_value)
            .map(|(v, _)| *v)
    }
}

struct MappedControlDelegate {
    device: Arc<V4l2Wrapper>,
    control_id: u32,
    map: EnumMap,
}

impl ControlDelegate<u8> for MappedControlDelegate {
    fn get(&self) -> HalResult<u8> {
        let raw_value = self.device.get_control(self.control_id)?;
        self.map.to_metadata(raw_value as i64).ok_or_else(|| {
            HalError::not_supported(format!(
                "control {:#x} reported unmapped value {raw_value}",
                self.control_id
            ))
        })
    }

    fn set(&self, value: &u8) -> HalResult<()> {
        let raw_value = self.map.to_v4l2(*value).ok_or_else(|| {
            HalError::invalid_argument(format!(
                "no device mapping for value {value} of control {:#x}",
                self.control_id
            ))
        })?;
        self.device.set_control(self.control_id, raw_value as i32)?;
        Ok(())
    }
}

// Integer-typed controls with ranges wider than this are not plausible
// enums and are rejected rather than enumerated.
const MAX_ENUM_RANGE: i64 = 64;

/// Builds a control mapped onto a V4L2 device control.
///
/// The driver is queried for the control's valid values; values without a
/// mapping are filtered out. When no mapped value survives the constructor
/// fails and the caller falls back, typically to an ignored control with a
/// synthetic default.
pub fn enum_control(
    device: Arc<V4l2Wrapper>,
    control_id: u32,
    tag: Tag,
    options_tag: Tag,
    map: EnumMap,
    template_defaults: &[(RequestTemplate, u8)],
) -> HalResult<TaggedControl<u8>> {
    let query = device.query_control(control_id)?;
    if query.flags & raw::CTRL_FLAG_DISABLED != 0 {
        return Err(HalError::not_supported(format!(
            "control {control_id:#x} is disabled"
        )));
    }

    let candidates: Vec<i64> = match query.control_type {
        raw::CTRL_TYPE_MENU | raw::CTRL_TYPE_INTEGER_MENU => (query.minimum..=query.maximum)
            .filter(|&index| device.query_menu(control_id, index).is_ok())
            .collect(),
        raw::CTRL_TYPE_BOOLEAN => vec![0, 1],
        raw::CTRL_TYPE_INTEGER => {
            let step = query.step.max(1) as i64;
            if (query.maximum - query.minimum) / step > MAX_ENUM_RANGE {
                return Err(HalError::not_supported(format!(
                    "control {control_id:#x} range too wide for an enum"
                )));
            }
            (query.minimum..=query.maximum).step_by(step as usize).collect()
        }
        other => {
            return Err(HalError::not_supported(format!(
                "control {control_id:#x} has unhandled type {other}"
            )))
        }
    };

    let options: Vec<u8> = candidates
        .into_iter()
        .filter_map(|v| map.to_metadata(v))
        .collect();
    if options.is_empty() {
        return Err(HalError::not_supported(format!(
            "control {control_id:#x} exposes no mappable values"
        )));
    }

    let mut menu = MenuOptions::new(options.clone());
    if let Some(default) = map.to_metadata(query.default_value) {
        if options.contains(&default) {
            menu = menu.with_fallback(default);
        }
    }
    for (template, value) in template_defaults {
        if options.contains(value) {
            menu = menu.with_template_default(*template, *value);
        }
    }

    Ok(TaggedControl::new(
        tag,
        Some(options_tag),
        Box::new(MappedControlDelegate {
            device,
            control_id,
            map,
        }),
        Some(Box::new(menu)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_is_bidirectional() {
        let map = EnumMap::new(vec![(0, 1), (3, 0)]);
        assert_eq!(map.to_metadata(0), Some(1));
        assert_eq!(map.to_metadata(3), Some(0));
        assert_eq!(map.to_metadata(1), None);
        assert_eq!(map.to_v4l2(1), Some(0));
        assert_eq!(map.to_v4l2(0), Some(3));
        assert_eq!(map.to_v4l2(9), None);
    }
}
