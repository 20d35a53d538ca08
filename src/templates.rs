//! Default request templates.
//!
//! Each supported use case gets a cached metadata block: the registry's
//! per-component defaults form the base, then a per-template overlay fixes
//! the capture intent, the target FPS range and the focus mode.

use crate::errors::{HalError, HalResult};
use crate::metadata::registry::MetadataRegistry;
use crate::metadata::tags::{self, values};
use crate::metadata::MetadataBlock;

/// Framework template ids. Zero-shutter-lag and manual are valid ids but
/// unsupported by this HAL; queries for them return absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum RequestTemplate {
    Preview,
    StillCapture,
    VideoRecord,
    VideoSnapshot,
    ZeroShutterLag,
    Manual,
}

impl RequestTemplate {
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Self::Preview),
            2 => Some(Self::StillCapture),
            3 => Some(Self::VideoRecord),
            4 => Some(Self::VideoSnapshot),
            5 => Some(Self::ZeroShutterLag),
            6 => Some(Self::Manual),
            _ => None,
        }
    }

    pub fn id(self) -> i32 {
        match self {
            Self::Preview => 1,
            Self::StillCapture => 2,
            Self::VideoRecord => 3,
            Self::VideoSnapshot => 4,
            Self::ZeroShutterLag => 5,
            Self::Manual => 6,
        }
    }

    pub fn all() -> [Self; 6] {
        [
            Self::Preview,
            Self::StillCapture,
            Self::VideoRecord,
            Self::VideoSnapshot,
            Self::ZeroShutterLag,
            Self::Manual,
        ]
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, Self::ZeroShutterLag | Self::Manual)
    }

    fn capture_intent(self) -> u8 {
        match self {
            Self::Preview => values::CAPTURE_INTENT_PREVIEW,
            Self::StillCapture => values::CAPTURE_INTENT_STILL_CAPTURE,
            Self::VideoRecord => values::CAPTURE_INTENT_VIDEO_RECORD,
            Self::VideoSnapshot => values::CAPTURE_INTENT_VIDEO_SNAPSHOT,
            Self::ZeroShutterLag | Self::Manual => values::CAPTURE_INTENT_CUSTOM,
        }
    }

    /// Desired FPS behavior: the target pair and whether it must be flat
    /// (min == max).
    fn desired_fps(self) -> ((i32, i32), bool) {
        match self {
            Self::StillCapture => ((5, 30), false),
            _ => ((30, 30), true),
        }
    }
}

/// Picks the available range minimizing L1 distance to `desired`. A flat
/// request only considers flat ranges.
pub fn closest_fps_range(
    available: &[(i32, i32)],
    desired: (i32, i32),
    flat: bool,
) -> Option<(i32, i32)> {
    available
        .iter()
        .copied()
        .filter(|(min, max)| !flat || min == max)
        .min_by_key(|(min, max)| {
            (min - desired.0).abs() as i64 + (max - desired.1).abs() as i64
        })
}

fn preferred_af_mode(template: RequestTemplate, available: &[u8]) -> u8 {
    let preferred = match template {
        RequestTemplate::VideoRecord | RequestTemplate::VideoSnapshot => {
            values::AF_MODE_CONTINUOUS_VIDEO
        }
        _ => values::AF_MODE_CONTINUOUS_PICTURE,
    };
    if available.contains(&preferred) {
        preferred
    } else {
        values::AF_MODE_OFF
    }
}

/// Builds the default request block for `template`.
///
/// `static_block` supplies the camera's available FPS ranges and focus
/// modes for the overlay.
pub fn build_template(
    registry: &MetadataRegistry,
    static_block: &MetadataBlock,
    template: RequestTemplate,
) -> HalResult<MetadataBlock> {
    if !template.is_supported() {
        return Err(HalError::not_supported(format!(
            "template {template:?} not supported"
        )));
    }

    let mut block = MetadataBlock::new();
    registry.fill_template(template, &mut block)?;

    block.set_one(tags::CONTROL_CAPTURE_INTENT, template.capture_intent());

    if let Some(available) =
        static_block.get::<(i32, i32)>(tags::CONTROL_AE_AVAILABLE_TARGET_FPS_RANGES)
    {
        let (desired, flat) = template.desired_fps();
        if let Some(range) = closest_fps_range(&available, desired, flat) {
            block.set_one(tags::CONTROL_AE_TARGET_FPS_RANGE, range);
        }
    }

    if block.contains(tags::CONTROL_AF_MODE) {
        let available = static_block
            .get::<u8>(tags::CONTROL_AF_AVAILABLE_MODES)
            .unwrap_or_else(|| vec![values::AF_MODE_OFF]);
        block.set_one(tags::CONTROL_AF_MODE, preferred_af_mode(template, &available));
    }

    Ok(block)
}
