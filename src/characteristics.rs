//! Assembly of a camera's metadata components from device capabilities.
//!
//! Connected-device discovery drives everything: supported formats map into
//! the framework taxonomy, frame sizes and intervals become stream
//! configurations and FPS ranges, and device controls become enum-mapped
//! components with software fallbacks when the driver lacks them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::errors::{HalError, HalResult};
use crate::metadata::control::{ignored_control, menu_control, LatchedDelegate, TaggedControl};
use crate::metadata::enumerated::{enum_control, EnumMap};
use crate::metadata::fixed::FixedProperty;
use crate::metadata::menu::MenuOptions;
use crate::metadata::registry::MetadataRegistry;
use crate::metadata::state::{BootTimeDelegate, State};
use crate::metadata::tags::{self, values, Tag};
use crate::metadata::{MetadataBlock, MetadataValue, PartialMetadata};
use crate::templates::{build_template, closest_fps_range, RequestTemplate};
use crate::v4l2::format::HalPixelFormat;
use crate::v4l2::raw;
use crate::v4l2::wrapper::V4l2Wrapper;

const NS_PER_SEC: i64 = 1_000_000_000;

/// Informative-only physical parameters V4L2 cannot report. Field-of-view
/// computations in the framework will be off accordingly.
const FAKE_PHYSICAL_SIZE: [f32; 2] = [3.2, 2.4];
const FAKE_FOCAL_LENGTH: f32 = 3.3;
const FAKE_APERTURE: f32 = 2.0;

const DEFAULT_JPEG_QUALITY: u8 = 80;

/// One reportable capture mode discovered from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportedFormat {
    pub format: HalPixelFormat,
    pub width: u32,
    pub height: u32,
    pub min_frame_duration_ns: i64,
    pub max_frame_duration_ns: i64,
}

/// Enumerates the device and collapses its fourccs into the framework
/// taxonomy, dropping anything unrecognized.
pub fn discover_formats(device: &V4l2Wrapper) -> HalResult<Vec<ReportedFormat>> {
    let mut merged: BTreeMap<(i32, u32, u32), ReportedFormat> = BTreeMap::new();
    for fourcc in device.enumerate_formats()? {
        let Some(format) = HalPixelFormat::from_v4l2(fourcc) else {
            log::debug!("ignoring unrecognized fourcc {fourcc:#x}");
            continue;
        };
        for (width, height) in device.enumerate_frame_sizes(fourcc)? {
            let (min_ns, max_ns) = device.frame_duration_range(fourcc, (width, height))?;
            merged
                .entry((format.id(), width, height))
                .and_modify(|entry| {
                    entry.min_frame_duration_ns = entry.min_frame_duration_ns.min(min_ns);
                    entry.max_frame_duration_ns = entry.max_frame_duration_ns.max(max_ns);
                })
                .or_insert(ReportedFormat {
                    format,
                    width,
                    height,
                    min_frame_duration_ns: min_ns,
                    max_frame_duration_ns: max_ns,
                });
        }
    }
    Ok(merged.into_values().collect())
}

struct FpsBounds {
    min_fps: i32,
    max_fps: i32,
}

fn yuv_fps_bounds(formats: &[ReportedFormat]) -> HalResult<FpsBounds> {
    let mut min_duration = i64::MAX;
    let mut max_duration = i64::MIN;
    for entry in formats
        .iter()
        .filter(|f| f.format == HalPixelFormat::Ycbcr420Flex)
    {
        min_duration = min_duration.min(entry.min_frame_duration_ns);
        max_duration = max_duration.max(entry.max_frame_duration_ns);
    }
    if min_duration == i64::MAX || min_duration <= 0 || max_duration <= 0 {
        return Err(HalError::not_supported("no usable YUV frame durations"));
    }
    Ok(FpsBounds {
        min_fps: (NS_PER_SEC / max_duration) as i32,
        max_fps: (NS_PER_SEC / min_duration) as i32,
    })
}

fn derive_fps_ranges(bounds: &FpsBounds) -> Vec<(i32, i32)> {
    let mut ranges = vec![
        (bounds.min_fps, bounds.max_fps),
        (bounds.max_fps, bounds.max_fps),
    ];
    if bounds.max_fps > 30 {
        ranges.push((30, 30));
    }
    ranges.sort_unstable();
    ranges.dedup();
    ranges
}

fn add_fixed<T: MetadataValue>(registry: &mut MetadataRegistry, tag: Tag, values: Vec<T>) {
    registry.add_component(Box::new(FixedProperty::new(tag, values)));
}

/// A device-backed control when the driver exposes one, else an ignored
/// software control reporting `fallback_default`.
#[allow(clippy::too_many_arguments)]
fn control_or_default(
    device: &Arc<V4l2Wrapper>,
    control_id: u32,
    tag: Tag,
    options_tag: Tag,
    map: EnumMap,
    template_defaults: &[(RequestTemplate, u8)],
    fallback_options: Vec<u8>,
    fallback_default: u8,
) -> Box<dyn PartialMetadata> {
    match enum_control(
        device.clone(),
        control_id,
        tag,
        options_tag,
        map,
        template_defaults,
    ) {
        Ok(control) => Box::new(control),
        Err(e) => {
            log::info!("control {control_id:#x} unavailable ({e}), using software default");
            Box::new(ignored_control(
                tag,
                options_tag,
                fallback_options,
                fallback_default,
            ))
        }
    }
}

/// Builds the full metadata registry for a connected device.
///
/// Fails when the device cannot satisfy the framework's baseline: both
/// flexible YCbCr 4:2:0 and BLOB output, and a YUV mode slow enough for a
/// 15 FPS floor.
pub fn build_registry(device: &Arc<V4l2Wrapper>) -> HalResult<MetadataRegistry> {
    let formats = discover_formats(device)?;

    let has_yuv = formats
        .iter()
        .any(|f| f.format == HalPixelFormat::Ycbcr420Flex);
    let has_blob = formats.iter().any(|f| f.format == HalPixelFormat::Blob);
    if !has_yuv || !has_blob {
        return Err(HalError::not_supported(
            "device lacks required YCbCr 4:2:0 or BLOB output",
        ));
    }

    let bounds = yuv_fps_bounds(&formats)?;
    if bounds.min_fps > 15 {
        return Err(HalError::not_supported(format!(
            "device minimum frame rate {} exceeds the 15 FPS floor",
            bounds.min_fps
        )));
    }
    let fps_ranges = derive_fps_ranges(&bounds);

    let mut stream_configs: Vec<i32> = Vec::new();
    let mut min_durations: Vec<i64> = Vec::new();
    let mut stall_durations: Vec<i64> = Vec::new();
    let mut max_frame_duration: i64 = 0;
    let mut max_size = (0u32, 0u32);
    for entry in &formats {
        let id = entry.format.id();
        stream_configs.extend_from_slice(&[
            id,
            entry.width as i32,
            entry.height as i32,
            values::STREAM_CONFIGURATION_OUTPUT,
        ]);
        min_durations.extend_from_slice(&[
            id as i64,
            entry.width as i64,
            entry.height as i64,
            entry.min_frame_duration_ns,
        ]);
        let stall = if entry.format == HalPixelFormat::Blob {
            entry.min_frame_duration_ns
        } else {
            0
        };
        stall_durations.extend_from_slice(&[
            id as i64,
            entry.width as i64,
            entry.height as i64,
            stall,
        ]);
        max_frame_duration = max_frame_duration.max(entry.max_frame_duration_ns);
        if entry.width as u64 * entry.height as u64 > max_size.0 as u64 * max_size.1 as u64 {
            max_size = (entry.width, entry.height);
        }
    }

    let mut registry = MetadataRegistry::new();

    // Scaler and sensor geometry.
    add_fixed(
        &mut registry,
        tags::SCALER_AVAILABLE_STREAM_CONFIGURATIONS,
        stream_configs,
    );
    add_fixed(
        &mut registry,
        tags::SCALER_AVAILABLE_MIN_FRAME_DURATIONS,
        min_durations,
    );
    add_fixed(
        &mut registry,
        tags::SCALER_AVAILABLE_STALL_DURATIONS,
        stall_durations,
    );
    add_fixed(
        &mut registry,
        tags::SCALER_AVAILABLE_MAX_DIGITAL_ZOOM,
        vec![1.0f32],
    );
    add_fixed(
        &mut registry,
        tags::SENSOR_INFO_MAX_FRAME_DURATION,
        vec![max_frame_duration],
    );
    add_fixed(
        &mut registry,
        tags::SENSOR_INFO_ACTIVE_ARRAY_SIZE,
        vec![0i32, 0, max_size.0 as i32, max_size.1 as i32],
    );
    add_fixed(
        &mut registry,
        tags::SENSOR_INFO_PIXEL_ARRAY_SIZE,
        vec![max_size.0 as i32, max_size.1 as i32],
    );
    add_fixed(&mut registry, tags::SENSOR_ORIENTATION, vec![0i32]);

    // Physical parameters V4L2 cannot report; informative only.
    add_fixed(
        &mut registry,
        tags::SENSOR_INFO_PHYSICAL_SIZE,
        FAKE_PHYSICAL_SIZE.to_vec(),
    );
    add_fixed(
        &mut registry,
        tags::LENS_INFO_AVAILABLE_FOCAL_LENGTHS,
        vec![FAKE_FOCAL_LENGTH],
    );
    add_fixed(
        &mut registry,
        tags::LENS_INFO_AVAILABLE_APERTURES,
        vec![FAKE_APERTURE],
    );

    // Framework bookkeeping.
    add_fixed(
        &mut registry,
        tags::REQUEST_AVAILABLE_CAPABILITIES,
        vec![values::CAPABILITY_BACKWARD_COMPATIBLE],
    );
    add_fixed(
        &mut registry,
        tags::REQUEST_MAX_NUM_OUTPUT_STREAMS,
        vec![0i32, 3, 1],
    );
    add_fixed(&mut registry, tags::REQUEST_PIPELINE_MAX_DEPTH, vec![4u8]);
    add_fixed(
        &mut registry,
        tags::REQUEST_PARTIAL_RESULT_COUNT,
        vec![1i32],
    );
    add_fixed(
        &mut registry,
        tags::INFO_SUPPORTED_HARDWARE_LEVEL,
        vec![values::HARDWARE_LEVEL_EXTERNAL],
    );
    add_fixed(
        &mut registry,
        tags::SYNC_MAX_LATENCY,
        vec![values::SYNC_MAX_LATENCY_UNKNOWN],
    );
    add_fixed(&mut registry, tags::CONTROL_MAX_REGIONS, vec![0i32, 0, 0]);

    // Color aberration: software only, fast path.
    registry.add_component(Box::new(ignored_control(
        tags::COLOR_CORRECTION_ABERRATION_MODE,
        tags::COLOR_CORRECTION_AVAILABLE_ABERRATION_MODES,
        vec![values::ABERRATION_MODE_FAST],
        values::ABERRATION_MODE_FAST,
    )));

    // Antibanding, mapped onto the power-line-frequency control.
    registry.add_component(control_or_default(
        device,
        raw::CID_POWER_LINE_FREQUENCY,
        tags::CONTROL_AE_ANTIBANDING_MODE,
        tags::CONTROL_AE_AVAILABLE_ANTIBANDING_MODES,
        EnumMap::new(vec![
            (
                raw::POWER_LINE_FREQUENCY_DISABLED,
                values::AE_ANTIBANDING_MODE_OFF,
            ),
            (
                raw::POWER_LINE_FREQUENCY_50HZ,
                values::AE_ANTIBANDING_MODE_50HZ,
            ),
            (
                raw::POWER_LINE_FREQUENCY_60HZ,
                values::AE_ANTIBANDING_MODE_60HZ,
            ),
            (
                raw::POWER_LINE_FREQUENCY_AUTO,
                values::AE_ANTIBANDING_MODE_AUTO,
            ),
        ]),
        &[],
        vec![values::AE_ANTIBANDING_MODE_AUTO],
        values::AE_ANTIBANDING_MODE_AUTO,
    ));

    // Auto exposure on/off.
    registry.add_component(control_or_default(
        device,
        raw::CID_EXPOSURE_AUTO,
        tags::CONTROL_AE_MODE,
        tags::CONTROL_AE_AVAILABLE_MODES,
        EnumMap::new(vec![
            (raw::EXPOSURE_AUTO, values::AE_MODE_ON),
            (raw::EXPOSURE_MANUAL, values::AE_MODE_OFF),
        ]),
        &[
            (RequestTemplate::Preview, values::AE_MODE_ON),
            (RequestTemplate::StillCapture, values::AE_MODE_ON),
            (RequestTemplate::VideoRecord, values::AE_MODE_ON),
            (RequestTemplate::VideoSnapshot, values::AE_MODE_ON),
        ],
        vec![values::AE_MODE_ON],
        values::AE_MODE_ON,
    ));

    // AE lock is never available.
    registry.add_component(Box::new(ignored_control(
        tags::CONTROL_AE_LOCK,
        tags::CONTROL_AE_LOCK_AVAILABLE,
        vec![0u8],
        0u8,
    )));

    // White balance: auto when the driver has it, else a software auto.
    registry.add_component(control_or_default(
        device,
        raw::CID_AUTO_WHITE_BALANCE,
        tags::CONTROL_AWB_MODE,
        tags::CONTROL_AWB_AVAILABLE_MODES,
        EnumMap::new(vec![
            (0, values::AWB_MODE_OFF),
            (1, values::AWB_MODE_AUTO),
        ]),
        &[],
        vec![values::AWB_MODE_AUTO],
        values::AWB_MODE_AUTO,
    ));

    // Continuous focus when the driver has it.
    registry.add_component(control_or_default(
        device,
        raw::CID_FOCUS_AUTO,
        tags::CONTROL_AF_MODE,
        tags::CONTROL_AF_AVAILABLE_MODES,
        EnumMap::new(vec![
            (0, values::AF_MODE_OFF),
            (1, values::AF_MODE_CONTINUOUS_PICTURE),
        ]),
        &[],
        vec![values::AF_MODE_OFF],
        values::AF_MODE_OFF,
    ));

    // Overall control mode is always auto.
    registry.add_component(Box::new(menu_control(
        tags::CONTROL_MODE,
        tags::CONTROL_AVAILABLE_MODES,
        vec![values::CONTROL_MODE_AUTO],
        values::CONTROL_MODE_AUTO,
    )));

    // Capture intent: latched verbatim, templates overwrite it.
    registry.add_component(Box::new(TaggedControl::new(
        tags::CONTROL_CAPTURE_INTENT,
        None,
        Box::new(LatchedDelegate::new(values::CAPTURE_INTENT_PREVIEW)),
        None,
    )));

    // Target FPS range over the derived menu.
    let default_range = closest_fps_range(&fps_ranges, (30, 30), true)
        .or_else(|| fps_ranges.first().copied())
        .unwrap_or((30, 30));
    registry.add_component(Box::new(TaggedControl::new(
        tags::CONTROL_AE_TARGET_FPS_RANGE,
        Some(tags::CONTROL_AE_AVAILABLE_TARGET_FPS_RANGES),
        Box::new(LatchedDelegate::new(default_range)),
        Some(Box::new(
            MenuOptions::new(fps_ranges).with_fallback(default_range),
        )),
    )));

    // No flash on external USB cameras.
    registry.add_component(Box::new(ignored_control(
        tags::FLASH_MODE,
        tags::FLASH_INFO_AVAILABLE,
        vec![values::FLASH_MODE_OFF],
        values::FLASH_MODE_OFF,
    )));

    // JPEG quality is honored in software by the encoder downstream.
    registry.add_component(Box::new(TaggedControl::new(
        tags::JPEG_QUALITY,
        None,
        Box::new(LatchedDelegate::new(DEFAULT_JPEG_QUALITY)),
        None,
    )));

    // Per-frame shutter timestamp.
    registry.add_component(Box::new(State::new(
        tags::SENSOR_TIMESTAMP,
        Box::new(BootTimeDelegate),
    )));

    registry.validate_tag_disjointness()?;
    Ok(registry)
}

/// Fills the static characteristics block and derives the key lists by
/// scanning the preview template. Returns the block together with the
/// template so the caller can cache both.
pub fn build_static_characteristics(
    registry: &MetadataRegistry,
) -> HalResult<(MetadataBlock, MetadataBlock)> {
    let mut block = MetadataBlock::new();
    registry.fill_static(&mut block)?;

    let preview = build_template(registry, &block, RequestTemplate::Preview)?;
    let request_keys: Vec<i32> = preview.tags().iter().map(|&t| t as i32).collect();
    block.set(tags::REQUEST_AVAILABLE_REQUEST_KEYS, &request_keys);
    block.set(tags::REQUEST_AVAILABLE_RESULT_KEYS, &request_keys);

    // The characteristics key list includes itself and goes in last.
    let mut characteristics_keys: Vec<i32> =
        block.tags().iter().map(|&t| t as i32).collect();
    characteristics_keys.push(tags::REQUEST_AVAILABLE_CHARACTERISTICS_KEYS as i32);
    characteristics_keys.sort_unstable();
    block.set(
        tags::REQUEST_AVAILABLE_CHARACTERISTICS_KEYS,
        &characteristics_keys,
    );

    Ok((block, preview))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reported(
        format: HalPixelFormat,
        width: u32,
        height: u32,
        min_ns: i64,
        max_ns: i64,
    ) -> ReportedFormat {
        ReportedFormat {
            format,
            width,
            height,
            min_frame_duration_ns: min_ns,
            max_frame_duration_ns: max_ns,
        }
    }

    #[test]
    fn fps_bounds_follow_yuv_durations() {
        let formats = [
            reported(
                HalPixelFormat::Ycbcr420Flex,
                640,
                480,
                NS_PER_SEC / 30,
                NS_PER_SEC / 15,
            ),
            reported(HalPixelFormat::Blob, 640, 480, NS_PER_SEC / 10, NS_PER_SEC / 10),
        ];
        let bounds = yuv_fps_bounds(&formats).unwrap();
        assert_eq!(bounds.min_fps, 15);
        assert_eq!(bounds.max_fps, 30);
    }

    #[test]
    fn ranges_include_thirty_only_above_thirty() {
        let slow = derive_fps_ranges(&FpsBounds {
            min_fps: 15,
            max_fps: 30,
        });
        assert!(slow.contains(&(15, 30)));
        assert!(slow.contains(&(30, 30)));
        assert_eq!(slow.len(), 2);

        let fast = derive_fps_ranges(&FpsBounds {
            min_fps: 10,
            max_fps: 60,
        });
        assert!(fast.contains(&(10, 60)));
        assert!(fast.contains(&(60, 60)));
        assert!(fast.contains(&(30, 30)));
    }
}
