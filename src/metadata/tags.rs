//! The tag space shared with the camera framework.
//!
//! Tags are 32-bit identifiers partitioned into sections: the section index
//! occupies the high 16 bits, the entry index the low 16. Only the tags this
//! HAL actually populates are listed.

pub type Tag = u32;

const fn tag(section: u16, index: u16) -> Tag {
    ((section as u32) << 16) | index as u32
}

/// Section a tag belongs to.
pub const fn section_of(tag: Tag) -> u16 {
    (tag >> 16) as u16
}

pub mod sections {
    pub const COLOR_CORRECTION: u16 = 0;
    pub const CONTROL: u16 = 1;
    pub const FLASH: u16 = 2;
    pub const FLASH_INFO: u16 = 3;
    pub const JPEG: u16 = 4;
    pub const LENS: u16 = 5;
    pub const LENS_INFO: u16 = 6;
    pub const REQUEST: u16 = 7;
    pub const SCALER: u16 = 8;
    pub const SENSOR: u16 = 9;
    pub const SENSOR_INFO: u16 = 10;
    pub const STATISTICS: u16 = 11;
    pub const INFO: u16 = 12;
    pub const SYNC: u16 = 13;
}

use sections as s;

// Color correction.
pub const COLOR_CORRECTION_ABERRATION_MODE: Tag = tag(s::COLOR_CORRECTION, 0);
pub const COLOR_CORRECTION_AVAILABLE_ABERRATION_MODES: Tag = tag(s::COLOR_CORRECTION, 1);

// Auto-exposure / white balance / focus controls.
pub const CONTROL_AE_ANTIBANDING_MODE: Tag = tag(s::CONTROL, 0);
pub const CONTROL_AE_AVAILABLE_ANTIBANDING_MODES: Tag = tag(s::CONTROL, 1);
pub const CONTROL_AE_MODE: Tag = tag(s::CONTROL, 2);
pub const CONTROL_AE_AVAILABLE_MODES: Tag = tag(s::CONTROL, 3);
pub const CONTROL_AE_TARGET_FPS_RANGE: Tag = tag(s::CONTROL, 4);
pub const CONTROL_AE_AVAILABLE_TARGET_FPS_RANGES: Tag = tag(s::CONTROL, 5);
pub const CONTROL_AE_LOCK: Tag = tag(s::CONTROL, 6);
pub const CONTROL_AE_LOCK_AVAILABLE: Tag = tag(s::CONTROL, 7);
pub const CONTROL_AF_MODE: Tag = tag(s::CONTROL, 8);
pub const CONTROL_AF_AVAILABLE_MODES: Tag = tag(s::CONTROL, 9);
pub const CONTROL_AWB_MODE: Tag = tag(s::CONTROL, 10);
pub const CONTROL_AWB_AVAILABLE_MODES: Tag = tag(s::CONTROL, 11);
pub const CONTROL_CAPTURE_INTENT: Tag = tag(s::CONTROL, 12);
pub const CONTROL_MODE: Tag = tag(s::CONTROL, 13);
pub const CONTROL_AVAILABLE_MODES: Tag = tag(s::CONTROL, 14);
pub const CONTROL_MAX_REGIONS: Tag = tag(s::CONTROL, 15);

// Flash.
pub const FLASH_MODE: Tag = tag(s::FLASH, 0);
pub const FLASH_INFO_AVAILABLE: Tag = tag(s::FLASH_INFO, 0);

// JPEG.
pub const JPEG_QUALITY: Tag = tag(s::JPEG, 0);

// Lens.
pub const LENS_INFO_AVAILABLE_FOCAL_LENGTHS: Tag = tag(s::LENS_INFO, 0);
pub const LENS_INFO_AVAILABLE_APERTURES: Tag = tag(s::LENS_INFO, 1);

// Request bookkeeping.
pub const REQUEST_AVAILABLE_CAPABILITIES: Tag = tag(s::REQUEST, 0);
pub const REQUEST_AVAILABLE_CHARACTERISTICS_KEYS: Tag = tag(s::REQUEST, 1);
pub const REQUEST_AVAILABLE_REQUEST_KEYS: Tag = tag(s::REQUEST, 2);
pub const REQUEST_AVAILABLE_RESULT_KEYS: Tag = tag(s::REQUEST, 3);
pub const REQUEST_MAX_NUM_OUTPUT_STREAMS: Tag = tag(s::REQUEST, 4);
pub const REQUEST_PIPELINE_MAX_DEPTH: Tag = tag(s::REQUEST, 5);
pub const REQUEST_PARTIAL_RESULT_COUNT: Tag = tag(s::REQUEST, 6);

// Scaler / stream configuration.
pub const SCALER_AVAILABLE_STREAM_CONFIGURATIONS: Tag = tag(s::SCALER, 0);
pub const SCALER_AVAILABLE_MIN_FRAME_DURATIONS: Tag = tag(s::SCALER, 1);
pub const SCALER_AVAILABLE_STALL_DURATIONS: Tag = tag(s::SCALER, 2);
pub const SCALER_AVAILABLE_MAX_DIGITAL_ZOOM: Tag = tag(s::SCALER, 3);

// Sensor.
pub const SENSOR_TIMESTAMP: Tag = tag(s::SENSOR, 0);
pub const SENSOR_ORIENTATION: Tag = tag(s::SENSOR, 1);
pub const SENSOR_INFO_ACTIVE_ARRAY_SIZE: Tag = tag(s::SENSOR_INFO, 0);
pub const SENSOR_INFO_PIXEL_ARRAY_SIZE: Tag = tag(s::SENSOR_INFO, 1);
pub const SENSOR_INFO_PHYSICAL_SIZE: Tag = tag(s::SENSOR_INFO, 2);
pub const SENSOR_INFO_MAX_FRAME_DURATION: Tag = tag(s::SENSOR_INFO, 3);

// Info / sync.
pub const INFO_SUPPORTED_HARDWARE_LEVEL: Tag = tag(s::INFO, 0);
pub const SYNC_MAX_LATENCY: Tag = tag(s::SYNC, 0);

/// Enum values carried by the byte-typed tags above.
pub mod values {
    pub const ABERRATION_MODE_OFF: u8 = 0;
    pub const ABERRATION_MODE_FAST: u8 = 1;

    pub const AE_ANTIBANDING_MODE_OFF: u8 = 0;
    pub const AE_ANTIBANDING_MODE_50HZ: u8 = 1;
    pub const AE_ANTIBANDING_MODE_60HZ: u8 = 2;
    pub const AE_ANTIBANDING_MODE_AUTO: u8 = 3;

    pub const AE_MODE_OFF: u8 = 0;
    pub const AE_MODE_ON: u8 = 1;

    pub const AF_MODE_OFF: u8 = 0;
    pub const AF_MODE_AUTO: u8 = 1;
    pub const AF_MODE_MACRO: u8 = 2;
    pub const AF_MODE_CONTINUOUS_VIDEO: u8 = 3;
    pub const AF_MODE_CONTINUOUS_PICTURE: u8 = 4;

    pub const AWB_MODE_OFF: u8 = 0;
    pub const AWB_MODE_AUTO: u8 = 1;

    pub const CAPTURE_INTENT_CUSTOM: u8 = 0;
    pub const CAPTURE_INTENT_PREVIEW: u8 = 1;
    pub const CAPTURE_INTENT_STILL_CAPTURE: u8 = 2;
    pub const CAPTURE_INTENT_VIDEO_RECORD: u8 = 3;
    pub const CAPTURE_INTENT_VIDEO_SNAPSHOT: u8 = 4;

    pub const CONTROL_MODE_OFF: u8 = 0;
    pub const CONTROL_MODE_AUTO: u8 = 1;

    pub const FLASH_MODE_OFF: u8 = 0;

    pub const CAPABILITY_BACKWARD_COMPATIBLE: u8 = 0;

    pub const HARDWARE_LEVEL_EXTERNAL: u8 = 4;

    pub const SYNC_MAX_LATENCY_UNKNOWN: i32 = -1;

    /// Direction marker in stream-configuration 4-tuples.
    pub const STREAM_CONFIGURATION_OUTPUT: i32 = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_partition_the_tag_space() {
        assert_eq!(section_of(CONTROL_AE_MODE), sections::CONTROL);
        assert_eq!(section_of(SENSOR_TIMESTAMP), sections::SENSOR);
        assert_ne!(CONTROL_AE_MODE, CONTROL_AWB_MODE);
    }
}
