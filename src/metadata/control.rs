//! Request-controllable tags.
//!
//! A [`TaggedControl`] couples one control/dynamic tag with a get/set backend
//! (the delegate) and, optionally, a supported-options provider whose listing
//! is published under a static options tag.

use std::sync::{Arc, Mutex};

use crate::errors::{HalError, HalResult};
use crate::metadata::block::MetadataBlock;
use crate::metadata::component::PartialMetadata;
use crate::metadata::menu::MenuOptions;
use crate::metadata::tags::Tag;
use crate::metadata::value::MetadataValue;
use crate::templates::RequestTemplate;

/// Get/set backend of a control.
pub trait ControlDelegate<T>: Send + Sync {
    fn get(&self) -> HalResult<T>;
    fn set(&self, value: &T) -> HalResult<()>;
}

impl<T, D: ControlDelegate<T> + ?Sized> ControlDelegate<T> for Arc<D> {
    fn get(&self) -> HalResult<T> {
        self.as_ref().get()
    }

    fn set(&self, value: &T) -> HalResult<()> {
        self.as_ref().set(value)
    }
}

/// Supported-value provider of a control.
pub trait ControlOptions<T>: Send + Sync {
    fn is_supported(&self, value: &T) -> bool;
    fn default_for_template(&self, template: RequestTemplate) -> HalResult<T>;
    /// Values listed under the control's static options tag.
    fn report(&self) -> Vec<T>;
}

/// A control tag wrapping a delegate with its tag identity.
pub struct TaggedControl<T: MetadataValue> {
    tag: Tag,
    options_tag: Option<Tag>,
    delegate: Box<dyn ControlDelegate<T>>,
    options: Option<Box<dyn ControlOptions<T>>>,
}

impl<T: MetadataValue> TaggedControl<T> {
    pub fn new(
        tag: Tag,
        options_tag: Option<Tag>,
        delegate: Box<dyn ControlDelegate<T>>,
        options: Option<Box<dyn ControlOptions<T>>>,
    ) -> Self {
        Self {
            tag,
            options_tag,
            delegate,
            options,
        }
    }

    fn requested_value(&self, request: &MetadataBlock) -> HalResult<Option<T>> {
        if !request.contains(self.tag) {
            return Ok(None);
        }
        // Present but mistyped or multi-valued counts as unsupported, not
        // absent.
        match request.get_one::<T>(self.tag) {
            Some(value) => Ok(Some(value)),
            None => Err(HalError::invalid_argument(format!(
                "malformed request value for tag {:#x}",
                self.tag
            ))),
        }
    }
}

impl<T: MetadataValue> PartialMetadata for TaggedControl<T> {
    fn static_tags(&self) -> Vec<Tag> {
        self.options_tag.into_iter().collect()
    }

    fn control_tags(&self) -> Vec<Tag> {
        vec![self.tag]
    }

    fn dynamic_tags(&self) -> Vec<Tag> {
        vec![self.tag]
    }

    fn populate_static(&self, block: &mut MetadataBlock) -> HalResult<()> {
        if let (Some(options_tag), Some(options)) = (self.options_tag, self.options.as_ref()) {
            block.set(options_tag, &options.report());
        }
        Ok(())
    }

    fn populate_dynamic(&self, block: &mut MetadataBlock) -> HalResult<()> {
        let value = self.delegate.get()?;
        block.set_one(self.tag, value);
        Ok(())
    }

    fn populate_template(
        &self,
        template: RequestTemplate,
        block: &mut MetadataBlock,
    ) -> HalResult<()> {
        // Options provider wins; otherwise fall back to the current device
        // value.
        let value = match self.options.as_ref() {
            Some(options) => options.default_for_template(template)?,
            None => self.delegate.get().map_err(|e| {
                HalError::not_supported(format!(
                    "no template default for tag {:#x}: {e}",
                    self.tag
                ))
            })?,
        };
        block.set_one(self.tag, value);
        Ok(())
    }

    fn supports_request(&self, request: &MetadataBlock) -> HalResult<bool> {
        let value = match self.requested_value(request) {
            Ok(None) => return Ok(true),
            Ok(Some(value)) => value,
            Err(_) => return Ok(false),
        };
        Ok(self
            .options
            .as_ref()
            .map_or(true, |options| options.is_supported(&value)))
    }

    fn set_request(&self, request: &MetadataBlock) -> HalResult<()> {
        let value = match self.requested_value(request)? {
            None => return Ok(()),
            Some(value) => value,
        };
        if let Some(options) = self.options.as_ref() {
            if !options.is_supported(&value) {
                return Err(HalError::invalid_argument(format!(
                    "unsupported request value for tag {:#x}",
                    self.tag
                )));
            }
        }
        self.delegate.set(&value)
    }
}

/// Reports a constant and discards writes; backs ignored controls.
pub struct FixedDelegate<T> {
    value: T,
}

impl<T> FixedDelegate<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: MetadataValue> ControlDelegate<T> for FixedDelegate<T> {
    fn get(&self) -> HalResult<T> {
        Ok(self.value.clone())
    }

    fn set(&self, _value: &T) -> HalResult<()> {
        Ok(())
    }
}

/// Stores the last written value without touching hardware.
pub struct LatchedDelegate<T> {
    value: Mutex<T>,
}

impl<T> LatchedDelegate<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: Mutex::new(initial),
        }
    }
}

impl<T: MetadataValue> ControlDelegate<T> for LatchedDelegate<T> {
    fn get(&self) -> HalResult<T> {
        Ok(self.value.lock().expect("lock poisoned").clone())
    }

    fn set(&self, value: &T) -> HalResult<()> {
        *self.value.lock().expect("lock poisoned") = value.clone();
        Ok(())
    }
}

/// A control that reports its supported options, accepts any of them, and
/// always reads back the same default.
pub fn ignored_control<T: MetadataValue>(
    tag: Tag,
    options_tag: Tag,
    options: Vec<T>,
    default: T,
) -> TaggedControl<T> {
    TaggedControl::new(
        tag,
        Some(options_tag),
        Box::new(FixedDelegate::new(default.clone())),
        Some(Box::new(MenuOptions::new(options).with_fallback(default))),
    )
}

/// A control over an explicit discrete value set, latched in software.
pub fn menu_control<T: MetadataValue>(
    tag: Tag,
    options_tag: Tag,
    options: Vec<T>,
    initial: T,
) -> TaggedControl<T> {
    TaggedControl::new(
        tag,
        Some(options_tag),
        Box::new(LatchedDelegate::new(initial)),
        Some(Box::new(MenuOptions::new(options))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tags;

    fn latched() -> TaggedControl<u8> {
        menu_control(
            tags::CONTROL_AE_MODE,
            tags::CONTROL_AE_AVAILABLE_MODES,
            vec![0, 1],
            1,
        )
    }

    #[test]
    fn missing_tag_is_supported() {
        let control = latched();
        let request = MetadataBlock::new();
        assert_eq!(control.supports_request(&request).unwrap(), true);
        control.set_request(&request).unwrap();
    }

    #[test]
    fn set_then_get_round_trips() {
        let control = latched();
        let mut request = MetadataBlock::new();
        request.set_one(tags::CONTROL_AE_MODE, 0u8);
        control.set_request(&request).unwrap();

        let mut result = MetadataBlock::new();
        control.populate_dynamic(&mut result).unwrap();
        assert_eq!(result.get_one::<u8>(tags::CONTROL_AE_MODE), Some(0));
    }

    #[test]
    fn unsupported_value_is_rejected() {
        let control = latched();
        let mut request = MetadataBlock::new();
        request.set_one(tags::CONTROL_AE_MODE, 7u8);
        assert_eq!(control.supports_request(&request).unwrap(), false);
        assert!(matches!(
            control.set_request(&request),
            Err(HalError::InvalidArgument(_))
        ));
    }

    #[test]
    fn mistyped_value_is_rejected() {
        let control = latched();
        let mut request = MetadataBlock::new();
        request.set_one(tags::CONTROL_AE_MODE, 1i32);
        assert_eq!(control.supports_request(&request).unwrap(), false);
    }

    #[test]
    fn multi_valued_entry_is_rejected() {
        let control = latched();
        let mut request = MetadataBlock::new();
        request.set(tags::CONTROL_AE_MODE, &[0u8, 1u8]);
        assert_eq!(control.supports_request(&request).unwrap(), false);
    }

    #[test]
    fn ignored_control_reads_back_default() {
        let control = ignored_control(
            tags::FLASH_MODE,
            tags::FLASH_INFO_AVAILABLE,
            vec![tags::values::FLASH_MODE_OFF],
            tags::values::FLASH_MODE_OFF,
        );
        let mut request = MetadataBlock::new();
        request.set_one(tags::FLASH_MODE, tags::values::FLASH_MODE_OFF);
        control.set_request(&request).unwrap();

        let mut result = MetadataBlock::new();
        control.populate_dynamic(&mut result).unwrap();
        assert_eq!(
            result.get_one::<u8>(tags::FLASH_MODE),
            Some(tags::values::FLASH_MODE_OFF)
        );
    }

    #[test]
    fn options_are_published_statically() {
        let control = latched();
        let mut block = MetadataBlock::new();
        control.populate_static(&mut block).unwrap();
        assert_eq!(
            block.get::<u8>(tags::CONTROL_AE_AVAILABLE_MODES),
            Some(vec![0, 1])
        );
    }
}
