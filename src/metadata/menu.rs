//! Discrete option sets for controls.

use crate::errors::{HalError, HalResult};
use crate::metadata::control::ControlOptions;
use crate::metadata::value::MetadataValue;
use crate::templates::RequestTemplate;

/// An explicit list of acceptable values.
///
/// Template defaults come from an explicit per-template table when one was
/// provided, then from the fallback value, then from the first option. An
/// empty option set has no defaults at all: every template lookup fails
/// `NoDevice`.
pub struct MenuOptions<T: MetadataValue> {
    options: Vec<T>,
    template_defaults: Vec<(RequestTemplate, T)>,
    fallback: Option<T>,
}

impl<T: MetadataValue> MenuOptions<T> {
    pub fn new(options: Vec<T>) -> Self {
        Self {
            options,
            template_defaults: Vec::new(),
            fallback: None,
        }
    }

    pub fn with_template_default(mut self, template: RequestTemplate, value: T) -> Self {
        self.template_defaults.retain(|(t, _)| *t != template);
        self.template_defaults.push((template, value));
        self
    }

    pub fn with_fallback(mut self, value: T) -> Self {
        self.fallback = Some(value);
        self
    }
}

impl<T: MetadataValue> ControlOptions<T> for MenuOptions<T> {
    fn is_supported(&self, value: &T) -> bool {
        self.options.contains(value)
    }

    fn default_for_template(&self, template: RequestTemplate) -> HalResult<T> {
        if self.options.is_empty() {
            return Err(HalError::no_device("menu control has no options"));
        }
        if let Some((_, value)) = self
            .template_defaults
            .iter()
            .find(|(t, _)| *t == template)
        {
            return Ok(value.clone());
        }
        if let Some(fallback) = self.fallback.as_ref() {
            if self.options.contains(fallback) {
                return Ok(fallback.clone());
            }
        }
        Ok(self.options[0].clone())
    }

    fn report(&self) -> Vec<T> {
        self.options.clone()
    }
}
