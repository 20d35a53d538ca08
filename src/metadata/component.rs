//! The partial-metadata contract.
//!
//! A camera's metadata is assembled from independent components, each owning
//! a disjoint set of tags. Components answer for their own slice of static
//! characteristics, per-frame results, template defaults and request
//! validation; the registry fans operations out across them.

use crate::errors::HalResult;
use crate::metadata::block::MetadataBlock;
use crate::metadata::tags::Tag;
use crate::templates::RequestTemplate;

pub trait PartialMetadata: Send + Sync {
    /// Tags written into static characteristics.
    fn static_tags(&self) -> Vec<Tag> {
        Vec::new()
    }

    /// Tags accepted from capture requests.
    fn control_tags(&self) -> Vec<Tag> {
        Vec::new()
    }

    /// Tags emitted into per-frame results.
    fn dynamic_tags(&self) -> Vec<Tag> {
        Vec::new()
    }

    /// Writes every static tag this component owns. No-op without static
    /// tags.
    fn populate_static(&self, _block: &mut MetadataBlock) -> HalResult<()> {
        Ok(())
    }

    /// Writes current values for the dynamic tags, typically by reading the
    /// underlying device control.
    fn populate_dynamic(&self, _block: &mut MetadataBlock) -> HalResult<()> {
        Ok(())
    }

    /// Writes a sensible default for `template`.
    fn populate_template(
        &self,
        _template: RequestTemplate,
        _block: &mut MetadataBlock,
    ) -> HalResult<()> {
        Ok(())
    }

    /// Whether the request's values for this component's control tags are all
    /// within the supported set. Missing tags mean "no request" and are
    /// supported.
    fn supports_request(&self, _request: &MetadataBlock) -> HalResult<bool> {
        Ok(true)
    }

    /// Validates and writes through the request's values for this component's
    /// control tags.
    fn set_request(&self, _request: &MetadataBlock) -> HalResult<()> {
        Ok(())
    }
}

/// All tags a component owns, across the three roles.
pub fn owned_tags(component: &dyn PartialMetadata) -> Vec<Tag> {
    let mut tags = component.static_tags();
    tags.extend(component.control_tags());
    tags.extend(component.dynamic_tags());
    tags.sort_unstable();
    tags.dedup();
    tags
}
