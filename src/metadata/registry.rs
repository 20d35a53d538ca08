//! Aggregation of partial metadata components.

use std::collections::BTreeSet;

use crate::errors::{HalError, HalResult};
use crate::metadata::block::MetadataBlock;
use crate::metadata::component::{owned_tags, PartialMetadata};
use crate::metadata::tags::Tag;
use crate::templates::RequestTemplate;

/// An ordered sequence of partial components, each owning a disjoint tag
/// set. Mutated only while the camera is being assembled; immutable
/// afterwards.
#[derive(Default)]
pub struct MetadataRegistry {
    components: Vec<Box<dyn PartialMetadata>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_component(&mut self, component: Box<dyn PartialMetadata>) {
        self.components.push(component);
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Errors if any two components claim the same tag.
    pub fn validate_tag_disjointness(&self) -> HalResult<()> {
        let mut seen: BTreeSet<Tag> = BTreeSet::new();
        for component in &self.components {
            for tag in owned_tags(component.as_ref()) {
                if !seen.insert(tag) {
                    log::error!("metadata tag {tag:#x} claimed by more than one component");
                    return Err(HalError::invalid_argument(format!(
                        "tag {tag:#x} owned by multiple components"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn static_tags(&self) -> Vec<Tag> {
        self.collect_tags(|c| c.static_tags())
    }

    pub fn control_tags(&self) -> Vec<Tag> {
        self.collect_tags(|c| c.control_tags())
    }

    pub fn dynamic_tags(&self) -> Vec<Tag> {
        self.collect_tags(|c| c.dynamic_tags())
    }

    fn collect_tags(&self, f: impl Fn(&dyn PartialMetadata) -> Vec<Tag>) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self
            .components
            .iter()
            .flat_map(|c| f(c.as_ref()))
            .collect();
        tags.sort_unstable();
        tags.dedup();
        tags
    }

    pub fn fill_static(&self, block: &mut MetadataBlock) -> HalResult<()> {
        for component in &self.components {
            component.populate_static(block)?;
        }
        Ok(())
    }

    pub fn fill_result(&self, block: &mut MetadataBlock) -> HalResult<()> {
        for component in &self.components {
            component.populate_dynamic(block)?;
        }
        Ok(())
    }

    pub fn fill_template(
        &self,
        template: RequestTemplate,
        block: &mut MetadataBlock,
    ) -> HalResult<()> {
        for component in &self.components {
            component.populate_template(template, block)?;
        }
        Ok(())
    }

    /// True iff every component accepts its slice of the request.
    pub fn is_valid_request(&self, request: &MetadataBlock) -> HalResult<bool> {
        for component in &self.components {
            if !component.supports_request(request)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Validates, then writes the request through every component. The first
    /// write failure short-circuits.
    pub fn apply_request(&self, request: &MetadataBlock) -> HalResult<()> {
        if !self.is_valid_request(request)? {
            return Err(HalError::invalid_argument(
                "request rejected by metadata validation",
            ));
        }
        for component in &self.components {
            component.set_request(request)?;
        }
        Ok(())
    }
}
