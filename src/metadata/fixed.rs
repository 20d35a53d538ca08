//! Static-only properties with immutable values.

use crate::errors::HalResult;
use crate::metadata::block::MetadataBlock;
use crate::metadata::component::PartialMetadata;
use crate::metadata::tags::Tag;
use crate::metadata::value::MetadataValue;

/// A fixed camera property: one static tag, one immutable value set.
pub struct FixedProperty<T: MetadataValue> {
    tag: Tag,
    values: Vec<T>,
}

impl<T: MetadataValue> FixedProperty<T> {
    pub fn new(tag: Tag, values: Vec<T>) -> Self {
        Self { tag, values }
    }

    pub fn single(tag: Tag, value: T) -> Self {
        Self::new(tag, vec![value])
    }
}

impl<T: MetadataValue> PartialMetadata for FixedProperty<T> {
    fn static_tags(&self) -> Vec<Tag> {
        vec![self.tag]
    }

    fn populate_static(&self, block: &mut MetadataBlock) -> HalResult<()> {
        block.set(self.tag, &self.values);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tags;

    #[test]
    fn populates_only_static() {
        let prop = FixedProperty::new(tags::SENSOR_INFO_PHYSICAL_SIZE, vec![3.2f32, 2.4f32]);
        let mut block = MetadataBlock::new();
        prop.populate_static(&mut block).unwrap();
        assert_eq!(
            block.get::<f32>(tags::SENSOR_INFO_PHYSICAL_SIZE),
            Some(vec![3.2, 2.4])
        );

        let mut dynamic = MetadataBlock::new();
        prop.populate_dynamic(&mut dynamic).unwrap();
        assert!(dynamic.is_empty());
        assert!(prop.control_tags().is_empty());
    }
}
