//! An ordered collection of metadata entries, at most one per tag.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::metadata::tags::Tag;
use crate::metadata::value::{MetadataValue, Value};

/// A metadata block: settings, results, templates and static characteristics
/// are all instances of this. Within one block a tag appears at most once;
/// setting an existing tag replaces its entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataBlock {
    entries: BTreeMap<Tag, Value>,
}

impl MetadataBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.entries.contains_key(&tag)
    }

    /// Tags present in this block, ascending.
    pub fn tags(&self) -> Vec<Tag> {
        self.entries.keys().copied().collect()
    }

    pub fn set<T: MetadataValue>(&mut self, tag: Tag, values: &[T]) {
        self.entries.insert(tag, T::wrap(values));
    }

    pub fn set_one<T: MetadataValue>(&mut self, tag: Tag, value: T) {
        self.set(tag, std::slice::from_ref(&value));
    }

    /// All logical values stored under `tag`, or `None` when the tag is
    /// absent or holds a different wire type.
    pub fn get<T: MetadataValue>(&self, tag: Tag) -> Option<Vec<T>> {
        self.entries.get(&tag).and_then(T::unwrap)
    }

    /// The single logical value stored under `tag`; `None` when absent,
    /// mistyped, or not exactly one value.
    pub fn get_one<T: MetadataValue>(&self, tag: Tag) -> Option<T> {
        let mut values = self.get::<T>(tag)?;
        if values.len() == 1 {
            values.pop()
        } else {
            None
        }
    }

    pub fn raw(&self, tag: Tag) -> Option<&Value> {
        self.entries.get(&tag)
    }

    pub fn remove(&mut self, tag: Tag) -> Option<Value> {
        self.entries.remove(&tag)
    }
}
