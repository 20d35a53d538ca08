//! Composable per-camera metadata.
//!
//! Static characteristics, request templates and per-frame results are all
//! assembled from independent partial components, each owning a disjoint
//! slice of the tag space. See [`component::PartialMetadata`] for the
//! contract and [`registry::MetadataRegistry`] for the aggregation.

pub mod block;
pub mod component;
pub mod control;
pub mod enumerated;
pub mod fixed;
pub mod menu;
pub mod registry;
pub mod state;
pub mod tags;
pub mod value;

pub use block::MetadataBlock;
pub use component::PartialMetadata;
pub use control::{ignored_control, menu_control, ControlDelegate, ControlOptions, TaggedControl};
pub use enumerated::{enum_control, EnumMap};
pub use fixed::FixedProperty;
pub use menu::MenuOptions;
pub use registry::MetadataRegistry;
pub use state::{BootTimeDelegate, State, StateDelegate};
pub use tags::Tag;
pub use value::{MetadataValue, Rational, Value};
