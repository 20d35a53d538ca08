//! Typed values carried by metadata entries.
//!
//! Entries are `(tag, type, count, data)` tuples on the wire; here the type
//! and data collapse into one [`Value`] enum, and [`MetadataValue`] bridges
//! between plain Rust types and that representation.

use serde::Serialize;

/// A signed rational, numerator over denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rational {
    pub numerator: i32,
    pub denominator: i32,
}

impl Rational {
    pub const fn new(numerator: i32, denominator: i32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

/// One metadata entry's payload, tagged with its wire type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Byte(Vec<u8>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Rational(Vec<Rational>),
}

impl Value {
    /// Number of elements of the wire type stored in this entry.
    pub fn count(&self) -> usize {
        match self {
            Value::Byte(v) => v.len(),
            Value::Int32(v) => v.len(),
            Value::Int64(v) => v.len(),
            Value::Float(v) => v.len(),
            Value::Double(v) => v.len(),
            Value::Rational(v) => v.len(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Byte(_) => "byte",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Rational(_) => "rational",
        }
    }
}

/// Conversion between Rust values and metadata entry payloads.
///
/// A "logical value" may span more than one wire element (an FPS range is a
/// pair of int32s); `unwrap` returns logical values, not wire elements.
pub trait MetadataValue: Clone + PartialEq + Send + Sync + 'static {
    fn wrap(items: &[Self]) -> Value;
    fn unwrap(value: &Value) -> Option<Vec<Self>>;
}

macro_rules! scalar_metadata_value {
    ($ty:ty, $variant:ident) => {
        impl MetadataValue for $ty {
            fn wrap(items: &[Self]) -> Value {
                Value::$variant(items.to_vec())
            }

            fn unwrap(value: &Value) -> Option<Vec<Self>> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

scalar_metadata_value!(u8, Byte);
scalar_metadata_value!(i32, Int32);
scalar_metadata_value!(i64, Int64);
scalar_metadata_value!(f32, Float);
scalar_metadata_value!(f64, Double);
scalar_metadata_value!(Rational, Rational);

/// Pairs flatten to consecutive int32 elements (used for FPS ranges and
/// size-like entries).
impl MetadataValue for (i32, i32) {
    fn wrap(items: &[Self]) -> Value {
        let mut flat = Vec::with_capacity(items.len() * 2);
        for (a, b) in items {
            flat.push(*a);
            flat.push(*b);
        }
        Value::Int32(flat)
    }

    fn unwrap(value: &Value) -> Option<Vec<Self>> {
        match value {
            Value::Int32(v) if v.len() % 2 == 0 => {
                Some(v.chunks_exact(2).map(|c| (c[0], c[1])).collect())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trip() {
        let value = i64::wrap(&[1, 2, 3]);
        assert_eq!(value.count(), 3);
        assert_eq!(i64::unwrap(&value), Some(vec![1, 2, 3]));
        assert_eq!(i32::unwrap(&value), None);
    }

    #[test]
    fn pair_round_trip() {
        let value = <(i32, i32)>::wrap(&[(15, 30), (30, 30)]);
        assert_eq!(value.count(), 4);
        assert_eq!(
            <(i32, i32)>::unwrap(&value),
            Some(vec![(15, 30), (30, 30)])
        );
    }

    #[test]
    fn pair_rejects_odd_count() {
        let value = Value::Int32(vec![1, 2, 3]);
        assert_eq!(<(i32, i32)>::unwrap(&value), None);
    }
}
