//! Dynamic-only tags backed by a read delegate.

use std::io;

use crate::errors::{HalError, HalResult};
use crate::metadata::block::MetadataBlock;
use crate::metadata::component::PartialMetadata;
use crate::metadata::tags::Tag;
use crate::metadata::value::MetadataValue;

/// Read backend for a [`State`] tag.
pub trait StateDelegate<T>: Send + Sync {
    fn value(&self) -> HalResult<T>;
}

/// A result-only tag: never requested, never templated, reported per frame.
pub struct State<T: MetadataValue> {
    tag: Tag,
    delegate: Box<dyn StateDelegate<T>>,
}

impl<T: MetadataValue> State<T> {
    pub fn new(tag: Tag, delegate: Box<dyn StateDelegate<T>>) -> Self {
        Self { tag, delegate }
    }
}

impl<T: MetadataValue> PartialMetadata for State<T> {
    fn dynamic_tags(&self) -> Vec<Tag> {
        vec![self.tag]
    }

    fn populate_dynamic(&self, block: &mut MetadataBlock) -> HalResult<()> {
        let value = self.delegate.value()?;
        block.set_one(self.tag, value);
        Ok(())
    }
}

/// Reports CLOCK_BOOTTIME in nanoseconds; the shutter timestamp source.
pub struct BootTimeDelegate;

impl StateDelegate<i64> for BootTimeDelegate {
    fn value(&self) -> HalResult<i64> {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_BOOTTIME, &mut ts) };
        if rc != 0 {
            return Err(HalError::io("clock_gettime", io::Error::last_os_error()));
        }
        Ok(ts.tv_sec as i64 * 1_000_000_000 + ts.tv_nsec as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tags;

    struct Constant(i64);

    impl StateDelegate<i64> for Constant {
        fn value(&self) -> HalResult<i64> {
            Ok(self.0)
        }
    }

    #[test]
    fn reports_delegate_value() {
        let state = State::new(tags::SENSOR_TIMESTAMP, Box::new(Constant(42)));
        let mut block = MetadataBlock::new();
        state.populate_dynamic(&mut block).unwrap();
        assert_eq!(block.get_one::<i64>(tags::SENSOR_TIMESTAMP), Some(42));
        assert!(state.control_tags().is_empty());
        assert!(state.static_tags().is_empty());
    }

    #[test]
    fn boot_time_advances() {
        let a = BootTimeDelegate.value().unwrap();
        let b = BootTimeDelegate.value().unwrap();
        assert!(b >= a);
        assert!(a > 0);
    }
}
