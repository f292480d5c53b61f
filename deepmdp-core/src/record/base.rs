//! Base implementation of records for logging.
use crate::error::DeepMdpError;
use std::collections::{hash_map::Iter, HashMap};

/// Values stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value, typically used for metrics like loss.
    Scalar(f32),
}

/// A container for storing key-value pairs of various data types.
///
/// ```rust
/// use deepmdp_core::record::{Record, RecordValue};
///
/// let mut record = Record::from_scalar("train_critic/loss", 0.5);
/// record.insert("train_alpha/value", RecordValue::Scalar(0.1));
///
/// assert_eq!(record.get_scalar("train_critic/loss").unwrap(), 0.5);
/// ```
#[derive(Debug, Default, Clone)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Inserts a key-value pair into the record.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs in the record.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Gets a reference to the value associated with the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Returns `true` if the record has the key.
    pub fn contains_key(&self, k: &str) -> bool {
        self.0.contains_key(k)
    }

    /// Merges another record into this one in place.
    ///
    /// Values of `record` overwrite values of `self` sharing the same key.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    /// Gets a scalar value from the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not exist.
    pub fn get_scalar(&self, k: &str) -> Result<f32, DeepMdpError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            None => Err(DeepMdpError::RecordKeyError(k.to_string())),
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks if the record is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_inplace_overwrites_with_second_record() {
        let mut r = Record::from_slice(&[
            ("train_critic/loss", RecordValue::Scalar(1.0)),
            ("train/batch_reward", RecordValue::Scalar(0.5)),
        ]);
        r.merge_inplace(Record::from_scalar("train_critic/loss", 2.0));

        assert_eq!(r.len(), 2);
        assert_eq!(r.get_scalar("train_critic/loss").unwrap(), 2.0);
        assert_eq!(r.get_scalar("train/batch_reward").unwrap(), 0.5);
    }

    #[test]
    fn test_get_scalar_of_missing_key() {
        let r = Record::from_scalar("train_ae/ae_loss", 0.1);

        assert!(matches!(
            r.get_scalar("train_ae/reward_loss"),
            Err(DeepMdpError::RecordKeyError(_))
        ));
    }
}
