//! Base implementation of records.
use crate::error::A3cError;
use std::collections::{hash_map::Iter, HashMap};

/// Represents possible types of values that can be stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value, typically a metric like reward or loss.
    Scalar(f32),

    /// A text value, such as the name of a worker.
    String(String),
}

/// A container of key-value pairs of various data types.
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
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

    /// Gets a scalar value from the record.
    pub fn get_scalar(&self, k: &str) -> Result<f32, A3cError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(A3cError::RecordValueTypeError("Scalar".to_string())),
            None => Err(A3cError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a string value from the record.
    pub fn get_string(&self, k: &str) -> Result<String, A3cError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(A3cError::RecordValueTypeError("String".to_string())),
            None => Err(A3cError::RecordKeyError(k.to_string())),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks if the record is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::{Record, RecordValue};
    use crate::error::A3cError;

    #[test]
    fn test_get_scalar_errors() {
        let record = Record::from_slice(&[
            ("reward", RecordValue::Scalar(1.5)),
            ("worker", RecordValue::String("w0".to_string())),
        ]);
        assert_eq!(record.get_scalar("reward").unwrap(), 1.5);
        assert!(matches!(
            record.get_scalar("worker"),
            Err(A3cError::RecordValueTypeError(_))
        ));
        assert!(matches!(
            record.get_scalar("loss"),
            Err(A3cError::RecordKeyError(_))
        ));
    }
}
