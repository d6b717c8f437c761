//! Decoded monitoring records and the rendezvous envelope.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

/// One decoded monitoring record.
///
/// Records are ordered for merging by their logging timestamp only; two
/// records with the same timestamp compare equal under [`Record::merge_cmp`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Fully-qualified type name, shared with the registry entry.
    pub type_name: Arc<str>,
    /// Logging timestamp in nanoseconds since the Unix epoch.
    pub logging_timestamp: i64,
    /// Field values in declaration order.
    pub fields: Vec<FieldValue>,
}

impl Record {
    /// Timestamp of a record that was never stamped.
    pub const NO_TIMESTAMP: i64 = -1;

    /// Creates a record; `logging_timestamp` is in nanoseconds.
    #[must_use]
    pub fn new(type_name: impl Into<Arc<str>>, logging_timestamp: i64, fields: Vec<FieldValue>) -> Self {
        Self {
            type_name: type_name.into(),
            logging_timestamp,
            fields,
        }
    }

    /// Compares two records by logging timestamp.
    #[must_use]
    pub fn merge_cmp(&self, other: &Self) -> Ordering {
        self.logging_timestamp.cmp(&other.logging_timestamp)
    }

    /// The logging timestamp as a UTC instant.
    #[must_use]
    pub fn logged_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.logging_timestamp)
    }

    /// Field value at `index`, if present.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&FieldValue> {
        self.fields.get(index)
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.logged_at().to_rfc3339(), self.type_name)?;
        for value in &self.fields {
            write!(f, ";{value}")?;
        }
        Ok(())
    }
}

/// Message posted by a directory reader into its rendezvous slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// A decoded record awaiting delivery.
    Record(Record),
    /// The source has no more data.
    EndOfStream,
}

impl Envelope {
    /// Whether this is the end-of-stream marker.
    #[must_use]
    pub const fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }

    /// Merge order across pending envelopes. End-of-stream markers sort
    /// before every record so retirements are handled first.
    #[must_use]
    pub fn merge_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::EndOfStream, Self::EndOfStream) => Ordering::Equal,
            (Self::EndOfStream, Self::Record(_)) => Ordering::Less,
            (Self::Record(_), Self::EndOfStream) => Ordering::Greater,
            (Self::Record(a), Self::Record(b)) => a.merge_cmp(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(ts: i64) -> Record {
        Record::new("t", ts, vec![FieldValue::Long(ts)])
    }

    #[test]
    fn test_merge_cmp_uses_timestamp_only() {
        let a = Record::new("a", 5, vec![FieldValue::Int(9)]);
        let b = Record::new("b", 5, vec![FieldValue::Int(1)]);
        assert_eq!(a.merge_cmp(&b), Ordering::Equal);
        assert_eq!(rec(1).merge_cmp(&rec(2)), Ordering::Less);
    }

    #[test]
    fn test_end_of_stream_sorts_first() {
        let eos = Envelope::EndOfStream;
        let r = Envelope::Record(rec(i64::MIN));
        assert_eq!(eos.merge_cmp(&r), Ordering::Less);
        assert_eq!(r.merge_cmp(&eos), Ordering::Greater);
        assert!(eos.is_end_of_stream());
        assert!(!r.is_end_of_stream());
    }

    #[test]
    fn test_logged_at_and_display() {
        let r = Record::new("com.example.T", 1_000_000_000, vec![FieldValue::String("x".into())]);
        assert_eq!(r.logged_at().timestamp(), 1);
        let text = r.to_string();
        assert!(text.starts_with("1970-01-01T00:00:01"));
        assert!(text.ends_with("com.example.T;x"));
        assert_eq!(r.field(0).and_then(FieldValue::as_str), Some("x"));
        assert!(r.field(1).is_none());
    }

    #[test]
    fn test_record_serialization() {
        let r = rec(7);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type_name"], "t");
        assert_eq!(json["logging_timestamp"], 7);
    }
}
