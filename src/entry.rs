//! Core data model: entries, queue names, and attribute values.

use std::collections::HashMap;
use std::fmt;

/// Logical name of a queue as supplied by the caller.
///
/// Opaque to the core beyond being a hashable, displayable key. The
/// external queue identifier is derived as `namespace || QueueName` only at
/// send time (see [`crate::config::GlobalConfig::external_queue_id`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueName(pub String);

impl QueueName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueueName {
    fn from(s: &str) -> Self {
        QueueName(s.to_string())
    }
}

impl From<String> for QueueName {
    fn from(s: String) -> Self {
        QueueName(s)
    }
}

/// A single message attribute value.
///
/// Shaped after SQS-style message attributes closely enough that byte
/// accounting is obvious and deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Str(String),
    Number(String),
    Binary(Vec<u8>),
}

impl AttributeValue {
    /// Byte length of the attribute's payload (no framing overhead).
    pub fn payload_bytes(&self) -> usize {
        match self {
            AttributeValue::Str(s) => s.len(),
            AttributeValue::Number(s) => s.len(),
            AttributeValue::Binary(b) => b.len(),
        }
    }
}

/// An opaque producer record.
///
/// `id` must be unique within a single send batch. `body` is the serialized
/// payload whose UTF-8 byte length is the dominant size term; the core never
/// parses `body`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: String,
    pub body: String,
    pub attributes: HashMap<String, AttributeValue>,
}

impl Entry {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}
