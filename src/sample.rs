//! Labeled multi-part samples and ordered sample collections.
//!
//! A [`Sample`] carries zero or more opaque data parts plus a metadata bag.
//! Collections preserve insertion order so index-based operations stay
//! reproducible across runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata key marking a sample as failed-to-enroll (excluded from
/// class-membership counting and selection).
pub const FTE_KEY: &str = "FTE";

/// Default metadata key holding a sample's class label.
pub const DEFAULT_LABEL_KEY: &str = "Label";

/// One opaque data unit within a sample.
pub type Part = Vec<f32>;

/// Key-value metadata bag attached to a sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    values: BTreeMap<String, Value>,
}

impl Metadata {
    /// Create an empty metadata bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a metadata value under `key`, replacing any existing value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Boolean value under `key`, or `default` when absent or not a bool.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.values.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// String value under `key`, or `default` when absent.
    ///
    /// Non-string values are rendered through their JSON form so numeric
    /// labels still group correctly.
    pub fn get_str(&self, key: &str, default: &str) -> String {
        match self.values.get(key) {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => default.to_string(),
        }
    }
}

/// An ordered sequence of parts plus metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Ordered opaque data units.
    pub parts: Vec<Part>,
    /// Metadata bag (label, exclusion flag, anything else).
    pub metadata: Metadata,
}

impl Sample {
    /// Create a sample with metadata and no parts.
    pub fn new(metadata: Metadata) -> Self {
        Self {
            parts: Vec::new(),
            metadata,
        }
    }

    /// Create a sample with metadata and the given parts.
    pub fn with_parts(metadata: Metadata, parts: Vec<Part>) -> Self {
        Self { parts, metadata }
    }

    /// Create a single-part sample sharing `metadata`.
    pub fn single(metadata: Metadata, part: Part) -> Self {
        Self {
            parts: vec![part],
            metadata,
        }
    }

    /// Label stored under `key`; missing labels read as the empty string.
    pub fn label(&self, key: &str) -> String {
        self.metadata.get_str(key, "")
    }

    /// True when the sample is flagged failed-to-enroll.
    pub fn is_excluded(&self) -> bool {
        self.metadata.get_bool(FTE_KEY, false)
    }
}

/// Ordered collection of samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleCollection {
    samples: Vec<Sample>,
}

impl SampleCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the collection holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Append one sample.
    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Append every sample from `other`, preserving order.
    pub fn append(&mut self, other: SampleCollection) {
        self.samples.extend(other.samples);
    }

    /// Borrow the underlying samples in order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Iterate samples in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Per-sample labels under `key`, in collection order.
    pub fn labels(&self, key: &str) -> Vec<String> {
        self.samples.iter().map(|sample| sample.label(key)).collect()
    }

    /// Count samples per label under `key` in ascending label order.
    ///
    /// With `exclude_failures`, samples flagged failed-to-enroll do not
    /// count toward their class.
    pub fn count_labels(&self, key: &str, exclude_failures: bool) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for sample in &self.samples {
            if exclude_failures && sample.is_excluded() {
                continue;
            }
            *counts.entry(sample.label(key)).or_insert(0) += 1;
        }
        counts
    }
}

impl From<Vec<Sample>> for SampleCollection {
    fn from(samples: Vec<Sample>) -> Self {
        Self { samples }
    }
}

impl FromIterator<Sample> for SampleCollection {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for SampleCollection {
    type Item = Sample;
    type IntoIter = std::vec::IntoIter<Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.into_iter()
    }
}

impl<'a> IntoIterator for &'a SampleCollection {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
