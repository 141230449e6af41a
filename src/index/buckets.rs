//! Bucket metadata: which reference interval each index column covers.
//!
//! Only used to label results; matching never reads it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::{Bucket, BucketId};
use crate::index::IndexError;

/// `{"bucketMap": {"<column>": {"refName": .., "bucketStart": .., "bucketEnd": ..}}}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketMap {
    #[serde(rename = "bucketMap")]
    buckets: BTreeMap<BucketId, Bucket>,
}

impl BucketMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, IndexError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<String, IndexError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn insert(&mut self, id: BucketId, bucket: Bucket) {
        self.buckets.insert(id, bucket);
    }

    /// Interval covered by a bucket, if known
    pub fn describe(&self, id: BucketId) -> Option<&Bucket> {
        self.buckets.get(&id)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
