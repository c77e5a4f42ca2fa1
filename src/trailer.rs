use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StreamError};

/// Compressed on-wire size of every data block, keyed by block start offset.
///
/// Serialized as a flat JSON object: `{"0":4096,"65536":8192}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompressionTrailer {
    sizes: BTreeMap<u64, u64>,
}

impl CompressionTrailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, start: u64, compressed_len: u64) {
        self.sizes.insert(start, compressed_len);
    }

    pub fn get(&self, start: u64) -> Option<u64> {
        self.sizes.get(&start).copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.sizes.iter().map(|(&k, &v)| (k, v))
    }

    /// Sum of all compressed payload bytes.
    pub fn total(&self) -> u64 {
        self.sizes.values().sum()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StreamError::Encoding(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| StreamError::MetaHeaderFormat(e.to_string()))
    }
}

impl FromIterator<(u64, u64)> for CompressionTrailer {
    fn from_iter<I: IntoIterator<Item = (u64, u64)>>(iter: I) -> Self {
        Self { sizes: iter.into_iter().collect() }
    }
}
