use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StreamError};

/// Base format: uncompressed payloads only.
pub const STREAM_VERSION_BASE: u32 = 1;
/// Adds compressed payloads and the trailing compression index.
pub const STREAM_VERSION_COMPRESSION: u32 = 2;

/// Header record written at byte 0 of every stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMetadata {
    pub virtual_size:       u64,
    pub data_size:          u64,
    pub date:               String,
    pub disk_name:          String,
    pub disk_format:        String,
    pub checkpoint_name:    String,
    pub parent_checkpoint:  Option<String>,
    pub incremental:        bool,
    pub compressed:         bool,
    pub compression_method: String,
    stream_version:         u32,
}

/// The disk a stream was taken from.
#[derive(Debug, Clone)]
pub struct DiskInfo {
    pub target: String,
    pub format: String,
}

impl StreamMetadata {
    /// Build a record stamped with the current local time.
    ///
    /// Fails if `compressed` is requested on a version 1 stream.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stream_version:     u32,
        compression_method: &str,
        virtual_size:       u64,
        data_size:          u64,
        disk:               &DiskInfo,
        checkpoint_name:    &str,
        parent_checkpoint:  Option<&str>,
        incremental:        bool,
        compressed:         bool,
    ) -> Result<Self> {
        let meta = Self {
            virtual_size,
            data_size,
            date:               Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            disk_name:          disk.target.clone(),
            disk_format:        disk.format.clone(),
            checkpoint_name:    checkpoint_name.to_owned(),
            parent_checkpoint:  parent_checkpoint.map(str::to_owned),
            incremental,
            compressed,
            compression_method: compression_method.to_owned(),
            stream_version,
        };
        meta.validate().map_err(StreamError::Encoding)?;
        Ok(meta)
    }

    pub fn stream_version(&self) -> u32 {
        self.stream_version
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        match self.stream_version {
            STREAM_VERSION_BASE if self.compressed => {
                Err("stream version 1 does not support compression".to_string())
            }
            STREAM_VERSION_BASE | STREAM_VERSION_COMPRESSION => Ok(()),
            v => Err(format!("unsupported stream version {v}")),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| StreamError::Encoding(e.to_string()))
    }

    /// Parse a UTF-8 JSON buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| StreamError::MetaHeaderFormat(e.to_string()))?;
        let meta: Self = serde_json::from_str(text)
            .map_err(|e| StreamError::MetaHeaderFormat(e.to_string()))?;
        meta.validate().map_err(StreamError::MetaHeaderFormat)?;
        Ok(meta)
    }
}
