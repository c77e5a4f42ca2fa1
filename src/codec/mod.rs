//! Block compression codecs.
//!
//! The stream format treats compression as an opaque transform: a data
//! block goes in, some number of bytes come out, and that number is what
//! the compression trailer records.  The codec in use is named by the
//! `compressionMethod` metadata field and applies to every block of the
//! stream.

use std::io;
use thiserror::Error;

/// Default Zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecId {
    None,
    Lz4,
    Zstd,
}

impl CodecId {
    /// Name written to the `compressionMethod` metadata field.
    pub fn name(self) -> &'static str {
        match self {
            CodecId::None => "none",
            CodecId::Lz4  => "lz4",
            CodecId::Zstd => "zstd",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(CodecId::None),
            "lz4"  => Some(CodecId::Lz4),
            "zstd" => Some(CodecId::Zstd),
            _      => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("Unknown compression method: {0}")]
    UnknownMethod(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub trait Codec: Send + Sync {
    fn codec_id(&self) -> CodecId;
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError>;
    /// Decode `data`, failing before allocating if the output would exceed
    /// `limit` bytes.
    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError>;
}

fn too_large(size: usize, limit: usize) -> CodecError {
    CodecError::Decompression(format!("block decodes to {size} bytes, limit is {limit}"))
}

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn codec_id(&self) -> CodecId { CodecId::None }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
        if data.len() > limit {
            return Err(too_large(data.len(), limit));
        }
        Ok(data.to_vec())
    }
}

pub struct Lz4Codec;
impl Codec for Lz4Codec {
    fn codec_id(&self) -> CodecId { CodecId::Lz4 }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>, CodecError> {
        Ok(lz4_flex::compress_prepend_size(data))
    }
    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
        // little-endian u32 size prefix written by compress_prepend_size
        let prefix: [u8; 4] = data
            .get(..4)
            .and_then(|p| p.try_into().ok())
            .ok_or_else(|| CodecError::Decompression("missing lz4 size prefix".to_string()))?;
        let size = u32::from_le_bytes(prefix) as usize;
        if size > limit {
            return Err(too_large(size, limit));
        }
        lz4_flex::decompress_size_prepended(data)
            .map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

pub struct ZstdCodec;
impl Codec for ZstdCodec {
    fn codec_id(&self) -> CodecId { CodecId::Zstd }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        zstd::encode_all(data, level).map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
        zstd::bulk::decompress(data, limit).map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

pub fn get_codec(id: CodecId) -> Box<dyn Codec> {
    match id {
        CodecId::None => Box::new(NoneCodec),
        CodecId::Lz4  => Box::new(Lz4Codec),
        CodecId::Zstd => Box::new(ZstdCodec),
    }
}

/// Resolve a `compressionMethod` string as found in stream metadata.
pub fn get_codec_by_name(name: &str) -> Result<Box<dyn Codec>, CodecError> {
    CodecId::from_name(name)
        .map(get_codec)
        .ok_or_else(|| CodecError::UnknownMethod(name.to_owned()))
}
