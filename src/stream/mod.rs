//! Sparse stream format — metadata, frames, and the compression trailer.
//!
//! # Layout
//! ```text
//! <metadata JSON> TERM
//! ( <data frame> <payload> TERM | <zero frame> )*
//! <stop frame>
//! [ <trailer JSON> TERM <comp frame> ]        compressed streams only
//! ```
//!
//! The metadata object sits at byte 0 without a frame header; JSON is
//! self-delimiting, so a reader consumes exactly the object and then the
//! `TERM` after it.
//!
//! # Compressed streams
//! A data frame always carries the *uncompressed* extent length.  The number
//! of payload bytes that actually follow it is only recorded in the trailer,
//! which maps each block's start offset to its compressed size.  The trailer
//! is written last because those sizes are unknown until every block is
//! out, and the sink may not be seekable.  Its `comp` frame is placed
//! *after* the JSON and describes the bytes behind it, so a reader finds it
//! at a fixed distance from end-of-stream:
//!
//! ```text
//!            ┌──────── L ────────┐
//! ... stop │ {"0":4096,...}      │ TERM │ comp 0…0 <L> TERM │ EOF
//!                                ▲──── FRAME_LEN + TERM ────▲ first hop
//!          ▲──────────── FRAME_LEN + L ─────────────▲          second hop
//! ```
//!
//! [`StreamWriter`] and [`StreamReader`] are the session-level API; the
//! methods on [`SparseStream`] are the individual format operations they
//! are built from.

mod reader;
mod writer;

pub use reader::{Block, StreamReader};
pub use writer::StreamWriter;

use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::debug;

use crate::codec::CodecId;
use crate::error::{Result, StreamError};
use crate::frame::{
    encode_frame, parse_hex, parse_header, read_header, Frame, FrameKind, FRAME_LEN, TERM,
};
use crate::metadata::{DiskInfo, StreamMetadata, STREAM_VERSION_COMPRESSION};
use crate::trailer::CompressionTrailer;

/// Format parameters shared by the write and read paths of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparseStream {
    version:     u32,
    compression: CodecId,
}

impl Default for SparseStream {
    fn default() -> Self {
        Self::new(STREAM_VERSION_COMPRESSION)
    }
}

impl SparseStream {
    pub fn new(version: u32) -> Self {
        Self { version, compression: CodecId::Lz4 }
    }

    pub fn with_compression(mut self, compression: CodecId) -> Self {
        self.compression = compression;
        self
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn compression(&self) -> CodecId {
        self.compression
    }

    // ── Write path ───────────────────────────────────────────────────────────

    /// Build the metadata record for this stream and serialize it.
    ///
    /// The returned bytes go first in the stream, with no frame header.
    #[allow(clippy::too_many_arguments)]
    pub fn dump_metadata(
        &self,
        virtual_size:      u64,
        data_size:         u64,
        disk:              &DiskInfo,
        checkpoint_name:   &str,
        parent_checkpoint: Option<&str>,
        incremental:       bool,
        compressed:        bool,
    ) -> Result<Vec<u8>> {
        self.metadata(
            virtual_size,
            data_size,
            disk,
            checkpoint_name,
            parent_checkpoint,
            incremental,
            compressed,
        )?
        .to_bytes()
    }

    /// Same as [`dump_metadata`](Self::dump_metadata) without serializing.
    #[allow(clippy::too_many_arguments)]
    pub fn metadata(
        &self,
        virtual_size:      u64,
        data_size:         u64,
        disk:              &DiskInfo,
        checkpoint_name:   &str,
        parent_checkpoint: Option<&str>,
        incremental:       bool,
        compressed:        bool,
    ) -> Result<StreamMetadata> {
        StreamMetadata::new(
            self.version,
            self.compression.name(),
            virtual_size,
            data_size,
            disk,
            checkpoint_name,
            parent_checkpoint,
            incremental,
            compressed,
        )
    }

    /// Write one frame header.  The caller writes the payload after it.
    pub fn write_frame<W: Write>(
        &self,
        mut writer: W,
        kind:       FrameKind,
        start:      u64,
        length:     u64,
    ) -> Result<()> {
        writer.write_all(&encode_frame(kind, start, length)?)?;
        Ok(())
    }

    /// Append the trailer: JSON, `TERM`, then a `comp` frame whose length is
    /// the JSON byte count.  Returns the number of bytes written.
    pub fn write_compression_trailer<W: Write>(
        &self,
        mut writer: W,
        trailer:    &CompressionTrailer,
    ) -> Result<u64> {
        let json = trailer.to_bytes()?;
        writer.write_all(&json)?;
        writer.write_all(TERM)?;
        self.write_frame(&mut writer, FrameKind::Comp, 0, json.len() as u64)?;
        debug!(entries = trailer.len(), bytes = json.len(), "wrote compression trailer");
        Ok((json.len() + TERM.len() + FRAME_LEN) as u64)
    }

    // ── Read path ────────────────────────────────────────────────────────────

    pub fn read_frame<R: Read>(&self, reader: R) -> Result<Frame> {
        let raw = read_header(reader)?;
        parse_header(&raw)
    }

    /// Recover the trailer by seeking back from end-of-stream.
    ///
    /// The reader's position is the same afterwards as before, whether or
    /// not the trailer could be read.
    pub fn read_compression_trailer<R: Read + Seek>(
        &self,
        mut reader: R,
    ) -> Result<CompressionTrailer> {
        let pos = reader.stream_position()?;
        let result = locate_trailer(&mut reader);
        reader.seek(SeekFrom::Start(pos))?;
        let trailer = result.map_err(|e| StreamError::TrailerNotFound(Box::new(e)))?;
        debug!(entries = trailer.len(), "read compression trailer");
        Ok(trailer)
    }

    /// Parse a UTF-8 JSON metadata buffer.
    pub fn load_metadata(bytes: &[u8]) -> Result<StreamMetadata> {
        StreamMetadata::from_bytes(bytes)
    }

    /// Read the metadata object at the head of a stream, consuming it and
    /// the `TERM` that follows, and nothing more.
    pub fn read_metadata<R: Read>(mut reader: R) -> Result<StreamMetadata> {
        let meta = serde_json::Deserializer::from_reader(&mut reader)
            .into_iter::<StreamMetadata>()
            .next()
            .ok_or_else(|| StreamError::MetaHeaderFormat("stream is empty".to_string()))?
            .map_err(|e| StreamError::MetaHeaderFormat(e.to_string()))?;
        meta.validate().map_err(StreamError::MetaHeaderFormat)?;
        expect_term(&mut reader)?;
        debug!(
            disk = %meta.disk_name,
            version = meta.stream_version(),
            compressed = meta.compressed,
            "read stream metadata"
        );
        Ok(meta)
    }
}

fn locate_trailer<R: Read + Seek>(reader: &mut R) -> Result<CompressionTrailer> {
    let end = reader.seek(SeekFrom::End(0))?;
    let tail = (FRAME_LEN + TERM.len()) as u64;
    if end < tail {
        return Err(StreamError::MalformedFrame(format!(
            "stream of {end} bytes is too short for a trailer"
        )));
    }
    reader.seek(SeekFrom::Current(-(tail as i64)))?;

    let raw = read_header(&mut *reader)?;
    let kind = FrameKind::from_token(&raw.kind)?;
    if kind != FrameKind::Comp {
        return Err(StreamError::MalformedFrame(format!(
            "expected comp frame at end of stream, found {kind}"
        )));
    }
    let length = parse_hex("length", &raw.length)?;

    let here = end - TERM.len() as u64;
    let back = (FRAME_LEN as u64)
        .checked_add(length)
        .filter(|&back| back <= here)
        .ok_or_else(|| {
            StreamError::MalformedFrame(format!("trailer length {length} exceeds stream size {end}"))
        })?;
    reader.seek(SeekFrom::Current(-(back as i64)))?;

    let mut json = Vec::new();
    reader.take(length).read_to_end(&mut json)?;
    if json.len() as u64 != length {
        return Err(StreamError::MalformedFrame("truncated compression trailer".to_string()));
    }
    CompressionTrailer::from_bytes(&json)
}

pub(crate) fn expect_term<R: Read>(mut reader: R) -> Result<()> {
    let mut term = [0u8; TERM.len()];
    reader.read_exact(&mut term).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            StreamError::MalformedFrame("stream ends before terminator".to_string())
        }
        _ => StreamError::Io(e),
    })?;
    if term != TERM {
        return Err(StreamError::MalformedFrame(format!("expected terminator, found {term:?}")));
    }
    Ok(())
}
