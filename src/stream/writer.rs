use std::io::Write;

use tracing::{debug, info};

use super::SparseStream;
use crate::codec::{get_codec_by_name, Codec, DEFAULT_COMPRESSION_LEVEL};
use crate::error::{Result, StreamError};
use crate::frame::{FrameKind, FRAME_LEN, TERM};
use crate::metadata::StreamMetadata;
use crate::trailer::CompressionTrailer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    Start,
    MetadataWritten,
    BlocksWritten,
}

impl WriteState {
    fn name(self) -> &'static str {
        match self {
            WriteState::Start           => "stream start",
            WriteState::MetadataWritten => "metadata",
            WriteState::BlocksWritten   => "data blocks",
        }
    }
}

/// One write session over a sequential sink.
///
/// Calls must follow the stream layout: [`write_metadata`] exactly once,
/// then any number of [`write_data`] / [`write_zero`], then [`finish`].
/// Anything else fails with [`StreamError::State`] and writes nothing.
/// `finish` consumes the session, so nothing can follow it.
///
/// [`write_metadata`]: Self::write_metadata
/// [`write_data`]: Self::write_data
/// [`write_zero`]: Self::write_zero
/// [`finish`]: Self::finish
pub struct StreamWriter<W: Write> {
    writer:        W,
    format:        SparseStream,
    state:         WriteState,
    codec:         Option<Box<dyn Codec>>,
    level:         i32,
    trailer:       CompressionTrailer,
    blocks:        u64,
    bytes_written: u64,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(writer: W, format: SparseStream) -> Self {
        Self {
            writer,
            format,
            state:         WriteState::Start,
            codec:         None,
            level:         DEFAULT_COMPRESSION_LEVEL,
            trailer:       CompressionTrailer::new(),
            blocks:        0,
            bytes_written: 0,
        }
    }

    /// Compression level handed to the codec (ignored by lz4).
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    fn expect(&self, action: &'static str, allowed: &[WriteState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(StreamError::State { action, state: self.state.name() })
        }
    }

    /// Write the metadata record at byte 0.
    ///
    /// When `meta.compressed` is set, every following data block is run
    /// through the codec named by `meta.compression_method`.
    pub fn write_metadata(&mut self, meta: &StreamMetadata) -> Result<()> {
        self.expect("write metadata", &[WriteState::Start])?;
        if meta.compressed {
            self.codec = Some(get_codec_by_name(&meta.compression_method)?);
        }
        let json = meta.to_bytes()?;
        self.writer.write_all(&json)?;
        self.writer.write_all(TERM)?;
        self.bytes_written += (json.len() + TERM.len()) as u64;
        self.state = WriteState::MetadataWritten;
        info!(
            disk = %meta.disk_name,
            checkpoint = %meta.checkpoint_name,
            compressed = meta.compressed,
            "started stream"
        );
        Ok(())
    }

    /// Write one data block starting at disk offset `start`.
    ///
    /// Returns the number of payload bytes that went on the wire.
    pub fn write_data(&mut self, start: u64, data: &[u8]) -> Result<u64> {
        self.expect("write data", &[WriteState::MetadataWritten, WriteState::BlocksWritten])?;

        let compressed;
        let payload = match &self.codec {
            Some(codec) => {
                if self.trailer.get(start).is_some() {
                    return Err(StreamError::Encoding(format!(
                        "block at {start:#x} already written"
                    )));
                }
                compressed = codec.compress(data, self.level)?;
                &compressed[..]
            }
            None => data,
        };

        self.format.write_frame(&mut self.writer, FrameKind::Data, start, data.len() as u64)?;
        self.writer.write_all(payload)?;
        self.writer.write_all(TERM)?;

        let wire_len = payload.len() as u64;
        if self.codec.is_some() {
            self.trailer.insert(start, wire_len);
        }
        self.bytes_written += (FRAME_LEN + TERM.len()) as u64 + wire_len;
        self.blocks += 1;
        self.state = WriteState::BlocksWritten;
        debug!(start, length = data.len(), wire_len, "wrote data block");
        Ok(wire_len)
    }

    /// Record an unallocated region; no payload follows.
    pub fn write_zero(&mut self, start: u64, length: u64) -> Result<()> {
        self.expect("write zero block", &[WriteState::MetadataWritten, WriteState::BlocksWritten])?;
        self.format.write_frame(&mut self.writer, FrameKind::Zero, start, length)?;
        self.bytes_written += FRAME_LEN as u64;
        self.state = WriteState::BlocksWritten;
        debug!(start, length, "wrote zero block");
        Ok(())
    }

    /// Write the stop frame and, for compressed streams, the trailer, then
    /// flush and hand back the sink.
    pub fn finish(mut self) -> Result<W> {
        self.expect("finish", &[WriteState::MetadataWritten, WriteState::BlocksWritten])?;
        self.format.write_frame(&mut self.writer, FrameKind::Stop, 0, 0)?;
        self.bytes_written += FRAME_LEN as u64;
        if self.codec.is_some() {
            self.bytes_written +=
                self.format.write_compression_trailer(&mut self.writer, &self.trailer)?;
        }
        self.writer.flush()?;
        info!(bytes = self.bytes_written, blocks = self.blocks, "finished stream");
        Ok(self.writer)
    }

    /// Compressed sizes recorded so far (empty for uncompressed streams).
    pub fn trailer(&self) -> &CompressionTrailer {
        &self.trailer
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
