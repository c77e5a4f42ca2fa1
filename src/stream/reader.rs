use std::io::{Read, Seek};

use tracing::{debug, warn};

use super::{expect_term, SparseStream};
use crate::codec::{get_codec_by_name, Codec, CodecError};
use crate::error::{Result, StreamError};
use crate::frame::FrameKind;
use crate::metadata::StreamMetadata;
use crate::trailer::CompressionTrailer;

/// One extent recovered from a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Allocated extent; `data` is already decompressed.
    Data { start: u64, data: Vec<u8> },
    /// Unallocated extent that reads as zeroes.
    Zero { start: u64, length: u64 },
}

impl Block {
    pub fn start(&self) -> u64 {
        match self {
            Block::Data { start, .. } | Block::Zero { start, .. } => *start,
        }
    }

    pub fn len(&self) -> u64 {
        match self {
            Block::Data { data, .. }   => data.len() as u64,
            Block::Zero { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sequential reader over one stream.
///
/// Opening reads the metadata and, for compressed streams, the trailer, so
/// every compressed block's on-wire size is known before the first frame.
/// Blocks then come out in stream order until the stop frame.
pub struct StreamReader<R: Read + Seek> {
    reader:   R,
    format:   SparseStream,
    metadata: StreamMetadata,
    trailer:  Option<CompressionTrailer>,
    codec:    Option<Box<dyn Codec>>,
    done:     bool,
}

impl<R: Read + Seek> StreamReader<R> {
    pub fn open(mut reader: R) -> Result<Self> {
        let metadata = SparseStream::read_metadata(&mut reader)?;
        let format = SparseStream::new(metadata.stream_version());

        let (trailer, codec) = if metadata.compressed {
            let trailer = format.read_compression_trailer(&mut reader)?;
            let codec = get_codec_by_name(&metadata.compression_method)?;
            (Some(trailer), Some(codec))
        } else {
            (None, None)
        };

        Ok(Self { reader, format, metadata, trailer, codec, done: false })
    }

    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    pub fn trailer(&self) -> Option<&CompressionTrailer> {
        self.trailer.as_ref()
    }

    /// Next extent, or `None` once the stop frame has been read.
    pub fn next_block(&mut self) -> Result<Option<Block>> {
        while !self.done {
            let frame = self.format.read_frame(&mut self.reader)?;
            match frame.kind {
                FrameKind::Stop => {
                    self.done = true;
                }
                FrameKind::Zero => {
                    debug!(start = frame.start, length = frame.length, "read zero block");
                    return Ok(Some(Block::Zero { start: frame.start, length: frame.length }));
                }
                FrameKind::Data => {
                    let wire_len = match &self.trailer {
                        Some(trailer) => trailer.get(frame.start).ok_or_else(|| {
                            StreamError::MalformedFrame(format!(
                                "no compressed size recorded for block at {:#x}",
                                frame.start
                            ))
                        })?,
                        None => frame.length,
                    };
                    let payload = self.read_payload(wire_len)?;
                    let limit = usize::try_from(frame.length).map_err(|_| {
                        StreamError::MalformedFrame(format!(
                            "block length {:#x} does not fit in memory",
                            frame.length
                        ))
                    })?;
                    let data = match &self.codec {
                        Some(codec) => codec.decompress(&payload, limit)?,
                        None        => payload,
                    };
                    if data.len() as u64 != frame.length {
                        return Err(CodecError::Decompression(format!(
                            "block at {:#x} decoded to {} bytes, frame says {}",
                            frame.start,
                            data.len(),
                            frame.length
                        ))
                        .into());
                    }
                    debug!(start = frame.start, length = frame.length, wire_len, "read data block");
                    return Ok(Some(Block::Data { start: frame.start, data }));
                }
                // Unknown frames are never compressed: their length is the
                // on-wire payload size even in a compressed stream.
                FrameKind::Unknown(_) => {
                    warn!(kind = %frame.kind, start = frame.start, length = frame.length,
                          "skipping frame of unknown kind");
                    self.read_payload(frame.length)?;
                }
                FrameKind::Meta | FrameKind::Comp => {
                    return Err(StreamError::MalformedFrame(format!(
                        "unexpected {} frame in block sequence",
                        frame.kind
                    )));
                }
            }
        }
        Ok(None)
    }

    fn read_payload(&mut self, len: u64) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        (&mut self.reader).take(len).read_to_end(&mut payload)?;
        if payload.len() as u64 != len {
            return Err(StreamError::MalformedFrame(format!(
                "payload truncated: expected {len} bytes, got {}",
                payload.len()
            )));
        }
        expect_term(&mut self.reader)?;
        Ok(payload)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> Iterator for StreamReader<R> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_block() {
            Ok(block) => block.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
