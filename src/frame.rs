//! Fixed-width frame headers.
//!
//! Every block in a sparse stream is addressed by a 40-byte ASCII header:
//!
//! ```text
//! data 0000000000010000 0000000000001000\r\n
//! ^^^^ ^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^^^^^
//! kind start (hex)      length (hex) + TERM
//! ```
//!
//! Both numeric fields are 16 lowercase hex digits, so any `u64` fits and
//! the header width never depends on the values it carries.  This layout is
//! frozen for stream versions 1 and 2.
//!
//! Reading is split in two steps: [`read_header`] only tokenizes, and
//! [`parse_header`] interprets the tokens.  The trailer lookup in
//! [`crate::stream`] relies on being able to read a header whose leading
//! bytes are the preceding `TERM`; whitespace tokenizing absorbs it.

use std::fmt;
use std::io::{self, Read};

use crate::error::{Result, StreamError};

/// Line terminator written after metadata, payloads, and every header.
pub const TERM: &[u8] = b"\r\n";
/// Width of one kind token.
pub const KIND_LEN: usize = 4;
/// Width of one encoded frame header, `TERM` included.
pub const FRAME_LEN: usize = KIND_LEN + 1 + 16 + 1 + 16 + TERM.len();

// ── Frame kinds ──────────────────────────────────────────────────────────────

/// Semantic role of a frame.
///
/// `Unknown` keeps well-formed frames from newer writers readable: the
/// reader can skip them by length instead of failing the whole stream.
/// Their payload is never compressed and has no trailer entry, so the frame
/// length is the on-wire size in compressed streams too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Meta,
    Data,
    Zero,
    Stop,
    /// Compression index marker.  Its length describes the JSON *before* it.
    Comp,
    Unknown([u8; KIND_LEN]),
}

impl FrameKind {
    pub fn token(self) -> [u8; KIND_LEN] {
        match self {
            FrameKind::Meta       => *b"meta",
            FrameKind::Data       => *b"data",
            FrameKind::Zero       => *b"zero",
            FrameKind::Stop       => *b"stop",
            FrameKind::Comp       => *b"comp",
            FrameKind::Unknown(t) => t,
        }
    }

    pub fn from_token(token: &[u8]) -> Result<Self> {
        let token: [u8; KIND_LEN] = token.try_into().map_err(|_| {
            StreamError::MalformedFrame(format!(
                "kind token {:?} is not {KIND_LEN} bytes",
                String::from_utf8_lossy(token)
            ))
        })?;
        Ok(match &token {
            b"meta" => FrameKind::Meta,
            b"data" => FrameKind::Data,
            b"zero" => FrameKind::Zero,
            b"stop" => FrameKind::Stop,
            b"comp" => FrameKind::Comp,
            _       => FrameKind::Unknown(token),
        })
    }

    /// Whether a payload follows this frame in the stream.
    pub fn has_payload(self) -> bool {
        matches!(self, FrameKind::Meta | FrameKind::Data | FrameKind::Unknown(_))
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.token()))
    }
}

// ── Frame ────────────────────────────────────────────────────────────────────

/// A parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub kind:   FrameKind,
    pub start:  u64,
    pub length: u64,
}

/// Unparsed tokens of one header, as found on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    pub kind:   Vec<u8>,
    pub start:  Vec<u8>,
    pub length: Vec<u8>,
}

/// Encode a header into exactly [`FRAME_LEN`] bytes.
pub fn encode_frame(kind: FrameKind, start: u64, length: u64) -> Result<Vec<u8>> {
    let token = kind.token();
    if !token.iter().all(|b| b.is_ascii_graphic()) {
        return Err(StreamError::Encoding(format!(
            "kind token {:?} is not printable ASCII",
            String::from_utf8_lossy(&token)
        )));
    }
    let mut out = Vec::with_capacity(FRAME_LEN);
    out.extend_from_slice(&token);
    out.extend_from_slice(format!(" {start:016x} {length:016x}").as_bytes());
    out.extend_from_slice(TERM);
    debug_assert_eq!(out.len(), FRAME_LEN);
    Ok(out)
}

/// Read [`FRAME_LEN`] bytes and split them into three tokens.
///
/// A short read or a header without three tokens is a
/// [`StreamError::MalformedFrame`]; the reader is never resynchronized.
pub fn read_header<R: Read>(mut reader: R) -> Result<RawHeader> {
    let mut buf = [0u8; FRAME_LEN];
    reader.read_exact(&mut buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            StreamError::MalformedFrame("truncated frame header".to_string())
        }
        _ => StreamError::Io(e),
    })?;

    let mut tokens = buf
        .split(|b| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty());
    match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
        (Some(kind), Some(start), Some(length), None) => Ok(RawHeader {
            kind:   kind.to_vec(),
            start:  start.to_vec(),
            length: length.to_vec(),
        }),
        _ => Err(StreamError::MalformedFrame(format!(
            "expected 3 fields in {:?}",
            String::from_utf8_lossy(&buf)
        ))),
    }
}

/// Interpret the tokens of a header.
pub fn parse_header(raw: &RawHeader) -> Result<Frame> {
    Ok(Frame {
        kind:   FrameKind::from_token(&raw.kind)?,
        start:  parse_hex("start", &raw.start)?,
        length: parse_hex("length", &raw.length)?,
    })
}

pub(crate) fn parse_hex(field: &'static str, token: &[u8]) -> Result<u64> {
    // from_str_radix alone would accept a leading '+'
    let hex = !token.is_empty() && token.iter().all(u8::is_ascii_hexdigit);
    std::str::from_utf8(token)
        .ok()
        .filter(|_| hex)
        .and_then(|s| u64::from_str_radix(s, 16).ok())
        .ok_or_else(|| StreamError::InvalidNumericField {
            field,
            value: String::from_utf8_lossy(token).into_owned(),
        })
}
