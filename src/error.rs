use std::io;
use thiserror::Error;

use crate::codec::CodecError;
use crate::output::SinkError;

/// Every failure the stream format can report.
///
/// None of these are recoverable inside the format layer: a misread length
/// shifts every later offset, so readers stop at the first error.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Header was short or did not split into `kind start length`.
    #[error("Invalid block format: {0}")]
    MalformedFrame(String),
    /// Start or length field is not hexadecimal.
    #[error("Invalid frame format: field {field} = {value:?}")]
    InvalidNumericField { field: &'static str, value: String },
    /// Metadata or trailer JSON failed to decode.
    #[error("Invalid meta header format: {0}")]
    MetaHeaderFormat(String),
    /// A compressed stream did not end with a readable trailer.
    #[error("Compression trailer not found: {0}")]
    TrailerNotFound(Box<StreamError>),
    #[error("Value cannot be encoded: {0}")]
    Encoding(String),
    /// Write session call made out of order.
    #[error("Invalid stream state: cannot {action} after {state}")]
    State { action: &'static str, state: &'static str },
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;
