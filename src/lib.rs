pub mod error;
pub mod frame;
pub mod metadata;
pub mod trailer;
pub mod codec;
pub mod stream;
pub mod output;
pub mod image;

pub use error::{Result, StreamError};
pub use frame::{encode_frame, parse_header, read_header, Frame, FrameKind, RawHeader, FRAME_LEN, TERM};
pub use metadata::{DiskInfo, StreamMetadata};
pub use trailer::CompressionTrailer;
pub use codec::CodecId;
pub use stream::{Block, SparseStream, StreamReader, StreamWriter};
pub use output::{Directory, SinkError, Target, TargetWriter, ZipStream};
