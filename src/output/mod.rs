//! Output targets for backup streams.
//!
//! A [`Target`] receives named pieces of output (the data stream, its
//! metadata copy) one at a time.  Two variants exist:
//!
//! | Target | Layout |
//! |--------|--------|
//! | [`Directory`] | one regular file per piece under a target directory |
//! | [`ZipStream`] | one stored member per piece in a zip written to a pipe |
//!
//! The stream format never sees which variant is active: it writes through
//! [`TargetWriter`], a plain [`std::io::Write`] adapter.

mod directory;
mod zipstream;

pub use directory::Directory;
pub use zipstream::ZipStream;

use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Specified target is a file, not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Unable to create target directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("Unable to open file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("No output file is open")]
    NotOpen,
    #[error("Unable to open zip stream: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Invalid zip member timestamp: {0}")]
    Timestamp(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Destination for the named pieces of one backup.
///
/// At most one piece is open at a time; `write` goes to the open piece.
pub trait Target {
    fn open(&mut self, name: &str) -> Result<(), SinkError>;
    fn write(&mut self, data: &[u8]) -> Result<usize, SinkError>;
    fn close(&mut self) -> Result<(), SinkError>;
}

/// [`Write`] view of the piece currently open on a [`Target`].
pub struct TargetWriter<'a, T: Target + ?Sized> {
    target: &'a mut T,
}

impl<'a, T: Target + ?Sized> TargetWriter<'a, T> {
    pub fn new(target: &'a mut T) -> Self {
        Self { target }
    }
}

impl<T: Target + ?Sized> Write for TargetWriter<'_, T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.target.write(buf).map_err(into_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn into_io(e: SinkError) -> io::Error {
    match e {
        SinkError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}
