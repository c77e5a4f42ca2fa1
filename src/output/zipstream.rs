use std::io::{self, Write};

use chrono::{Datelike, Local, Timelike};
use tracing::{debug, info};
use zip::write::{SimpleFileOptions, StreamWriter};
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::{SinkError, Target};

/// Writes every piece as a stored member of one zip archive.
///
/// The archive is produced strictly front to back (local headers with data
/// descriptors), so `W` does not need to seek.  Members are forced to zip64
/// sizes because their final length is unknown when they are opened.
pub struct ZipStream<W: Write> {
    zip:    ZipWriter<StreamWriter<W>>,
    member: Option<String>,
}

impl ZipStream<io::Stdout> {
    pub fn stdout() -> Self {
        info!("writing zip file stream to stdout");
        Self::new(io::stdout())
    }
}

impl<W: Write> ZipStream<W> {
    pub fn new(writer: W) -> Self {
        Self { zip: ZipWriter::new_stream(writer), member: None }
    }

    /// Write the central directory.  Call once after the last piece.
    pub fn finish(mut self) -> Result<(), SinkError> {
        if self.member.is_some() {
            self.close()?;
        }
        let mut inner = self.zip.finish()?;
        inner.flush()?;
        Ok(())
    }
}

fn member_timestamp() -> Result<DateTime, SinkError> {
    let now = Local::now();
    DateTime::from_date_and_time(
        now.year() as u16,
        now.month() as u8,
        now.day() as u8,
        now.hour() as u8,
        now.minute() as u8,
        now.second() as u8,
    )
    .map_err(|e| SinkError::Timestamp(e.to_string()))
}

impl<W: Write> Target for ZipStream<W> {
    fn open(&mut self, name: &str) -> Result<(), SinkError> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(member_timestamp()?)
            .large_file(true);
        self.zip.start_file(name.to_owned(), options)?;
        debug!(member = name, "opened zip member");
        self.member = Some(name.to_owned());
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, SinkError> {
        if self.member.is_none() {
            return Err(SinkError::NotOpen);
        }
        self.zip.write_all(data)?;
        Ok(data.len())
    }

    /// Members end implicitly when the next one starts; this only marks the
    /// target as having no open piece.
    fn close(&mut self) -> Result<(), SinkError> {
        let member = self.member.take().ok_or(SinkError::NotOpen)?;
        self.zip.flush()?;
        debug!(member = %member, "closed zip member");
        Ok(())
    }
}
