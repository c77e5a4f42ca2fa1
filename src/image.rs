//! Raw disk image ↔ sparse stream.
//!
//! Extent discovery here is a plain scan for all-zero blocks; it stands in
//! for the allocation map a hypervisor would report.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::info;

use crate::error::Result;
use crate::metadata::StreamMetadata;
use crate::output::{Target, TargetWriter};
use crate::stream::{Block, SparseStream, StreamReader, StreamWriter};

/// A run of blocks that are either all allocated or all zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub start:  u64,
    pub length: u64,
    pub data:   bool,
}

/// Split an image into `block_size` blocks, merging consecutive all-zero
/// blocks into one zero extent.  Data blocks stay one extent each.
pub fn scan_extents<R: Read>(mut image: R, block_size: usize) -> io::Result<Vec<Extent>> {
    let block_size = block_size.max(1);
    let mut extents: Vec<Extent> = Vec::new();
    let mut buf = Vec::with_capacity(block_size);
    let mut offset = 0u64;
    loop {
        buf.clear();
        let n = (&mut image).take(block_size as u64).read_to_end(&mut buf)? as u64;
        if n == 0 {
            break;
        }
        let data = buf.iter().any(|&b| b != 0);
        match extents.last_mut() {
            Some(last) if !data && !last.data => last.length += n,
            _ => extents.push(Extent { start: offset, length: n, data }),
        }
        offset += n;
    }
    Ok(extents)
}

/// Names of the pieces [`write_backup`] produces for `meta`.
pub fn piece_names(meta: &StreamMetadata) -> (String, String) {
    let kind = if meta.incremental { "inc" } else { "full" };
    (
        format!("{}.{}.data", meta.disk_name, kind),
        format!("{}.{}.json", meta.disk_name, meta.checkpoint_name),
    )
}

/// Write the stream for `extents` of `image`, then a standalone copy of
/// the metadata, as two pieces on `target`.
pub fn write_backup<T, R>(
    target:  &mut T,
    mut image: R,
    extents: &[Extent],
    meta:    &StreamMetadata,
    level:   i32,
) -> Result<()>
where
    T: Target + ?Sized,
    R: Read + Seek,
{
    let (stream_name, meta_name) = piece_names(meta);
    target.open(&stream_name)?;

    let mut writer = StreamWriter::new(TargetWriter::new(target), SparseStream::new(meta.stream_version()))
        .with_level(level);
    writer.write_metadata(meta)?;
    let mut buf = Vec::new();
    for extent in extents {
        if extent.data {
            buf.resize(extent.length as usize, 0);
            image.seek(SeekFrom::Start(extent.start))?;
            image.read_exact(&mut buf)?;
            writer.write_data(extent.start, &buf)?;
        } else {
            writer.write_zero(extent.start, extent.length)?;
        }
    }
    writer.finish()?;
    target.close()?;

    target.open(&meta_name)?;
    target.write(&meta.to_bytes()?)?;
    target.close()?;
    info!(stream = %stream_name, metadata = %meta_name, "backup complete");
    Ok(())
}

/// Rebuild the raw image into `out`.  The file is sized to `virtualSize`
/// first, so zero extents and any unlisted tail read back as zeroes.
///
/// Returns the number of data bytes written.
pub fn restore_image<R: Read + Seek>(reader: &mut StreamReader<R>, out: &mut File) -> Result<u64> {
    let virtual_size = reader.metadata().virtual_size;
    out.set_len(0)?;
    out.set_len(virtual_size)?;
    let mut restored = 0u64;
    for block in reader {
        if let Block::Data { start, data } = block? {
            out.seek(SeekFrom::Start(start))?;
            out.write_all(&data)?;
            restored += data.len() as u64;
        }
    }
    out.sync_all()?;
    info!(virtual_size, restored, "restore complete");
    Ok(restored)
}
