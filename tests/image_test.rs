use sparsestream::codec::CodecId;
use sparsestream::image::{piece_names, restore_image, scan_extents, write_backup, Extent};
use sparsestream::{Directory, DiskInfo, SparseStream, StreamMetadata, StreamReader};
use std::fs::{self, File};
use std::io::{BufReader, Cursor};
use std::path::Path;
use tempfile::tempdir;

fn vda() -> DiskInfo {
    DiskInfo { target: "vda".to_string(), format: "raw".to_string() }
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) | 1).collect()
}

/// 64 KiB data, 128 KiB hole, 4 KiB data.
fn gapped_image() -> Vec<u8> {
    let mut image = pattern(65_536, 7);
    image.resize(65_536 + 131_072, 0);
    image.extend_from_slice(&pattern(4096, 11));
    image
}

fn backup_meta(image: &[u8], extents: &[Extent], codec: Option<CodecId>) -> StreamMetadata {
    let format = match codec {
        Some(id) => SparseStream::default().with_compression(id),
        None     => SparseStream::default(),
    };
    let data_size = extents.iter().filter(|e| e.data).map(|e| e.length).sum();
    format
        .metadata(image.len() as u64, data_size, &vda(), "cp1", None, false, codec.is_some())
        .unwrap()
}

fn backup_and_restore(dir: &Path, image: &[u8], block_size: usize, codec: Option<CodecId>) -> Vec<u8> {
    let extents = scan_extents(image, block_size).unwrap();
    let meta = backup_meta(image, &extents, codec);
    let mut target = Directory::new(dir).unwrap();
    write_backup(&mut target, Cursor::new(image), &extents, &meta, 3).unwrap();

    let (stream_name, meta_name) = piece_names(&meta);
    let saved: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.join(&meta_name)).unwrap()).unwrap();
    assert_eq!(saved["virtualSize"], image.len() as u64);

    let file = File::open(dir.join(&stream_name)).unwrap();
    let mut reader = StreamReader::open(BufReader::new(file)).unwrap();
    let restored_path = dir.join("restored.img");
    let mut out = File::create(&restored_path).unwrap();
    let written = restore_image(&mut reader, &mut out).unwrap();
    assert_eq!(written, meta.data_size);
    drop(out);
    fs::read(restored_path).unwrap()
}

#[test]
fn test_scan_merges_zero_blocks() {
    let extents = scan_extents(&gapped_image()[..], 65_536).unwrap();
    assert_eq!(
        extents,
        vec![
            Extent { start: 0,       length: 65_536,  data: true },
            Extent { start: 65_536,  length: 131_072, data: false },
            Extent { start: 196_608, length: 4096,    data: true },
        ]
    );
}

#[test]
fn test_scan_keeps_data_blocks_separate() {
    let image = pattern(3 * 4096, 5);
    let extents = scan_extents(&image[..], 4096).unwrap();
    assert_eq!(extents.len(), 3);
    assert!(extents.iter().all(|e| e.data && e.length == 4096));
    assert_eq!(extents[2].start, 8192);

    assert!(scan_extents(&[][..], 4096).unwrap().is_empty());
}

#[test]
fn test_piece_names() {
    let image = gapped_image();
    let extents = scan_extents(&image[..], 65_536).unwrap();
    let mut meta = backup_meta(&image, &extents, None);
    assert_eq!(piece_names(&meta), ("vda.full.data".to_string(), "vda.cp1.json".to_string()));
    meta.incremental = true;
    assert_eq!(piece_names(&meta).0, "vda.inc.data");
}

#[test]
fn test_backup_restore_reproduces_gapped_image() {
    let image = gapped_image();
    for codec in [None, Some(CodecId::Lz4), Some(CodecId::Zstd)] {
        let dir = tempdir().unwrap();
        let restored = backup_and_restore(dir.path(), &image, 65_536, codec);
        assert_eq!(restored.len(), image.len(), "{codec:?}");
        assert!(restored == image, "restored image differs for {codec:?}");
    }
}

#[test]
fn test_restore_sizes_image_with_trailing_hole() {
    let mut image = pattern(4096, 3);
    image.resize(4096 + 131_072, 0);
    let dir = tempdir().unwrap();
    let restored = backup_and_restore(dir.path(), &image, 4096, Some(CodecId::Lz4));
    assert_eq!(restored.len() as u64, 4096 + 131_072);
    assert!(restored == image);
}

#[test]
fn test_restore_truncates_existing_output() {
    let image = gapped_image();
    let dir = tempdir().unwrap();
    let extents = scan_extents(&image[..], 65_536).unwrap();
    let meta = backup_meta(&image, &extents, None);
    let mut target = Directory::new(dir.path()).unwrap();
    write_backup(&mut target, Cursor::new(&image[..]), &extents, &meta, 3).unwrap();

    // stale bytes in the hole must not survive the restore
    let restored_path = dir.path().join("restored.img");
    fs::write(&restored_path, vec![0xeeu8; image.len() + 10]).unwrap();
    let mut out = fs::OpenOptions::new().write(true).open(&restored_path).unwrap();
    let file = File::open(dir.path().join(piece_names(&meta).0)).unwrap();
    let mut reader = StreamReader::open(BufReader::new(file)).unwrap();
    restore_image(&mut reader, &mut out).unwrap();
    drop(out);
    assert!(fs::read(restored_path).unwrap() == image);
}
