use sparsestream::{
    Block, Directory, DiskInfo, SinkError, SparseStream, StreamReader, StreamWriter, Target,
    TargetWriter, ZipStream,
};
use std::fs::{self, File};
use std::io::{Cursor, Read};
use tempfile::{tempdir, NamedTempFile};

#[test]
fn test_directory_rejects_plain_file() {
    let file = NamedTempFile::new().unwrap();
    fs::write(file.path(), b"keep me").unwrap();

    for _ in 0..2 {
        let err = Directory::new(file.path()).err().unwrap();
        assert!(matches!(err, SinkError::NotADirectory(_)));
    }
    assert_eq!(fs::read(file.path()).unwrap(), b"keep me");
}

#[test]
fn test_directory_creates_missing_target() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("backups").join("vm1");

    let mut target = Directory::new(&root).unwrap();
    assert!(root.is_dir());
    target.open("vda.full.data").unwrap();
    assert_eq!(target.write(b"hello").unwrap(), 5);
    target.close().unwrap();
    assert_eq!(fs::read(root.join("vda.full.data")).unwrap(), b"hello");

    // reusing an existing directory is fine
    Directory::new(&root).unwrap();
}

#[test]
fn test_directory_requires_open_piece() {
    let dir = tempdir().unwrap();
    let mut target = Directory::new(dir.path()).unwrap();
    assert!(matches!(target.write(b"x"), Err(SinkError::NotOpen)));
    assert!(matches!(target.close(), Err(SinkError::NotOpen)));
}

#[test]
fn test_stream_through_directory_target() {
    let dir = tempdir().unwrap();
    let mut target = Directory::new(dir.path()).unwrap();
    let format = SparseStream::default();
    let disk = DiskInfo { target: "vda".into(), format: "raw".into() };
    let meta = format.metadata(8192, 4096, &disk, "cp1", None, false, true).unwrap();

    target.open("vda.full.data").unwrap();
    let mut writer = StreamWriter::new(TargetWriter::new(&mut target), format);
    writer.write_metadata(&meta).unwrap();
    writer.write_data(4096, &[7u8; 4096]).unwrap();
    writer.finish().unwrap();
    target.close().unwrap();

    let file = File::open(dir.path().join("vda.full.data")).unwrap();
    let blocks: Vec<Block> = StreamReader::open(file)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(blocks, vec![Block::Data { start: 4096, data: vec![7u8; 4096] }]);
}

#[test]
fn test_zip_stream_members() {
    let out = NamedTempFile::new().unwrap();
    let format = SparseStream::default();
    let disk = DiskInfo { target: "vda".into(), format: "raw".into() };
    let meta = format.metadata(4096, 4096, &disk, "cp1", None, false, false).unwrap();

    let mut target = ZipStream::new(File::create(out.path()).unwrap());
    target.open("vda.full.data").unwrap();
    let mut writer = StreamWriter::new(TargetWriter::new(&mut target), format);
    writer.write_metadata(&meta).unwrap();
    writer.write_data(0, &[1u8; 4096]).unwrap();
    writer.finish().unwrap();
    target.close().unwrap();
    target.open("vda.cp1.json").unwrap();
    target.write(&meta.to_bytes().unwrap()).unwrap();
    target.finish().unwrap();

    let mut archive = zip::ZipArchive::new(File::open(out.path()).unwrap()).unwrap();
    assert_eq!(archive.len(), 2);

    let mut stream = Vec::new();
    archive.by_name("vda.full.data").unwrap().read_to_end(&mut stream).unwrap();
    let mut reader = StreamReader::open(Cursor::new(stream)).unwrap();
    assert_eq!(reader.metadata(), &meta);
    assert_eq!(
        reader.next_block().unwrap(),
        Some(Block::Data { start: 0, data: vec![1u8; 4096] })
    );

    let mut json = Vec::new();
    archive.by_name("vda.cp1.json").unwrap().read_to_end(&mut json).unwrap();
    assert_eq!(SparseStream::load_metadata(&json).unwrap(), meta);
}
