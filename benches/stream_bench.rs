use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sparsestream::codec::{Codec, Lz4Codec, ZstdCodec};
use sparsestream::{encode_frame, parse_header, read_header, CodecId, DiskInfo, FrameKind};
use sparsestream::{SparseStream, StreamReader, StreamWriter};
use std::io::Cursor;

fn write_stream(format: SparseStream, compressed: bool, block: &[u8], blocks: u64) -> Vec<u8> {
    let disk = DiskInfo { target: "vda".into(), format: "raw".into() };
    let size = block.len() as u64 * blocks;
    let meta = format.metadata(size, size, &disk, "bench", None, false, compressed).unwrap();
    let mut writer = StreamWriter::new(Cursor::new(Vec::new()), format);
    writer.write_metadata(&meta).unwrap();
    for i in 0..blocks {
        writer.write_data(i * block.len() as u64, black_box(block)).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn bench_frames(c: &mut Criterion) {
    c.bench_function("frame_encode", |b| {
        b.iter(|| encode_frame(FrameKind::Data, black_box(0x1_0000_0000), black_box(65_536)))
    });
    let bytes = encode_frame(FrameKind::Data, 0x1_0000_0000, 65_536).unwrap();
    c.bench_function("frame_decode", |b| {
        b.iter(|| parse_header(&read_header(black_box(&bytes[..])).unwrap()))
    });
}

fn bench_compression(c: &mut Criterion) {
    let data = vec![0u8; 1024 * 1024];
    c.bench_function("zstd_compress_1mb", |b| b.iter(|| ZstdCodec.compress(black_box(&data), 3)));
    c.bench_function("lz4_compress_1mb", |b| b.iter(|| Lz4Codec.compress(black_box(&data), 0)));
}

fn bench_stream(c: &mut Criterion) {
    let block = vec![42u8; 64 * 1024];

    c.bench_function("write_16x64k_plain", |b| {
        b.iter(|| write_stream(SparseStream::default(), false, &block, 16))
    });
    c.bench_function("write_16x64k_lz4", |b| {
        b.iter(|| write_stream(SparseStream::default().with_compression(CodecId::Lz4), true, &block, 16))
    });

    let stream = write_stream(SparseStream::default(), true, &block, 16);
    c.bench_function("read_16x64k_lz4", |b| {
        b.iter(|| {
            let reader = StreamReader::open(Cursor::new(black_box(&stream[..]))).unwrap();
            reader.count()
        })
    });
}

criterion_group!(benches, bench_frames, bench_compression, bench_stream);
criterion_main!(benches);
