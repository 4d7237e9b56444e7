//! Image codec and compression benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dbhandler_bench::{gradient_image, random_annotation, random_image};
use dbhandler_core::column::{ColumnFile, DType};
use dbhandler_core::{Compression, ImageCodec, JpegCodec, PngCodec};
use dbhandler_storage::InMemoryBackend;

/// Benchmark encoding a photo-sized image.
fn bench_image_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("image_encode");
    group.sample_size(20);

    let image = gradient_image(640, 400);
    group.throughput(Throughput::Bytes(image.as_raw().len() as u64));

    let codecs: [(&str, Box<dyn ImageCodec>); 3] = [
        ("jpeg_95", Box::new(JpegCodec::new(95))),
        ("jpeg_75", Box::new(JpegCodec::new(75))),
        ("png", Box::new(PngCodec)),
    ];
    for (name, codec) in &codecs {
        group.bench_function(*name, |b| {
            b.iter(|| black_box(codec.encode(black_box(&image)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark decoding back to RGB.
fn bench_image_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("image_decode");
    group.sample_size(20);

    let image = random_image(320, 200);
    for (name, bytes) in [
        ("jpeg", JpegCodec::new(95).encode(&image).unwrap()),
        ("png", PngCodec.encode(&image).unwrap()),
    ] {
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| black_box(PngCodec.decode(black_box(&bytes)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark writing annotations into a compressed column.
fn bench_column_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("column_set");

    let label = serde_json::to_vec(&random_annotation(32)).unwrap();
    group.throughput(Throughput::Bytes(label.len() as u64));

    for compression in [
        Compression::None,
        Compression::Gzip(4),
        Compression::Zstd(3),
    ] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{compression:?}")),
            &compression,
            |b, &compression| {
                let mut file = ColumnFile::create(InMemoryBackend::new()).unwrap();
                file.add_column("labels", DType::Utf8, compression).unwrap();
                let mut index = 0u64;

                b.iter(|| {
                    file.resize("labels", index + 1).unwrap();
                    file.set("labels", index, black_box(&label)).unwrap();
                    index += 1;
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_image_encode,
    bench_image_decode,
    bench_column_compression
);
criterion_main!(benches);
