use std::{
    fs::{create_dir_all, File},
    io::{Cursor, Write},
    sync::Arc,
};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use crcscan_core::{self as core, checksum, ChecksumTable};

fn build_tree(root: &std::path::Path, dirs: usize, files_per_dir: usize, file_size: usize) {
    for d in 0..dirs {
        let dir = root.join(format!("d{d}"));
        let _ = create_dir_all(&dir);
        for f in 0..files_per_dir {
            let mut fh = File::create(dir.join(format!("f{f}.bin"))).unwrap();
            fh.write_all(&vec![0u8; file_size]).unwrap();
        }
    }
}

fn bench_buffer_sizes(c: &mut Criterion) {
    let table = ChecksumTable::castagnoli();
    let data = vec![0x5Au8; 16 << 20];
    let mut group = c.benchmark_group("checksum_reader");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for kb in [4usize, 64, 1024] {
        let mut buf = vec![0u8; kb * 1024];
        group.bench_function(BenchmarkId::new("buffer_kb", kb), |b| {
            b.iter(|| {
                checksum::checksum_reader(&table, Cursor::new(&data), data.len() as u64, &mut buf)
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    let tmp = tempfile::tempdir().unwrap();
    build_tree(tmp.path(), 16, 64, 4096);
    for workers in [1usize, 4, 16] {
        let pipeline = core::Pipeline::new(
            core::OptionsBuilder::new()
                .workers(workers)
                .on_event(|_| {})
                .build(),
        )
        .unwrap();
        group.bench_function(BenchmarkId::new("workers", workers), |b| {
            b.iter(|| {
                let sink = Arc::new(core::WriterSink::new(std::io::sink()));
                pipeline.run(&[tmp.path()], sink).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_buffer_sizes, bench_pipeline);
criterion_main!(benches);
