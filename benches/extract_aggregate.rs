//! Extraction and aggregation benchmark suite
//!
//! - Primary vs legacy grammar scans at various log sizes
//! - Legacy fallback cost (primary scan that finds nothing)
//! - Grouping and weighted aggregation over pre-extracted records

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fps_log_analyzer::aggregate::{group_by_scene, scene_averages};
use fps_log_analyzer::extract::{extract, primary_records};
use fps_log_analyzer::synth::{generate_log, SynthConfig};
use fps_log_analyzer::LogFormat;

fn log_for(runs: u32, format: LogFormat) -> String {
    generate_log(&SynthConfig {
        scenes: 8,
        runs,
        seed: 2025,
        format,
        stutters: runs as usize,
    })
}

/// Benchmark full extraction for both grammars
fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");

    for runs in [5u32, 50, 500] {
        for format in [LogFormat::Primary, LogFormat::Legacy] {
            let text = log_for(runs, format);
            group.throughput(Throughput::Bytes(text.len() as u64));
            group.bench_with_input(
                BenchmarkId::new(format.as_str(), runs * 8),
                &text,
                |bencher, text| bencher.iter(|| black_box(extract(black_box(text)))),
            );
        }
    }

    group.finish();
}

/// Cost of the primary scan on a legacy log before falling back
fn bench_primary_miss(c: &mut Criterion) {
    let text = log_for(100, LogFormat::Legacy);
    c.bench_function("primary_scan_on_legacy_log", |bencher| {
        bencher.iter(|| black_box(primary_records(black_box(&text)).count()))
    });
}

/// Benchmark grouping and weighted statistics
fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for runs in [5u32, 50, 500] {
        let records = extract(&log_for(runs, LogFormat::Primary))
            .expect("synthetic log extracts")
            .benchmarks;
        group.bench_with_input(
            BenchmarkId::new("group_and_average", records.len()),
            &records,
            |bencher, records| {
                bencher.iter(|| {
                    let scenes = group_by_scene(black_box(records));
                    black_box(scene_averages(&scenes))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_extract, bench_primary_miss, bench_aggregate);
criterion_main!(benches);
