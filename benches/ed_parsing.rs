//! Ed-script parsing benchmarks for qrev.
//!
//! These benchmarks measure the performance of:
//! - Header parsing (parse_header)
//! - Full script parsing (parse_script)

mod common;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use common::generate_script;
use qrev::ed::{parse_header, parse_script};

/// Benchmark header parsing on the shapes a real diff emits.
fn bench_parse_header(c: &mut Criterion) {
    let mut group = c.benchmark_group("ed_parsing/parse_header");

    let headers = [
        ("add", "60a"),
        ("change_single", "7c"),
        ("change_range", "120,145c"),
        ("delete_range", "3,18d"),
        ("large_numbers", "123456,123789c"),
    ];

    for (name, header) in headers {
        group.bench_with_input(BenchmarkId::from_parameter(name), header, |b, header| {
            b.iter(|| black_box(parse_header(black_box(header))));
        });
    }

    group.finish();
}

/// Benchmark parsing whole scripts of increasing size.
fn bench_parse_script(c: &mut Criterion) {
    let mut group = c.benchmark_group("ed_parsing/parse_script");

    for commands in [10, 100, 1000] {
        let script = generate_script(commands);

        group.throughput(Throughput::Elements(commands as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(commands),
            &script,
            |b, script| {
                b.iter(|| {
                    let mut count = 0usize;
                    parse_script(script.as_bytes(), |cmd| {
                        black_box(&cmd);
                        count += 1;
                    })
                    .unwrap();
                    black_box(count)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_parse_header, bench_parse_script);
criterion_main!(benches);
