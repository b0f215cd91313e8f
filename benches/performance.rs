//! Performance benchmarks for the CPU-bound parts of a test run
//!
//! Covers latency statistics, name filtering, configuration parsing and
//! result ranking. Network I/O dominates a real run, so these guard against
//! regressions in the bookkeeping around it.

use clap::Parser;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use proxy_speed_tester::{
    cli::Cli,
    config::ConfigParser,
    models::{LatencyStats, ProbeSample, ProxyDescriptor, TestResult},
    output::ResultTable,
    registry::{parse_document, ProxyFilter},
    stats::{mean_and_std_dev, LatencyCalculator},
    storage::sort_results,
};
use serde_json::json;
use std::{hint::black_box, time::Duration};

/// Probe samples with every tenth one timed out
fn create_samples(count: usize) -> Vec<ProbeSample> {
    (0..count)
        .map(|i| {
            if i % 10 == 9 {
                ProbeSample::TimedOut
            } else {
                ProbeSample::Success(Duration::from_millis(40 + (i as u64 * 7) % 120))
            }
        })
        .collect()
}

fn create_descriptor(i: usize) -> ProxyDescriptor {
    let raw = json!({
        "name": format!("HK {:03} | IPLC", i),
        "type": "ss",
        "server": format!("hk{}.example.com", i),
        "port": 8388,
        "cipher": "aes-128-gcm",
        "password": "secret",
    });
    ProxyDescriptor::from_raw(raw.as_object().cloned().unwrap()).unwrap()
}

fn create_results(count: usize) -> Vec<TestResult> {
    (0..count)
        .map(|i| {
            let stats = if i % 7 == 0 {
                LatencyStats::unreachable(6)
            } else {
                LatencyStats {
                    latency: Some(Duration::from_millis(50 + (i as u64 * 13) % 400)),
                    jitter: Duration::from_millis(i as u64 % 20),
                    packet_loss: 0.0,
                    total_samples: 6,
                    successful_samples: 6,
                }
            };
            let speed = (i % 7 != 0).then(|| 1_000_000.0 + (i as f64 * 37_000.0) % 9_000_000.0);
            TestResult::new(&create_descriptor(i), stats, speed, speed.map(|s| s / 3.0))
        })
        .collect()
}

fn create_document(count: usize) -> String {
    let mut doc = String::from("port: 7890\nproxies:\n");
    for i in 0..count {
        doc.push_str(&format!(
            "  - {{ name: \"Node {:04}\", type: vmess, server: n{}.example.com, port: 443, uuid: u-{} }}\n",
            i, i, i
        ));
    }
    doc.push_str("rules:\n  - MATCH,DIRECT\n");
    doc
}

fn benchmark_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics");

    for size in [6, 60, 600].iter() {
        let samples = create_samples(*size);
        let values: Vec<f64> = samples
            .iter()
            .filter_map(|s| s.rtt())
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();

        group.bench_with_input(BenchmarkId::new("latency_calculator", size), size, |b, _| {
            let mut calculator = LatencyCalculator::new();
            b.iter(|| black_box(calculator.calculate(black_box(&samples))));
        });

        group.bench_with_input(BenchmarkId::new("mean_and_std_dev", size), size, |b, _| {
            b.iter(|| black_box(mean_and_std_dev(black_box(&values))));
        });
    }

    group.finish();
}

fn benchmark_filtering(c: &mut Criterion) {
    let mut group = c.benchmark_group("filtering");
    let names: Vec<String> = (0..1000).map(|i| format!("HK {:03} | IPLC x{}", i, i % 3)).collect();

    let filter = ProxyFilter::from_cli("^(HK|JP|SG)", "x2|expire|traffic").unwrap();
    group.bench_function("regex_and_keywords", |b| {
        b.iter(|| black_box(names.iter().filter(|n| filter.matches(n)).count()));
    });

    let allow_all = ProxyFilter::allow_all();
    group.bench_function("allow_all", |b| {
        b.iter(|| black_box(names.iter().filter(|n| allow_all.matches(n)).count()));
    });

    group.finish();
}

fn benchmark_config_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_parsing");

    for size in [10, 100, 1000].iter() {
        let doc = create_document(*size);
        group.bench_with_input(BenchmarkId::new("parse_document", size), size, |b, _| {
            b.iter(|| black_box(parse_document(black_box(&doc)).unwrap()));
        });
    }

    let cli = Cli::parse_from(["pst", "-c", "clash.yaml", "--fast", "--timeout", "3s", "--workers", "8"]);
    group.bench_function("parse_from_cli", |b| {
        b.iter(|| black_box(ConfigParser::new(black_box(cli.clone())).parse()));
    });

    group.finish();
}

fn benchmark_result_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("result_processing");
    let results = create_results(500);

    group.bench_function("sort_results", |b| {
        b.iter(|| {
            let mut results = results.clone();
            sort_results(&mut results);
            black_box(results);
        });
    });

    let table = ResultTable::new(false, false);
    group.bench_function("render_table", |b| {
        b.iter(|| black_box(table.render(black_box(&results)).unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_statistics,
    benchmark_filtering,
    benchmark_config_parsing,
    benchmark_result_processing
);

criterion_main!(benches);
