//! Benchmarks for the telemetry pipeline
//!
//! Encoder alone, then the full emit path into memory and into a file.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use telemetry_core::envelope::{encode, escape_json_string};
use telemetry_core::{Emitter, MemorySink, NullSink, TelemetryConfig};

const CONTRACT: &str = include_str!("../../contracts/telemetry_events_v1.json");

const TICK_PAYLOAD: &str =
    r#"{"gain":0.700,"cost":0.400,"lambda":1.0,"W_value":0.300,"state":"STABLE"}"#;

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    group.bench_function("plain", |b| {
        b.iter(|| {
            black_box(encode(
                black_box("W_EVALUATION_TICK"),
                black_box(Some(TICK_PAYLOAD)),
                "demo_05min_seed1337",
                1_700_000_000_000,
            ))
        })
    });

    group.bench_function("fallback_payload", |b| {
        b.iter(|| black_box(encode("W_EVALUATION_TICK", Some("not-json"), "s", 0)))
    });

    for len in [16usize, 256, 4096] {
        let clean = "a".repeat(len);
        let dirty = "a\"\n\u{1}".repeat(len / 4);
        group.bench_with_input(BenchmarkId::new("escape_clean", len), &clean, |b, s| {
            b.iter(|| black_box(escape_json_string(s)))
        });
        group.bench_with_input(BenchmarkId::new("escape_dirty", len), &dirty, |b, s| {
            b.iter(|| black_box(escape_json_string(s)))
        });
    }

    group.finish();
}

fn bench_emit(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let contract_path = dir.path().join("contract.json");
    std::fs::write(&contract_path, CONTRACT).expect("write contract");

    let mut group = c.benchmark_group("emit");

    let validated = Emitter::new(
        TelemetryConfig::default()
            .with_contract_path(&contract_path)
            .with_session_override("bench"),
    )
    .with_sink(Arc::new(NullSink::new()));
    validated.initialize();

    group.bench_function("validated_null_sink", |b| {
        b.iter(|| black_box(validated.emit("W_EVALUATION_TICK", TICK_PAYLOAD)))
    });

    group.bench_function("rejected", |b| {
        b.iter(|| black_box(validated.emit("NOT_DECLARED", TICK_PAYLOAD)))
    });

    let memory = Arc::new(MemorySink::new());
    let structured = Emitter::new(TelemetryConfig::default().with_session_override("bench"))
        .with_sink(memory.clone());
    structured.initialize();

    group.bench_function("structured_payload", |b| {
        b.iter(|| {
            if memory.len() > 100_000 {
                memory.clear();
            }
            black_box(structured.emit(
                "CCS_PRECISION_SAMPLE",
                json!({ "precision_index": 0.5, "shockwave_radius": 1.1 }),
            ))
        })
    });

    let file = Emitter::ready(
        TelemetryConfig::default()
            .with_output_root(dir.path())
            .with_session_override("bench"),
    );

    group.bench_function("jsonl_file", |b| {
        b.iter(|| black_box(file.emit("W_EVALUATION_TICK", TICK_PAYLOAD)))
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_emit);

criterion_main!(benches);
