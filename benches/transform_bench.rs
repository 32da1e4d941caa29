//! Benchmarks for transcript parsing, transformation and aggregation.
//!
//! Run with: `cargo bench`

use std::hint::black_box;
use std::path::{Path, PathBuf};

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use vscode_chat_insights::analytics::{compute_analytics, AnalyticsQuery, DateRange};
use vscode_chat_insights::scanner::{parse_session_bytes, SessionScanResult};
use vscode_chat_insights::transform::Transformer;

const PROMPTS: &[&str] = &[
    "fix the off-by-one error in the loop",
    "explain how the borrow checker handles this",
    "generate a builder for the config struct",
    "thanks",
];

/// Sample transcript with `request_count` requests.
fn generate_transcript(request_count: usize) -> Vec<u8> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    let requests: Vec<serde_json::Value> = (0..request_count)
        .map(|i| {
            let ts = start + Duration::minutes(i as i64 * 7);
            serde_json::json!({
                "requestId": format!("request_{i}"),
                "timestamp": ts.timestamp_millis(),
                "modelId": if i % 3 == 0 { "gpt-4o" } else { "claude-sonnet" },
                "message": { "text": PROMPTS[i % PROMPTS.len()], "parts": [] },
                "response": [{ "value": "Here is the change you asked for, with an explanation." }],
                "result": { "timings": { "firstProgress": 420, "totalElapsed": 2100 } },
                "variableData": { "variables": [
                    { "kind": "file", "value": { "uri": { "path": format!("/src/module_{}.rs", i % 10) } } }
                ] }
            })
        })
        .collect();

    serde_json::to_vec(&serde_json::json!({
        "version": 3,
        "sessionId": "0123456789abcdef",
        "creationDate": start.timestamp_millis(),
        "requests": requests
    }))
    .unwrap()
}

fn scan_result(bytes: &[u8]) -> SessionScanResult {
    let path = PathBuf::from("/storage/workspaceStorage/abc123/chatSessions/0123456789abcdef.json");
    SessionScanResult {
        session: parse_session_bytes(&path, bytes).unwrap(),
        file_size: bytes.len() as u64,
        path,
    }
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for size in [10, 100, 1000] {
        let data = generate_transcript(size);
        group.throughput(Throughput::Bytes(data.len() as u64));

        group.bench_with_input(BenchmarkId::new("parse_session_bytes", size), &data, |b, data| {
            b.iter(|| black_box(parse_session_bytes(Path::new("bench.json"), data)));
        });
    }

    group.finish();
}

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");
    let transformer = Transformer::default();

    for size in [10, 100, 1000] {
        let result = scan_result(&generate_transcript(size));
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("transform_session", size), &result, |b, result| {
            b.iter(|| black_box(transformer.transform_session(result)));
        });
    }

    group.finish();
}

fn bench_analytics(c: &mut Criterion) {
    let mut group = c.benchmark_group("analytics");
    let transformer = Transformer::default();

    for size in [100, 1000, 10_000] {
        let events = transformer.transform_session(&scan_result(&generate_transcript(size)));
        let first = events.first().map(|e| e.timestamp).unwrap();
        let last = events.last().map(|e| e.timestamp).unwrap();
        let query = AnalyticsQuery::new(DateRange::new(first, last).unwrap());
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("compute_analytics", size), &events, |b, events| {
            b.iter(|| black_box(compute_analytics(events, &query)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_transform, bench_analytics);
criterion_main!(benches);
