//! # Classifier Benchmarks
//!
//! Performance benchmarks for extraction and classification.
//!
//! Run with: `cargo bench -p pupdates-core`

use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pupdates_core::primitives::DEFAULT_SNAPSHOT_PREFIX;
use pupdates_core::{
    Classifier, ClassifierInput, EntityId, EntityRecord, ExtractedSnapshot, History, OverrideSet,
    RawRecord, SnapshotId, StatusTag, extract,
};
use serde_json::json;
use std::hint::black_box;

fn snapshot_id(day: u32, hour: u32) -> SnapshotId {
    let at = NaiveDate::from_ymd_opt(2025, 12, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .expect("time");
    SnapshotId::from_parts(DEFAULT_SNAPSHOT_PREFIX, at)
}

/// A population of `size` animals where a slice churns every snapshot.
fn population(day: u32, hour: u32, size: u64, shift: u64) -> ExtractedSnapshot {
    let records = (shift..shift + size).map(|i| {
        let location = match i % 17 {
            0 => "Main Campus - Trial Adoption".to_string(),
            1 => String::new(),
            _ => format!("Kennel {}", i % 60),
        };
        EntityRecord::new(EntityId(i), format!("dog-{i}"), StatusTag::Available, location)
    });
    ExtractedSnapshot::from_records(snapshot_id(day, hour), records)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let classifier = Classifier::default();
    let overrides = OverrideSet::new();
    let now = NaiveDate::from_ymd_opt(2025, 12, 30)
        .and_then(|d| d.and_hms_opt(16, 0, 0))
        .expect("now");

    for size in [300u64, 3_000, 30_000].iter() {
        let latest = population(30, 15, *size, 10);
        let previous = population(30, 9, *size, 5);
        let history = History::from_snapshots((1..28).map(|day| population(day, 15, *size, 0)));

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                black_box(classifier.classify(&ClassifierInput {
                    latest: &latest,
                    previous: &previous,
                    history: &history,
                    overrides: &overrides,
                    now,
                }))
            });
        });
    }

    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    let id = snapshot_id(30, 15);

    for size in [300u64, 3_000].iter() {
        let records: Vec<RawRecord> = (0..*size)
            .map(|i| {
                RawRecord::new(
                    id.as_str(),
                    json!({
                        "id": i % (*size / 2 + 1),
                        "name": format!("dog-{i}"),
                        "status": "Available",
                        "location": ["Main Campus", format!("Kennel {}", i % 60)],
                    }),
                )
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(extract(&id, &records)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_classify, bench_extract);
criterion_main!(benches);
