//! # QC-18 Event Deduplication Benchmarks
//!
//! - Novel events (every event recorded)
//! - Duplicate-heavy gossip (every event seen five times)
//! - Window advance over a populated map

use crate::fixtures::event;
use criterion::{black_box, BatchSize, BenchmarkId, Criterion, Throughput};
use qc_18_event_deduplication::{DedupConfig, EventDeduplicationApi, EventDeduplicator};
use shared_types::{AncientMode, EventWindow, PlatformEvent};
use std::time::Duration;

fn stream(generations: u64, copies: usize) -> Vec<PlatformEvent> {
    let mut events = Vec::with_capacity(generations as usize * copies);
    for generation in 0..generations {
        // Same descriptor and signature from every peer.
        events.extend(std::iter::repeat(event(generation % 16, generation, 1)).take(copies));
    }
    events
}

pub fn bench_dedup_handle_event(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-18-dedup");
    group.measurement_time(Duration::from_secs(5));

    for copies in [1usize, 5] {
        let events = stream(2_000, copies);
        group.throughput(Throughput::Elements(events.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("handle_event", copies),
            &events,
            |b, events| {
                b.iter_batched(
                    || (EventDeduplicator::new(&DedupConfig::default()), events.clone()),
                    |(mut dedup, events)| {
                        for e in events {
                            black_box(dedup.handle_event(e));
                        }
                    },
                    BatchSize::LargeInput,
                )
            },
        );
    }

    group.finish();
}

pub fn bench_dedup_window_shift(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-18-dedup-window");

    for tracked in [1_000u64, 10_000] {
        let events = stream(tracked, 1);
        group.bench_with_input(
            BenchmarkId::new("evict_half", tracked),
            &events,
            |b, events| {
                b.iter_batched(
                    || {
                        let mut dedup = EventDeduplicator::new(&DedupConfig::default());
                        for e in events.iter().cloned() {
                            dedup.handle_event(e);
                        }
                        dedup
                    },
                    |mut dedup| {
                        let half = tracked / 2;
                        let window =
                            EventWindow::new(half, half, AncientMode::GenerationThreshold);
                        dedup.set_event_window(window);
                        black_box(dedup.tracked_descriptors())
                    },
                    BatchSize::LargeInput,
                )
            },
        );
    }

    group.finish();
}
