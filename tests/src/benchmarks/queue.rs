//! # Backpressure Queue and Scheduler Benchmarks
//!
//! - Single-producer/single-consumer put/take through a bounded queue
//! - Offer against a full queue (the non-blocking reject path)
//! - End-to-end task throughput per dispatch model

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use shared_wiring::{BackpressureQueue, DispatchModel, TaskScheduler, WiringConfig, WiringModel};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub fn bench_queue_put_take(c: &mut Criterion) {
    let mut group = c.benchmark_group("wiring-queue");
    group.measurement_time(Duration::from_secs(5));

    for capacity in [1usize, 64, 1024] {
        const ITEMS: u64 = 10_000;
        group.throughput(Throughput::Elements(ITEMS));
        group.bench_with_input(
            BenchmarkId::new("spsc_put_take", capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let queue = Arc::new(BackpressureQueue::new(capacity));
                    let producer = {
                        let queue = Arc::clone(&queue);
                        thread::spawn(move || {
                            for i in 0..ITEMS {
                                queue.put(i).unwrap();
                            }
                        })
                    };
                    let mut sum = 0u64;
                    for _ in 0..ITEMS {
                        sum += queue.take().unwrap();
                    }
                    producer.join().unwrap();
                    black_box(sum)
                })
            },
        );
    }

    let full = BackpressureQueue::new(1);
    full.put(0u64).unwrap();
    group.bench_function("offer_rejected", |b| {
        b.iter(|| black_box(full.offer(black_box(1)).is_err()))
    });

    group.finish();
}

pub fn bench_scheduler_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("wiring-scheduler");
    group.measurement_time(Duration::from_secs(5));
    const TASKS: u64 = 5_000;
    group.throughput(Throughput::Elements(TASKS));

    for dispatch in [DispatchModel::Direct, DispatchModel::Sequential, DispatchModel::Pooled] {
        let model = WiringModel::new(WiringConfig::default());
        let scheduler: TaskScheduler<u64> = model
            .scheduler_builder("bench")
            .with_dispatch(dispatch)
            .with_flushing(true)
            .build()
            .unwrap();
        let input = scheduler.build_input_wire::<u64>("numbers");
        input.bind(|n| Some(black_box(n.wrapping_mul(31)))).unwrap();

        group.bench_function(BenchmarkId::new("put_flush", dispatch), |b| {
            b.iter(|| {
                for i in 0..TASKS {
                    input.put(i).unwrap();
                }
                scheduler.flush().unwrap();
            })
        });
        model.stop();
    }

    group.finish();
}
