//! # Quantum-Chain Pipeline Benchmarks
//!
//! | Area | Benchmark |
//! |------|-----------|
//! | Wiring | queue put/take, offer rejection, scheduler throughput per dispatch model |
//! | qc-18 Event Deduplication | handle_event (novel, duplicate-heavy), window shift |

use criterion::{criterion_group, criterion_main};
use qc_tests::benchmarks::{dedup, queue};

criterion_group!(
    wiring_benches,
    queue::bench_queue_put_take,
    queue::bench_scheduler_throughput
);
criterion_group!(
    dedup_benches,
    dedup::bench_dedup_handle_event,
    dedup::bench_dedup_window_shift
);
criterion_main!(wiring_benches, dedup_benches);
