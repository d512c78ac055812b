//! # Event Deduplication Integration Tests
//!
//! Exercises qc-18 through its public API only:
//!
//! 1. **Identity**: a (descriptor, signature) pair passes once per window
//! 2. **Disparate signatures**: forwarded and counted separately
//! 3. **Ancient events**: dropped without being recorded
//! 4. **Eviction**: raising the window forgets older descriptors
//! 5. **Flush barrier**: the async wrapper's flush waits for queued events
//! 6. **Reference model**: random event/window streams agree with a plain
//!    set-based model

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use proptest::prelude::*;
    use qc_18_event_deduplication::{
        AsyncEventDeduplicator, DedupConfig, DedupConfigBuilder, EventDeduplicationApi,
        EventDeduplicator, IntakeEventCounter, PeerIntakeCounter,
    };
    use rand::seq::SliceRandom;
    use rand::Rng;
    use shared_types::{AncientMode, EventWindow, NodeId, PlatformEvent};
    use shared_wiring::WiringModel;

    use crate::fixtures::{collector, event};

    fn window(threshold: u64) -> EventWindow {
        EventWindow::new(threshold, threshold, AncientMode::GenerationThreshold)
    }

    fn deduplicator() -> EventDeduplicator {
        EventDeduplicator::new(&DedupConfig::default())
    }

    // =========================================================================
    // IDENTITY AND SIGNATURES
    // =========================================================================

    #[test]
    fn test_each_pair_forwarded_once_in_random_order() {
        let mut rng = rand::thread_rng();
        let mut dedup = deduplicator();

        let mut stream: Vec<PlatformEvent> = Vec::new();
        for creator in 0..4 {
            for generation in 0..25 {
                let copies = rng.gen_range(1..4);
                for _ in 0..copies {
                    stream.push(event(creator, generation, 1));
                }
            }
        }
        stream.shuffle(&mut rng);
        let total = stream.len() as u64;

        let forwarded = stream
            .into_iter()
            .filter_map(|e| dedup.handle_event(e))
            .count();

        assert_eq!(forwarded, 100);
        let metrics = dedup.metrics();
        assert_eq!(metrics.forwarded, 100);
        assert_eq!(metrics.duplicates, total - 100);
        assert_eq!(metrics.disparate_signatures, 0);
    }

    #[test]
    fn test_disparate_signatures_not_counted_as_duplicates() {
        let mut dedup = deduplicator();

        for signature in 0..5 {
            assert!(dedup.handle_event(event(1, 10, signature)).is_some());
        }
        assert!(dedup.handle_event(event(1, 10, 3)).is_none());

        let metrics = dedup.metrics();
        assert_eq!(metrics.disparate_signatures, 4);
        assert_eq!(metrics.duplicates, 1);
        assert_eq!(dedup.tracked_descriptors(), 1);
    }

    // =========================================================================
    // WINDOW
    // =========================================================================

    #[test]
    fn test_ancient_event_is_not_remembered() {
        let mut dedup = deduplicator();
        dedup.set_event_window(window(50));
        assert!(dedup.handle_event(event(2, 49, 1)).is_none());
        assert_eq!(dedup.metrics().ancient_discards, 1);

        dedup.set_event_window(window(40));
        assert!(dedup.handle_event(event(2, 49, 1)).is_some());
        assert_eq!(dedup.metrics().duplicates, 0);
    }

    #[test]
    fn test_raised_window_forgets_older_descriptors() {
        let mut dedup = deduplicator();
        for generation in 0..10 {
            dedup.handle_event(event(3, generation, 1));
        }
        assert_eq!(dedup.tracked_descriptors(), 10);

        dedup.set_event_window(window(6));
        assert_eq!(dedup.tracked_descriptors(), 4);
        assert_eq!(dedup.metrics().evicted, 6);

        // Lowering again re-admits the evicted generations as novel.
        dedup.set_event_window(window(0));
        assert!(dedup.handle_event(event(3, 2, 1)).is_some());
        assert!(dedup.handle_event(event(3, 8, 1)).is_none());
    }

    #[test]
    fn test_birth_round_window() {
        let config = DedupConfigBuilder::new()
            .ancient_mode(AncientMode::BirthRoundThreshold)
            .build()
            .unwrap();
        let mut dedup = EventDeduplicator::new(&config);
        dedup.set_event_window(EventWindow::new(20, 15, AncientMode::BirthRoundThreshold));

        // Fixture events carry birth_round == generation.
        assert!(dedup.handle_event(event(1, 14, 1)).is_none());
        assert!(dedup.handle_event(event(1, 15, 1)).is_some());
    }

    // =========================================================================
    // INTAKE ACCOUNTING
    // =========================================================================

    #[test]
    fn test_dropped_events_release_peer_budget() {
        let counter = Arc::new(PeerIntakeCounter::new());
        let mut dedup = deduplicator()
            .with_intake_counter(Arc::clone(&counter) as Arc<dyn IntakeEventCounter>);
        dedup.set_event_window(window(5));

        let peer = NodeId(77);
        for generation in [1, 6, 6, 7] {
            counter.event_entered(peer);
            let forwarded = dedup.handle_event(event(9, generation, 1).with_sender(peer));
            if forwarded.is_some() {
                // Downstream would release forwarded events.
                counter.event_exited(peer);
            }
        }
        assert_eq!(counter.unprocessed(peer), 0);
        assert!(!counter.has_unprocessed_events(peer));
    }

    // =========================================================================
    // ASYNC WRAPPER
    // =========================================================================

    #[test]
    fn test_flush_after_concurrent_producers_sees_everything() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 250;
        let config = DedupConfig::default().with_queue_capacity(64);
        let dedup = Arc::new(AsyncEventDeduplicator::spawn(&config, deduplicator()).unwrap());

        let model = WiringModel::default();
        let (sink, seen) = collector::<PlatformEvent>(&model, "dedup_output");
        dedup.output_wire().solder_to(&sink);

        let barrier = Arc::new(Barrier::new(PRODUCERS as usize));
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let dedup = Arc::clone(&dedup);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for generation in 0..PER_PRODUCER {
                        // Every producer sends the same events: only one
                        // copy of each may pass.
                        dedup.put_event(event(0, generation, 1)).unwrap();
                        dedup.put_event(event(p + 1, generation, 1)).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        dedup.flush().unwrap();
        let expected = PER_PRODUCER + PRODUCERS * PER_PRODUCER;
        assert_eq!(seen.lock().len() as u64, expected);

        let metrics = dedup.metrics();
        assert_eq!(metrics.forwarded, expected);
        assert_eq!(metrics.duplicates, (PRODUCERS - 1) * PER_PRODUCER);
        assert_eq!(dedup.queued(), 0);

        dedup.stop();
        model.stop();
    }

    #[test]
    fn test_window_and_clear_apply_in_queue_order() {
        let dedup = AsyncEventDeduplicator::spawn(&DedupConfig::default(), deduplicator()).unwrap();

        dedup.put_event(event(1, 3, 1)).unwrap();
        dedup.clear().unwrap();
        dedup.put_event(event(1, 3, 1)).unwrap();
        dedup.set_event_window(window(4)).unwrap();
        dedup.put_event(event(1, 3, 1)).unwrap();
        dedup.flush().unwrap();

        let metrics = dedup.metrics();
        assert_eq!(metrics.forwarded, 2);
        assert_eq!(metrics.duplicates, 0);
        assert_eq!(metrics.ancient_discards, 1);
        dedup.stop();
    }

    // =========================================================================
    // REFERENCE MODEL
    // =========================================================================

    #[derive(Debug, Clone)]
    enum Op {
        Event { creator: u64, generation: u64, signature: u8 },
        Window(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0u64..3, 0u64..20, 0u8..3).prop_map(|(creator, generation, signature)| Op::Event {
                creator,
                generation,
                signature,
            }),
            1 => (0u64..20).prop_map(Op::Window),
        ]
    }

    proptest! {
        #[test]
        fn test_matches_set_model(ops in prop::collection::vec(op(), 1..200)) {
            let mut dedup = deduplicator();
            let mut seen: HashSet<(u64, u64, u8)> = HashSet::new();
            let mut threshold = 0u64;

            for op in ops {
                match op {
                    Op::Window(t) => {
                        threshold = t;
                        seen.retain(|&(_, generation, _)| generation >= t);
                        dedup.set_event_window(window(t));
                    }
                    Op::Event { creator, generation, signature } => {
                        let expected = generation >= threshold
                            && seen.insert((creator, generation, signature));
                        let forwarded = dedup
                            .handle_event(event(creator, generation, signature))
                            .is_some();
                        prop_assert_eq!(forwarded, expected);
                    }
                }
            }
        }
    }
}
