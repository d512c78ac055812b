//! # Node Pipeline Integration Tests
//!
//! The node-runtime composition end to end:
//!
//! ```text
//! gossip → [event_intake] → [event_deduplicator] → [event_consumer] → sink
//!                                   ▲
//!                     reconnect ────┘ (squelch / clear)
//! ```
//!
//! 1. Duplicate gossip from many peers reaches the sink once
//! 2. Per-peer intake budgets are released for every event
//! 3. Reconnect squelches, then clears, the dedup stage
//! 4. Scheduler and dedup counters reach the Prometheus registry

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use node_runtime::{IntakePipeline, NodeConfig, NodeRuntime};
    use parking_lot::Mutex;
    use shared_types::{AncientMode, EventWindow, NodeId, PlatformEvent};
    use shared_wiring::DispatchModel;

    use crate::fixtures::event;

    fn runtime(config: NodeConfig) -> (NodeRuntime, Arc<Mutex<Vec<PlatformEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let runtime = NodeRuntime::new(config, move |e| sink.lock().push(e)).unwrap();
        (runtime, seen)
    }

    #[test]
    fn test_gossip_from_many_peers_delivered_once() {
        const PEERS: u64 = 5;
        const EVENTS: u64 = 200;
        let (runtime, seen) = runtime(NodeConfig::default());
        let pipeline = Arc::clone(runtime.pipeline());

        let barrier = Arc::new(Barrier::new(PEERS as usize));
        let peers: Vec<_> = (0..PEERS)
            .map(|peer| {
                let pipeline = Arc::clone(&pipeline);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for generation in 0..EVENTS {
                        let gossip = event(generation % 7, generation, 1).with_sender(NodeId(peer));
                        pipeline.submit(gossip).unwrap();
                    }
                })
            })
            .collect();
        for peer in peers {
            peer.join().unwrap();
        }
        pipeline.flush().unwrap();

        let delivered = seen.lock();
        let unique: HashSet<_> = delivered.iter().map(|e| e.descriptor).collect();
        assert_eq!(delivered.len() as u64, EVENTS);
        assert_eq!(unique.len() as u64, EVENTS);
        assert_eq!(pipeline.dedup_metrics().duplicates, (PEERS - 1) * EVENTS);

        for peer in 0..PEERS {
            assert_eq!(pipeline.intake_counter().unprocessed(NodeId(peer)), 0);
        }
        drop(delivered);
        runtime.shutdown();
    }

    #[test]
    fn test_pooled_intake_keeps_dedup_exact() {
        let mut config = NodeConfig::default();
        config.intake.dispatch = DispatchModel::Pooled;
        config.wiring.pool_threads = 4;
        let (runtime, seen) = runtime(config);
        let pipeline = runtime.pipeline();

        for copy in 0..3 {
            pipeline.submit_batch((0..50).map(|g| event(1, g, 1)).collect());
            assert!(pipeline.offer(event(2, copy, 1)).is_ok());
        }
        pipeline.flush().unwrap();

        assert_eq!(seen.lock().len(), 53);
        assert_eq!(pipeline.unprocessed(), 0);
        runtime.shutdown();
    }

    #[test]
    fn test_reconnect_discards_stale_gossip_then_resumes() {
        let (runtime, seen) = runtime(NodeConfig::default());
        let pipeline = Arc::clone(runtime.pipeline());

        for generation in 0..10 {
            pipeline.submit(event(1, generation, 1)).unwrap();
        }
        pipeline.flush().unwrap();
        assert_eq!(seen.lock().len(), 10);

        assert!(runtime.begin_reconnect().unwrap().is_success());
        for generation in 10..20 {
            pipeline.submit(event(1, generation, 1)).unwrap();
        }
        pipeline.flush().unwrap();
        assert_eq!(seen.lock().len(), 10, "squelched stage must not forward");

        let snapshot = EventWindow::new(15, 15, AncientMode::GenerationThreshold);
        assert!(runtime.complete_reconnect(snapshot).unwrap().is_success());
        assert_eq!(pipeline.dedup().scheduler().metrics().squelched_tasks, 10);

        // Generations below the snapshot are ancient; the rest are new again.
        for generation in 10..20 {
            pipeline.submit(event(1, generation, 1)).unwrap();
        }
        pipeline.flush().unwrap();

        let delivered: Vec<u64> = seen.lock()[10..]
            .iter()
            .map(|e| e.descriptor.generation)
            .collect();
        assert_eq!(delivered, vec![15, 16, 17, 18, 19]);
        runtime.shutdown();
    }

    #[test]
    fn test_metrics_reach_prometheus() {
        quantum_telemetry::register_metrics().unwrap();
        let (runtime, _seen) = runtime(NodeConfig::default());
        let pipeline = runtime.pipeline();

        pipeline.submit(event(1, 1, 1)).unwrap();
        pipeline.submit(event(1, 1, 1)).unwrap();
        pipeline.flush().unwrap();
        pipeline.publish_metrics();

        let text = quantum_telemetry::encode_metrics().unwrap();
        assert!(text.contains("qc_dedup_duplicates_total"));
        assert!(text.contains(r#"qc_wiring_tasks_handled{scheduler="event_intake"}"#));
        assert!(text.contains(r#"scheduler="event_deduplicator""#));
        runtime.shutdown();
    }

    #[test]
    fn test_deterministic_pipeline_from_env() {
        let config = NodeConfig::from_lookup(|key| match key {
            "QC_DETERMINISTIC" => Some("true".to_string()),
            "QC_DEDUP_CAPACITY" => Some("16".to_string()),
            _ => None,
        });
        let seen = Arc::new(Mutex::new(0u64));
        let sink = Arc::clone(&seen);
        let pipeline = IntakePipeline::build(&config, move |_| *sink.lock() += 1).unwrap();

        for generation in 0..32 {
            pipeline.submit(event(3, generation, 1)).unwrap();
            pipeline.submit(event(3, generation, 1)).unwrap();
        }
        // Direct stages: no flush needed.
        assert_eq!(*seen.lock(), 32);
        pipeline.shutdown();
    }
}
