//! # Notification Engine Integration Tests
//!
//! Dispatch semantics across the four listener configurations:
//!
//! 1. **Ordered async**: every listener sees creation order even when a
//!    later notification is submitted first
//! 2. **Sync isolation**: one failing listener does not stop the others
//! 3. **Async futures**: dispatch results can be awaited from tokio
//! 4. **Registration**: handles, unregistration and config conflicts

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    use parking_lot::Mutex;
    use shared_bus::{
        ListenerClass, ListenerConfig, ListenerError, Notification, NotificationEngine,
        NotificationError, NotificationMeta,
    };

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    struct RoundDecided {
        meta: NotificationMeta,
        round: u64,
    }

    impl RoundDecided {
        fn new(round: u64) -> Self {
            Self {
                meta: NotificationMeta::new(),
                round,
            }
        }
    }

    impl Notification for RoundDecided {
        fn meta(&self) -> &NotificationMeta {
            &self.meta
        }
    }

    struct OrderedRounds;
    impl ListenerClass for OrderedRounds {
        type Notification = RoundDecided;
        const NAME: &'static str = "ordered_rounds";
    }

    struct SyncRounds;
    impl ListenerClass for SyncRounds {
        type Notification = RoundDecided;
        const NAME: &'static str = "sync_rounds";
    }

    struct UnorderedRounds;
    impl ListenerClass for UnorderedRounds {
        type Notification = RoundDecided;
        const NAME: &'static str = "unordered_rounds";
    }

    fn recording_listener<L: ListenerClass<Notification = RoundDecided>>(
        engine: &NotificationEngine,
        config: ListenerConfig,
    ) -> Arc<Mutex<Vec<u64>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine
            .register::<L, _>(config, move |n: &RoundDecided| -> Result<(), ListenerError> {
                sink.lock().push(n.round);
                Ok(())
            })
            .unwrap();
        seen
    }

    // =========================================================================
    // ORDERING
    // =========================================================================

    #[test]
    fn test_async_ordered_listeners_observe_creation_order() {
        let engine = NotificationEngine::new();
        let first = recording_listener::<OrderedRounds>(&engine, ListenerConfig::ASYNC_ORDERED);
        let second = recording_listener::<OrderedRounds>(&engine, ListenerConfig::ASYNC_ORDERED);
        let dispatcher = engine.dispatcher::<OrderedRounds>().unwrap();

        let n1 = dispatcher.prepare(RoundDecided::new(1));
        let n2 = dispatcher.prepare(RoundDecided::new(2));
        assert_eq!((n1.sequence(), n2.sequence()), (1, 2));

        // N2 is enqueued by one thread before another thread enqueues N1.
        let (tx, rx) = std::sync::mpsc::channel();
        let late = thread::spawn(move || {
            let future = n2.submit();
            tx.send(()).unwrap();
            future.wait().unwrap()
        });
        rx.recv().unwrap();
        let early = thread::spawn(move || n1.submit().wait().unwrap());

        assert_eq!(early.join().unwrap().sequence, 1);
        assert_eq!(late.join().unwrap().sequence, 2);
        assert_eq!(*first.lock(), vec![1, 2]);
        assert_eq!(*second.lock(), vec![1, 2]);
        engine.shutdown();
    }

    #[test]
    fn test_sync_ordered_racing_dispatchers_see_sequence_order() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 50;
        let engine = Arc::new(NotificationEngine::new());
        let sequences = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sequences);
        engine
            .register::<SyncRounds, _>(
                ListenerConfig::SYNC_ORDERED,
                move |n: &RoundDecided| -> Result<(), ListenerError> {
                    sink.lock().push(n.sequence().unwrap_or_default());
                    Ok(())
                },
            )
            .unwrap();

        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let engine = Arc::clone(&engine);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..PER_THREAD {
                        engine
                            .dispatch::<SyncRounds>(RoundDecided::new((t * PER_THREAD + i) as u64))
                            .wait()
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let observed = sequences.lock().clone();
        let expected: Vec<u64> = (1..=(THREADS * PER_THREAD) as u64).collect();
        assert_eq!(observed, expected);
    }

    // =========================================================================
    // FAILURE ISOLATION
    // =========================================================================

    #[test]
    fn test_sync_failure_is_isolated() {
        let engine = NotificationEngine::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        engine
            .register::<SyncRounds, _>(
                ListenerConfig::SYNC_UNORDERED,
                move |_: &RoundDecided| -> Result<(), ListenerError> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            )
            .unwrap();
        let failing = engine
            .register::<SyncRounds, _>(
                ListenerConfig::SYNC_UNORDERED,
                |_: &RoundDecided| -> Result<(), ListenerError> { panic!("listener exploded") },
            )
            .unwrap();
        let counter = Arc::clone(&calls);
        engine
            .register::<SyncRounds, _>(
                ListenerConfig::SYNC_UNORDERED,
                move |_: &RoundDecided| -> Result<(), ListenerError> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            )
            .unwrap();

        let result = engine
            .dispatch::<SyncRounds>(RoundDecided::new(1))
            .wait()
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.failure_count(), 1);
        assert_eq!(result.success_count(), 2);
        assert_eq!(result.failures[0].listener, failing);
        assert!(matches!(result.failures[0].error, ListenerError::Panicked(_)));
    }

    #[test]
    fn test_listener_error_is_reported_not_propagated() {
        let engine = NotificationEngine::new();
        engine
            .register::<UnorderedRounds, _>(
                ListenerConfig::ASYNC_UNORDERED,
                |n: &RoundDecided| -> Result<(), ListenerError> {
                    Err(ListenerError::failed(format!("round {} rejected", n.round)))
                },
            )
            .unwrap();

        let result = engine
            .dispatch::<UnorderedRounds>(RoundDecided::new(9))
            .wait()
            .unwrap();
        assert_eq!(
            result.failures[0].error,
            ListenerError::Failed("round 9 rejected".to_string())
        );
        engine.shutdown();
    }

    // =========================================================================
    // ASYNC FUTURES
    // =========================================================================

    #[tokio::test]
    async fn test_dispatch_future_is_awaitable() {
        let engine = NotificationEngine::new();
        let seen = recording_listener::<UnorderedRounds>(&engine, ListenerConfig::ASYNC_UNORDERED);

        let mut results = Vec::new();
        for round in 1..=3 {
            results.push(engine.dispatch::<UnorderedRounds>(RoundDecided::new(round)));
        }
        for future in results {
            assert!(future.await.unwrap().is_success());
        }

        assert_eq!(*seen.lock(), vec![1, 2, 3]);
        engine.shutdown();
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    #[test]
    fn test_unregister_removes_only_that_listener() {
        let engine = NotificationEngine::new();
        let kept = recording_listener::<SyncRounds>(&engine, ListenerConfig::SYNC_ORDERED);
        let removed_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&removed_calls);
        let id = engine
            .register::<SyncRounds, _>(
                ListenerConfig::SYNC_ORDERED,
                move |_: &RoundDecided| -> Result<(), ListenerError> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            )
            .unwrap();

        assert!(engine.unregister(id));
        assert!(!engine.unregister(id));
        engine.dispatch::<SyncRounds>(RoundDecided::new(4)).wait().unwrap();

        assert_eq!(*kept.lock(), vec![4]);
        assert_eq!(removed_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_conflicting_config_is_rejected() {
        let engine = NotificationEngine::new();
        let _seen = recording_listener::<OrderedRounds>(&engine, ListenerConfig::ASYNC_ORDERED);

        let result = engine.register::<OrderedRounds, _>(
            ListenerConfig::SYNC_UNORDERED,
            |_: &RoundDecided| -> Result<(), ListenerError> { Ok(()) },
        );
        assert!(matches!(
            result,
            Err(NotificationError::ConfigMismatch { class: "ordered_rounds", .. })
        ));
        engine.shutdown();
    }

    #[test]
    fn test_dispatch_without_listeners_is_empty() {
        let engine = NotificationEngine::new();
        let result = engine
            .dispatch::<UnorderedRounds>(RoundDecided::new(1))
            .wait()
            .unwrap();
        assert_eq!(result.listener_count, 0);
        assert!(result.is_success());
    }
}
