//! # Wiring Integration Tests
//!
//! Multi-scheduler graphs built on one `WiringModel`:
//!
//! 1. **Composition**: sequential → filter → transformer → pooled → direct
//! 2. **Accounting**: unprocessed counts include queued and in-flight work
//! 3. **Policies**: BYPASS overfills a target that OFFER is refused by
//! 4. **Lifecycle**: squelch, flush and model-wide stop

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use shared_wiring::{
        AdmissionPolicy, DispatchModel, InputWire, OutputWire, PolicyKind, TaskScheduler,
        WiringConfig, WiringError, WiringModel,
    };

    use crate::fixtures::collector;

    const TIMEOUT: Duration = Duration::from_secs(2);

    /// A sequential scheduler whose handler reports each item as started and
    /// then waits for one gate signal.
    struct Gated {
        scheduler: TaskScheduler<u32>,
        input: InputWire<u32, u32>,
        started: mpsc::Receiver<u32>,
        gate: mpsc::Sender<()>,
    }

    fn gated(model: &WiringModel, name: &str, capacity: usize) -> Gated {
        let scheduler: TaskScheduler<u32> = model
            .scheduler_builder(name)
            .with_dispatch(DispatchModel::Sequential)
            .with_capacity(capacity)
            .with_flushing(true)
            .build()
            .unwrap();
        let input = scheduler.build_input_wire::<u32>("items");
        let (started_tx, started) = mpsc::channel();
        let (gate, gate_rx) = mpsc::channel::<()>();
        let started_tx = Mutex::new(started_tx);
        let gate_rx = Mutex::new(gate_rx);
        input
            .bind(move |item| {
                let _ = started_tx.lock().send(item);
                let _ = gate_rx.lock().recv_timeout(TIMEOUT);
                Some(item)
            })
            .unwrap();
        Gated {
            scheduler,
            input,
            started,
            gate,
        }
    }

    #[test]
    fn test_multi_stage_graph_delivers_every_item() {
        let model = WiringModel::new(WiringConfig {
            pool_threads: 4,
            deterministic: false,
        });

        let doubler: TaskScheduler<u64> = model
            .scheduler_builder("doubler")
            .with_flushing(true)
            .build()
            .unwrap();
        let numbers = doubler.build_input_wire::<u32>("numbers");
        numbers.bind(|n| Some(u64::from(n) * 2)).unwrap();

        let formatter: TaskScheduler<String> = model
            .scheduler_builder("formatter")
            .with_dispatch(DispatchModel::Pooled)
            .with_capacity(8)
            .with_flushing(true)
            .build()
            .unwrap();
        let labels = formatter.build_input_wire::<String>("labels");
        labels.bind(|s| Some(s.to_uppercase())).unwrap();

        let (sink, seen) = collector::<String>(&model, "collector");
        doubler
            .output_wire()
            .build_filter("multiples_of_four", |n| n % 4 == 0)
            .build_transformer("label", |n: u64| format!("n{n}"))
            .solder_to(&labels);
        formatter.output_wire().solder_to(&sink);

        for n in 0..100u32 {
            numbers.put(n).unwrap();
        }
        doubler.flush().unwrap();
        formatter.flush().unwrap();

        let mut got = seen.lock().clone();
        got.sort();
        let mut expected: Vec<String> = (0..100u64)
            .map(|n| n * 2)
            .filter(|n| n % 4 == 0)
            .map(|n| format!("N{n}"))
            .collect();
        expected.sort();
        assert_eq!(got, expected);
        assert_eq!(formatter.unprocessed_task_count(), 0);
        model.stop();
    }

    #[test]
    fn test_unprocessed_count_includes_in_flight_task() {
        let model = WiringModel::default();
        let stage = gated(&model, "gated", 8);

        for i in 0..3 {
            stage.input.put(i).unwrap();
        }
        assert_eq!(stage.started.recv_timeout(TIMEOUT).unwrap(), 0);
        assert_eq!(stage.scheduler.unprocessed_task_count(), 3);

        for _ in 0..3 {
            stage.gate.send(()).unwrap();
        }
        stage.scheduler.flush().unwrap();
        assert_eq!(stage.scheduler.unprocessed_task_count(), 0);
        assert_eq!(stage.scheduler.metrics().tasks_handled, 3);
        model.stop();
    }

    #[test]
    fn test_bypass_overfills_while_offer_is_refused() {
        let model = WiringModel::default();
        let stage = gated(&model, "bounded", 1);
        let (sink, seen) = collector::<u32>(&model, "bounded_sink");
        stage.scheduler.output_wire().solder_to(&sink);

        let bypass_source = OutputWire::<u32>::new("bypass_source");
        let bypass = bypass_source.solder(&stage.input, AdmissionPolicy::Bypass);

        let refused = Arc::new(Mutex::new(Vec::new()));
        let offer_source = OutputWire::<u32>::new("offer_source");
        let rejected = Arc::clone(&refused);
        let offer = offer_source.solder(
            &stage.input,
            AdmissionPolicy::offer(move |item| rejected.lock().push(item)),
        );
        assert_eq!(bypass.policy(), PolicyKind::Bypass);
        assert_eq!(offer.policy(), PolicyKind::Offer);

        // First item occupies the worker; the rest pile up past capacity.
        bypass_source.forward(1);
        assert_eq!(stage.started.recv_timeout(TIMEOUT).unwrap(), 1);
        for i in 2..=4 {
            bypass_source.forward(i);
        }
        offer_source.forward(100);

        assert_eq!(bypass.throughput(), 4);
        assert_eq!(offer.rejected(), 1);
        assert_eq!(*refused.lock(), vec![100]);
        assert_eq!(stage.scheduler.metrics().tasks_rejected, 1);

        for _ in 0..4 {
            stage.gate.send(()).unwrap();
        }
        stage.scheduler.flush().unwrap();
        assert_eq!(*seen.lock(), vec![1, 2, 3, 4]);
        model.stop();
    }

    #[test]
    fn test_squelched_stage_consumes_without_output() {
        let model = WiringModel::default();
        let stage: TaskScheduler<u32> = model
            .scheduler_builder("squelchable")
            .with_squelching(true)
            .with_flushing(true)
            .build()
            .unwrap();
        let input = stage.build_input_wire::<u32>("items");
        input.bind(Some).unwrap();
        let (sink, seen) = collector::<u32>(&model, "squelch_sink");
        stage.output_wire().solder_to(&sink);

        stage.start_squelching().unwrap();
        for i in 0..5 {
            input.put(i).unwrap();
        }
        stage.flush().unwrap();
        assert!(seen.lock().is_empty());
        assert_eq!(stage.metrics().squelched_tasks, 5);

        stage.stop_squelching().unwrap();
        input.put(42).unwrap();
        stage.flush().unwrap();
        assert_eq!(*seen.lock(), vec![42]);
        model.stop();
    }

    #[test]
    fn test_flush_requires_opt_in() {
        let model = WiringModel::default();
        let stage: TaskScheduler<()> = model.scheduler_builder("no_flush").build().unwrap();
        assert!(matches!(
            stage.flush(),
            Err(WiringError::FlushingDisabled { .. })
        ));
        model.stop();
    }

    #[test]
    fn test_model_stop_shuts_down_every_scheduler() {
        let model = WiringModel::default();
        let mut inputs = Vec::new();
        for (name, dispatch) in [
            ("first", DispatchModel::Direct),
            ("second", DispatchModel::Sequential),
            ("third", DispatchModel::Pooled),
        ] {
            let scheduler: TaskScheduler<()> = model
                .scheduler_builder(name)
                .with_dispatch(dispatch)
                .build()
                .unwrap();
            let input = scheduler.build_input_wire::<u8>("bytes");
            input.bind_consumer(|_| {}).unwrap();
            inputs.push(input);
        }
        assert_eq!(model.scheduler_names(), vec!["first", "second", "third"]);

        model.stop();
        model.stop();
        for input in &inputs {
            assert!(matches!(input.put(1), Err(WiringError::ShutDown { .. })));
        }
    }

    #[test]
    fn test_deterministic_model_runs_graph_inline() {
        let model = WiringModel::new(WiringConfig {
            pool_threads: 0,
            deterministic: true,
        });
        let stage: TaskScheduler<u32> = model
            .scheduler_builder("inline")
            .with_dispatch(DispatchModel::Pooled)
            .build()
            .unwrap();
        assert_eq!(stage.dispatch_model(), DispatchModel::Direct);

        let input = stage.build_input_wire::<u32>("items");
        input.bind(|n| Some(n + 1)).unwrap();
        let (sink, seen) = collector::<u32>(&model, "inline_sink");
        stage.output_wire().solder_to(&sink);

        for i in 0..10 {
            input.put(i).unwrap();
        }
        assert_eq!(*seen.lock(), (1..=10).collect::<Vec<_>>());
        model.stop();
    }
}
