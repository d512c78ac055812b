//! # Async Event Deduplicator
//!
//! Runs an [`EventDeduplicator`] on one dedicated worker thread. Events,
//! window updates, clears and flush barriers share a single queue, so the
//! worker applies them in exactly the order they were enqueued. Forwarded
//! events are published on the wrapper's output wire.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use shared_types::{EventWindow, PlatformEvent};
use shared_wiring::{BackpressureQueue, OutputWire};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::domain::DedupConfig;
use crate::error::DedupError;
use crate::metrics::{DedupMetrics, DedupMetricsSnapshot};
use crate::ports::EventDeduplicationApi;
use crate::service::EventDeduplicator;

const OUTPUT_NAME: &str = "event_deduplicator";

enum DedupMessage {
    Event(PlatformEvent),
    Window(EventWindow),
    Clear,
    Flush(oneshot::Sender<()>),
    Stop,
}

pub struct AsyncEventDeduplicator {
    queue: Arc<BackpressureQueue<DedupMessage>>,
    output: OutputWire<PlatformEvent>,
    metrics: Arc<DedupMetrics>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl AsyncEventDeduplicator {
    /// Start a worker thread owning `deduplicator`.
    ///
    /// # Errors
    ///
    /// - [`DedupError::InvalidConfig`] if `config` does not validate
    /// - [`DedupError::ShutDown`] if the worker thread cannot be spawned
    pub fn spawn(
        config: &DedupConfig,
        deduplicator: EventDeduplicator,
    ) -> Result<Self, DedupError> {
        config.validate()?;
        let queue = Arc::new(BackpressureQueue::new(config.queue_capacity));
        let output = OutputWire::new(OUTPUT_NAME);
        let metrics = deduplicator.metrics_handle();

        let worker = {
            let queue = Arc::clone(&queue);
            let output = output.clone();
            thread::Builder::new()
                .name("event-dedup".to_string())
                .spawn(move || worker_loop(deduplicator, &queue, &output))
                .map_err(|e| {
                    error!(error = %e, "Failed to spawn deduplicator worker");
                    DedupError::ShutDown
                })?
        };
        info!(capacity = config.queue_capacity, "Async deduplicator started");

        Ok(Self {
            queue,
            output,
            metrics,
            worker: Mutex::new(Some(worker)),
            stopped: AtomicBool::new(false),
        })
    }

    /// Wire carrying every event the deduplicator forwards.
    pub fn output_wire(&self) -> &OutputWire<PlatformEvent> {
        &self.output
    }

    fn enqueue(&self, message: DedupMessage) -> Result<(), DedupError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(DedupError::ShutDown);
        }
        Ok(self.queue.put(message)?)
    }

    /// Enqueue an event, blocking while the queue is full.
    pub fn put_event(&self, event: PlatformEvent) -> Result<(), DedupError> {
        self.enqueue(DedupMessage::Event(event))
    }

    /// Enqueue an event if there is room; otherwise hand it back.
    pub fn offer_event(&self, event: PlatformEvent) -> Result<(), PlatformEvent> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(event);
        }
        match self.queue.try_reserve() {
            Some(slot) => {
                slot.fill(DedupMessage::Event(event));
                Ok(())
            }
            None => Err(event),
        }
    }

    /// Enqueue a window update behind all previously enqueued events.
    pub fn set_event_window(&self, window: EventWindow) -> Result<(), DedupError> {
        self.enqueue(DedupMessage::Window(window))
    }

    /// Enqueue a clear behind all previously enqueued events.
    pub fn clear(&self) -> Result<(), DedupError> {
        self.enqueue(DedupMessage::Clear)
    }

    /// Block until everything enqueued before this call has been applied.
    ///
    /// Must not be called from inside an async runtime.
    ///
    /// # Errors
    ///
    /// [`DedupError::ShutDown`] if the wrapper stops before the barrier is
    /// reached.
    pub fn flush(&self) -> Result<(), DedupError> {
        let (done, barrier) = oneshot::channel();
        self.enqueue(DedupMessage::Flush(done))?;
        barrier.blocking_recv().map_err(|_| DedupError::ShutDown)
    }

    /// Messages waiting for the worker.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics(&self) -> DedupMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Apply everything already queued, then stop the worker. Idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.bypass_backpressure(DedupMessage::Stop);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("Deduplicator worker terminated abnormally");
            }
        }
        // Pending flushes resolve as shut down, blocked producers are released.
        let dropped = self.queue.drain().len();
        self.queue.interrupt();
        info!(dropped, "Async deduplicator stopped");
    }
}

impl Drop for AsyncEventDeduplicator {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for AsyncEventDeduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncEventDeduplicator")
            .field("queued", &self.queue.len())
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish()
    }
}

fn worker_loop(
    mut deduplicator: EventDeduplicator,
    queue: &BackpressureQueue<DedupMessage>,
    output: &OutputWire<PlatformEvent>,
) {
    debug!("Deduplicator worker started");
    loop {
        match queue.take() {
            Ok(DedupMessage::Event(event)) => {
                if let Some(event) = deduplicator.handle_event(event) {
                    output.forward(event);
                }
            }
            Ok(DedupMessage::Window(window)) => deduplicator.set_event_window(window),
            Ok(DedupMessage::Clear) => deduplicator.clear(),
            Ok(DedupMessage::Flush(done)) => {
                let _ = done.send(());
            }
            Ok(DedupMessage::Stop) | Err(_) => break,
        }
    }
    debug!("Deduplicator worker exited");
}
