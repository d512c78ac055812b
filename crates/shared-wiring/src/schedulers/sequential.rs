//! Single dedicated worker thread draining a backpressure queue.

use super::{Admission, Runner, Task};
use crate::error::WiringError;
use crate::queue::BackpressureQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

pub(super) enum WorkItem {
    Run(Task),
    Barrier(oneshot::Sender<()>),
    Stop,
}

pub(super) struct SequentialEngine {
    queue: Arc<BackpressureQueue<WorkItem>>,
    halted: Arc<AtomicBool>,
    /// Set once shutdown has discarded the queue for the last time. Work
    /// enqueued afterwards has no worker and is reclaimed by its producer.
    drained: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    grace: Duration,
}

impl SequentialEngine {
    pub(super) fn start(
        runner: Arc<Runner>,
        capacity: usize,
        grace: Duration,
    ) -> Result<Self, WiringError> {
        let queue = Arc::new(BackpressureQueue::new(capacity));
        let halted = Arc::new(AtomicBool::new(false));

        let worker = {
            let queue = Arc::clone(&queue);
            let halted = Arc::clone(&halted);
            thread::Builder::new()
                .name(format!("sched-{}", runner.name()))
                .spawn(move || worker_loop(&runner, &queue, &halted))
                .map_err(|e| WiringError::ThreadSpawn(e.to_string()))?
        };

        Ok(Self {
            queue,
            halted,
            drained: AtomicBool::new(false),
            worker: Mutex::new(Some(worker)),
            grace,
        })
    }

    pub(super) fn submit(
        &self,
        runner: &Runner,
        task: Task,
        admission: Admission,
    ) -> Result<(), WiringError> {
        match admission {
            Admission::Put => {
                let slot = self.queue.reserve().inspect_err(|_| runner.refuse())?;
                runner.admit();
                slot.fill(WorkItem::Run(task));
            }
            Admission::Inject => {
                runner.admit();
                self.queue.bypass_backpressure(WorkItem::Run(task));
            }
        }
        if self.reclaim_late(runner) {
            return Err(WiringError::ShutDown {
                scheduler: runner.name().to_string(),
            });
        }
        Ok(())
    }

    pub(super) fn try_submit<I>(
        &self,
        runner: &Runner,
        item: I,
        wrap: impl FnOnce(I) -> Task,
    ) -> Result<(), I> {
        match self.queue.try_reserve() {
            Some(slot) => {
                runner.admit();
                slot.fill(WorkItem::Run(wrap(item)));
                // A reclaimed task is dropped like any task queued at shutdown.
                self.reclaim_late(runner);
                Ok(())
            }
            None => {
                runner.refuse();
                Err(item)
            }
        }
    }

    /// Queue a barrier behind all current work and wait for the worker to
    /// reach it.
    pub(super) fn flush(&self, runner: &Runner) -> Result<(), WiringError> {
        let (done, barrier) = oneshot::channel();
        self.queue.put(WorkItem::Barrier(done))?;
        self.reclaim_late(runner);
        barrier.blocking_recv().map_err(|_| WiringError::ShutDown {
            scheduler: runner.name().to_string(),
        })
    }

    /// Let the worker drain for up to the grace period, then halt it and
    /// discard whatever is still queued.
    pub(super) fn shutdown(&self, runner: &Runner) {
        self.queue.bypass_backpressure(WorkItem::Stop);
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        let deadline = Instant::now() + self.grace;
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        if !worker.is_finished() {
            self.halted.store(true, Ordering::Release);
            let dropped = self.discard_queued(runner);
            warn!(
                scheduler = %runner.name(),
                dropped,
                "Worker did not drain within grace period, interrupting"
            );
            self.queue.bypass_backpressure(WorkItem::Stop);
            self.queue.interrupt();
        }

        if worker.join().is_err() {
            error!(scheduler = %runner.name(), "Worker thread terminated abnormally");
        }

        // Producers still blocked on a full queue must not wait forever.
        self.drained.store(true, Ordering::SeqCst);
        self.discard_queued(runner);
        self.queue.interrupt();
    }

    /// Discard work that raced past the stopped check and landed after the
    /// final drain. Returns whether the queue had already been drained.
    fn reclaim_late(&self, runner: &Runner) -> bool {
        if !self.drained.load(Ordering::SeqCst) {
            return false;
        }
        let dropped = self.discard_queued(runner);
        if dropped > 0 {
            debug!(scheduler = %runner.name(), dropped, "Reclaimed work enqueued after shutdown");
        }
        true
    }

    /// Ask a detached worker to exit once it has drained its queue.
    pub(super) fn release_worker(&self) {
        if self.worker.lock().take().is_some() {
            self.queue.bypass_backpressure(WorkItem::Stop);
        }
    }

    fn discard_queued(&self, runner: &Runner) -> usize {
        self.queue
            .drain()
            .into_iter()
            .filter(|item| matches!(item, WorkItem::Run(_)))
            .inspect(|_| runner.discard())
            .count()
    }
}

fn worker_loop(runner: &Runner, queue: &BackpressureQueue<WorkItem>, halted: &AtomicBool) {
    debug!(scheduler = %runner.name(), "Worker started");
    loop {
        match queue.take() {
            Ok(WorkItem::Run(task)) => runner.run(task),
            Ok(WorkItem::Barrier(done)) => {
                let _ = done.send(());
            }
            Ok(WorkItem::Stop) => break,
            Err(_) if halted.load(Ordering::Acquire) => break,
            Err(_) => continue,
        }
        if halted.load(Ordering::Acquire) {
            break;
        }
    }
    debug!(scheduler = %runner.name(), "Worker exited");
}
