//! Shared rayon pool bounded by a backpressure counter.

use super::{Admission, Runner, Task};
use crate::counter::BackpressureCounter;
use crate::error::WiringError;
use rayon::ThreadPool;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

pub(super) struct PooledEngine {
    pool: Arc<ThreadPool>,
    counter: Arc<BackpressureCounter>,
    grace: Duration,
}

impl PooledEngine {
    pub(super) fn new(pool: Arc<ThreadPool>, capacity: usize, grace: Duration) -> Self {
        Self {
            pool,
            counter: Arc::new(BackpressureCounter::new(capacity)),
            grace,
        }
    }

    pub(super) fn submit(
        &self,
        runner: &Arc<Runner>,
        task: Task,
        admission: Admission,
    ) -> Result<(), WiringError> {
        match admission {
            Admission::Put => self.counter.on_ramp().inspect_err(|_| runner.refuse())?,
            Admission::Inject => self.counter.force_on_ramp(),
        }
        self.spawn(runner, task);
        Ok(())
    }

    pub(super) fn try_submit<I>(
        &self,
        runner: &Arc<Runner>,
        item: I,
        wrap: impl FnOnce(I) -> Task,
    ) -> Result<(), I> {
        if !self.counter.attempt_on_ramp() {
            runner.refuse();
            return Err(item);
        }
        self.spawn(runner, wrap(item));
        Ok(())
    }

    fn spawn(&self, runner: &Arc<Runner>, task: Task) {
        runner.admit();
        let runner = Arc::clone(runner);
        let counter = Arc::clone(&self.counter);
        self.pool.spawn(move || {
            runner.run(task);
            counter.off_ramp();
        });
    }

    pub(super) fn flush(&self) -> Result<(), WiringError> {
        self.counter.wait_until_empty()
    }

    /// The pool is shared, so only this scheduler's tasks are waited for.
    pub(super) fn shutdown(&self, runner: &Runner) {
        let deadline = Instant::now() + self.grace;
        while self.counter.count() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        let outstanding = self.counter.count();
        if outstanding > 0 {
            warn!(
                scheduler = %runner.name(),
                outstanding,
                "Pooled tasks still running after grace period"
            );
        }
        self.counter.interrupt();
    }
}
