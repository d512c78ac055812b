//! # Dispatcher
//!
//! Fan-out for a single listener class.
//!
//! ## Sequencing
//!
//! Every dispatch draws a ticket from the dispatcher's counter and stamps
//! it onto the notification (once; an already stamped notification keeps
//! its sequence). For `ASYNC` + `ORDERED` classes the worker parks
//! incoming notifications in a min-heap keyed by ticket and releases them
//! only when the next expected ticket is present, so listeners observe
//! creation order even when producers race to enqueue. A prepared dispatch
//! that is dropped without being submitted releases its ticket so the
//! stream does not stall.
//!
//! For `SYNC` + `ORDERED` classes ticket assignment and delivery happen
//! under one lock. A listener of such a class that dispatches to its own
//! class from inside `notify` would wait on that lock forever, so the
//! nested dispatch fails with [`NotificationError::Reentrant`] instead.

use crate::error::{ListenerError, NotificationError};
use crate::listener::Listener;
use crate::notification::{ListenerConfig, ListenerId, Notification};
use parking_lot::{Mutex, MutexGuard, RwLock};
use shared_wiring::BackpressureQueue;
use std::any::Any;
use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, error, warn};

type ListenerList<N> = Arc<Vec<(ListenerId, Arc<dyn Listener<N>>)>>;
type Completion = Result<DispatchResult, NotificationError>;

/// One listener's failure for one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    pub listener: ListenerId,
    pub error: ListenerError,
}

/// Aggregate outcome of delivering one notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchResult {
    /// Sequence stamped on the notification, `0` if it was never stamped.
    pub sequence: u64,
    /// Listeners registered when the notification was delivered.
    pub listener_count: usize,
    pub failures: Vec<ListenerFailure>,
}

impl DispatchResult {
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.listener_count.saturating_sub(self.failures.len())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Completes once every listener has been invoked for a notification.
///
/// Await it from async code, or call [`DispatchFuture::wait`] from a plain
/// thread.
pub struct DispatchFuture {
    class: &'static str,
    rx: oneshot::Receiver<Completion>,
}

impl DispatchFuture {
    pub(crate) fn ready(class: &'static str, result: DispatchResult) -> Self {
        Self::completed(class, Ok(result))
    }

    pub(crate) fn failed(class: &'static str, error: NotificationError) -> Self {
        Self::completed(class, Err(error))
    }

    fn completed(class: &'static str, completion: Completion) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(completion);
        Self { class, rx }
    }

    fn closed(class: &'static str) -> Self {
        let (_, rx) = oneshot::channel();
        Self { class, rx }
    }

    /// Block the current thread until delivery completes.
    ///
    /// Must not be called from within an async runtime.
    ///
    /// # Errors
    ///
    /// - [`NotificationError::ShutDown`] if the dispatcher stopped before
    ///   delivering
    /// - [`NotificationError::Reentrant`] if a `SYNC` + `ORDERED` listener
    ///   dispatched to its own class
    pub fn wait(self) -> Result<DispatchResult, NotificationError> {
        let class = self.class;
        self.rx
            .blocking_recv()
            .unwrap_or(Err(NotificationError::ShutDown { class }))
    }

    /// The result, if delivery has already completed.
    pub fn try_result(&mut self) -> Option<Result<DispatchResult, NotificationError>> {
        match self.rx.try_recv() {
            Ok(completion) => Some(completion),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                Some(Err(NotificationError::ShutDown { class: self.class }))
            }
        }
    }
}

impl Future for DispatchFuture {
    type Output = Result<DispatchResult, NotificationError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let class = self.class;
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|completion| completion.unwrap_or(Err(NotificationError::ShutDown { class })))
    }
}

impl fmt::Debug for DispatchFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchFuture").field("class", &self.class).finish()
    }
}

enum Message<N> {
    Deliver {
        ticket: u64,
        notification: Arc<N>,
        done: oneshot::Sender<Completion>,
    },
    Skip {
        ticket: u64,
    },
    Stop,
}

struct Parked<N> {
    ticket: u64,
    payload: Option<(Arc<N>, oneshot::Sender<Completion>)>,
}

impl<N> PartialEq for Parked<N> {
    fn eq(&self, other: &Self) -> bool {
        self.ticket == other.ticket
    }
}

impl<N> Eq for Parked<N> {}

impl<N> PartialOrd for Parked<N> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl<N> Ord for Parked<N> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.ticket.cmp(&other.ticket)
    }
}

struct DispatcherInner<N> {
    class: &'static str,
    config: ListenerConfig,
    listeners: RwLock<ListenerList<N>>,
    next_ticket: AtomicU64,
    sync_order: Mutex<()>,
    /// Thread currently delivering under `sync_order`.
    sync_owner: Mutex<Option<ThreadId>>,
    /// Guards the hand-off to the worker against a concurrent shutdown.
    open: RwLock<bool>,
    queue: BackpressureQueue<Message<N>>,
}

impl<N: Notification> DispatcherInner<N> {
    fn is_open(&self) -> bool {
        *self.open.read()
    }

    fn take_ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::AcqRel)
    }

    /// Serialize a `SYNC` delivery when the class is ordered. `None` for
    /// unordered classes.
    fn order_sync(&self) -> Result<Option<SyncOrderGuard<'_>>, NotificationError> {
        if !self.config.is_ordered() {
            return Ok(None);
        }
        let current = thread::current().id();
        if *self.sync_owner.lock() == Some(current) {
            error!(class = self.class, "Listener dispatched to its own ordered class");
            return Err(NotificationError::Reentrant { class: self.class });
        }
        let lock = self.sync_order.lock();
        *self.sync_owner.lock() = Some(current);
        Ok(Some(SyncOrderGuard {
            owner: &self.sync_owner,
            _lock: lock,
        }))
    }

    fn deliver(&self, notification: &N) -> DispatchResult {
        let sequence = notification.sequence().unwrap_or_default();
        let listeners = Arc::clone(&self.listeners.read());
        let mut failures = Vec::new();

        for (id, listener) in listeners.iter() {
            let error = match catch_unwind(AssertUnwindSafe(|| listener.notify(notification))) {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error,
                Err(payload) => ListenerError::Panicked(panic_message(payload.as_ref())),
            };
            warn!(
                class = self.class,
                listener = %id,
                sequence,
                error = %error,
                "Listener failed"
            );
            failures.push(ListenerFailure {
                listener: *id,
                error,
            });
        }

        DispatchResult {
            sequence,
            listener_count: listeners.len(),
            failures,
        }
    }

    fn deliver_now(&self, notification: &N) -> DispatchFuture {
        if !self.is_open() {
            return DispatchFuture::closed(self.class);
        }
        DispatchFuture::ready(self.class, self.deliver(notification))
    }

    fn submit(&self, ticket: u64, notification: Arc<N>) -> DispatchFuture {
        if !self.config.is_async() {
            return match self.order_sync() {
                Ok(_order) => self.deliver_now(&notification),
                Err(e) => DispatchFuture::failed(self.class, e),
            };
        }

        let open = self.open.read();
        if !*open {
            return DispatchFuture::closed(self.class);
        }
        let (done, rx) = oneshot::channel();
        self.queue.bypass_backpressure(Message::Deliver {
            ticket,
            notification,
            done,
        });
        DispatchFuture {
            class: self.class,
            rx,
        }
    }

    fn skip(&self, ticket: u64) {
        if !(self.config.is_async() && self.config.is_ordered()) {
            return;
        }
        let open = self.open.read();
        if *open {
            self.queue.bypass_backpressure(Message::Skip { ticket });
        }
    }
}

/// Clears the owner before the ordering lock is released.
struct SyncOrderGuard<'a> {
    owner: &'a Mutex<Option<ThreadId>>,
    _lock: MutexGuard<'a, ()>,
}

impl Drop for SyncOrderGuard<'_> {
    fn drop(&mut self) {
        *self.owner.lock() = None;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn run_worker<N: Notification>(inner: &DispatcherInner<N>) {
    let ordered = inner.config.is_ordered();
    let mut parked: BinaryHeap<Reverse<Parked<N>>> = BinaryHeap::new();
    let mut next_expected = 1u64;

    let release = |parked: Parked<N>| {
        if let Some((notification, done)) = parked.payload {
            let _ = done.send(Ok(inner.deliver(&notification)));
        }
    };

    loop {
        let Ok(message) = inner.queue.take() else {
            break;
        };
        match message {
            Message::Deliver {
                ticket,
                notification,
                done,
            } => {
                if ordered {
                    parked.push(Reverse(Parked {
                        ticket,
                        payload: Some((notification, done)),
                    }));
                } else {
                    let _ = done.send(Ok(inner.deliver(&notification)));
                }
            }
            Message::Skip { ticket } => parked.push(Reverse(Parked {
                ticket,
                payload: None,
            })),
            Message::Stop => break,
        }

        while parked
            .peek()
            .is_some_and(|Reverse(next)| next.ticket <= next_expected)
        {
            if let Some(Reverse(next)) = parked.pop() {
                next_expected = next_expected.max(next.ticket + 1);
                release(next);
            }
        }
    }

    if !parked.is_empty() {
        debug!(
            class = inner.class,
            parked = parked.len(),
            "Releasing parked notifications at shutdown"
        );
    }
    while let Some(Reverse(next)) = parked.pop() {
        release(next);
    }
}

/// A dispatch whose sequence is fixed but which has not been handed to
/// the listeners yet.
///
/// Dropping it without calling [`PendingDispatch::submit`] gives up its
/// place in the order.
pub struct PendingDispatch<N: Notification> {
    inner: Arc<DispatcherInner<N>>,
    ticket: u64,
    notification: Option<Arc<N>>,
}

impl<N: Notification> PendingDispatch<N> {
    /// Sequence stamped on the notification.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.notification
            .as_ref()
            .and_then(|n| n.sequence())
            .unwrap_or(self.ticket)
    }

    pub fn submit(mut self) -> DispatchFuture {
        match self.notification.take() {
            Some(notification) => self.inner.submit(self.ticket, notification),
            None => DispatchFuture::closed(self.inner.class),
        }
    }
}

impl<N: Notification> Drop for PendingDispatch<N> {
    fn drop(&mut self) {
        if self.notification.is_some() {
            self.inner.skip(self.ticket);
        }
    }
}

/// Listener list, sequence counter and (for `ASYNC`) worker thread of one
/// listener class.
pub struct Dispatcher<N: Notification> {
    inner: Arc<DispatcherInner<N>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<N: Notification> Dispatcher<N> {
    /// # Errors
    ///
    /// [`NotificationError::WorkerSpawn`] if an async worker cannot start.
    pub fn new(class: &'static str, config: ListenerConfig) -> Result<Self, NotificationError> {
        let inner = Arc::new(DispatcherInner {
            class,
            config,
            listeners: RwLock::new(Arc::new(Vec::new())),
            next_ticket: AtomicU64::new(1),
            sync_order: Mutex::new(()),
            sync_owner: Mutex::new(None),
            open: RwLock::new(true),
            queue: BackpressureQueue::unbounded(),
        });

        let worker = if config.is_async() {
            let worker_inner = Arc::clone(&inner);
            let handle = thread::Builder::new()
                .name(format!("notify-{class}"))
                .spawn(move || run_worker(&worker_inner))
                .map_err(|e| NotificationError::WorkerSpawn {
                    class,
                    reason: e.to_string(),
                })?;
            Some(handle)
        } else {
            None
        };

        debug!(class, config = ?config, "Dispatcher created");
        Ok(Self {
            inner,
            worker: Mutex::new(worker),
        })
    }

    #[must_use]
    pub fn class(&self) -> &'static str {
        self.inner.class
    }

    #[must_use]
    pub fn config(&self) -> ListenerConfig {
        self.inner.config
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    pub(crate) fn add_listener(&self, id: ListenerId, listener: Arc<dyn Listener<N>>) {
        let mut listeners = self.inner.listeners.write();
        let mut next: Vec<_> = listeners.iter().cloned().collect();
        next.push((id, listener));
        *listeners = Arc::new(next);
    }

    /// Remove one listener. Returns whether it was registered here.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.write();
        if !listeners.iter().any(|(existing, _)| *existing == id) {
            return false;
        }
        let next: Vec<_> = listeners
            .iter()
            .filter(|(existing, _)| *existing != id)
            .cloned()
            .collect();
        *listeners = Arc::new(next);
        true
    }

    /// Remove every listener. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut listeners = self.inner.listeners.write();
        let removed = listeners.len();
        *listeners = Arc::new(Vec::new());
        removed
    }

    /// Stamp the notification and deliver it according to the class's
    /// configuration.
    pub fn dispatch(&self, notification: N) -> DispatchFuture {
        if self.inner.config.is_async() {
            return self.prepare(notification).submit();
        }
        let _order = match self.inner.order_sync() {
            Ok(order) => order,
            Err(e) => return DispatchFuture::failed(self.inner.class, e),
        };
        let ticket = self.inner.take_ticket();
        notification.meta().stamp(ticket);
        self.inner.deliver_now(&notification)
    }

    /// Stamp the notification now and deliver it later.
    pub fn prepare(&self, notification: N) -> PendingDispatch<N> {
        let ticket = self.inner.take_ticket();
        notification.meta().stamp(ticket);
        PendingDispatch {
            inner: Arc::clone(&self.inner),
            ticket,
            notification: Some(Arc::new(notification)),
        }
    }

    /// Deliver everything already queued, then stop the worker. Later
    /// dispatches resolve to [`NotificationError::ShutDown`]. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut open = self.inner.open.write();
            if !*open {
                return;
            }
            *open = false;
            if self.inner.config.is_async() {
                self.inner.queue.bypass_backpressure(Message::Stop);
            }
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!(class = self.inner.class, "Dispatcher worker terminated abnormally");
            }
        }
        self.inner.queue.drain();
        debug!(class = self.inner.class, "Dispatcher shut down");
    }
}

impl<N: Notification> Drop for Dispatcher<N> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<N: Notification> fmt::Debug for Dispatcher<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("class", &self.inner.class)
            .field("config", &self.inner.config)
            .field("listeners", &self.listener_count())
            .finish()
    }
}
