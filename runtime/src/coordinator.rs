//! Keyed FIFO coordinator.
//!
//! Every mutating operation is submitted under a resource key. Operations
//! that share a key run one at a time, strictly in submission order;
//! operations on different keys run in parallel. There is no global lock:
//! each key owns a *lane* (a queue plus at most one live worker task) that
//! exists only while it has work.
//!
//! ```text
//!  submit(k1, op) ─┐
//!  submit(k1, op) ─┼─► lane k1: [op, op, op] ─► worker (context A)
//!  submit(k1, op) ─┘
//!  submit(k2, op) ───► lane k2: [op]         ─► worker (context B)
//! ```
//!
//! # Placement
//!
//! Lanes are placed on [`ExecutionContext`]s (tokio runtime handles) by
//! rendezvous hashing of the key over the current membership. When the
//! membership changes, lanes whose placement moved are *relocated*: the old
//! worker finishes the operation it is running and retires, and the new
//! worker takes over the remaining queue only after that. At no point do two
//! workers run operations for the same key.
//!
//! Operations are expected to load whatever state they need from durable
//! storage when they start, so a queued operation behaves the same no
//! matter which context ends up running it.
//!
//! # Cancellation and timeouts
//!
//! A [`Ticket`] can cancel its operation while it is still queued; dropping
//! an unfinished ticket does the same. Once an operation has started it
//! always runs to completion. The optional maximum queue wait only bounds
//! the time spent queued.

use crate::error::CoordinatorError;
use crate::health::HealthCheck;
use crate::metrics::CoordinatorMetrics;
use futures::FutureExt;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt::{self, Display};
use std::future::Future;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{Notify, oneshot};

/// Bounds required of a resource key.
pub trait LaneKey: Clone + Eq + Hash + Display + Send + Sync + 'static {}

impl<T> LaneKey for T where T: Clone + Eq + Hash + Display + Send + Sync + 'static {}

/// Configuration for [`Coordinator`] instances
///
/// # Example
///
/// ```
/// use hotel_ops_runtime::CoordinatorConfig;
/// use std::time::Duration;
///
/// let config = CoordinatorConfig::default()
///     .with_max_queue_wait(Duration::from_secs(2))
///     .with_degraded_queue_depth(64);
/// assert_eq!(config.max_queue_wait, Some(Duration::from_secs(2)));
/// ```
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Longest time an operation may stay queued before it is dropped
    /// with [`CoordinatorError::QueueTimeout`]. `None` waits forever.
    pub max_queue_wait: Option<Duration>,
    /// Default timeout for graceful shutdown
    pub shutdown_timeout: Duration,
    /// Queue depth at which [`Coordinator::health`] reports degraded
    pub degraded_queue_depth: usize,
}

impl CoordinatorConfig {
    /// Set the maximum queue wait
    #[must_use]
    pub const fn with_max_queue_wait(mut self, wait: Duration) -> Self {
        self.max_queue_wait = Some(wait);
        self
    }

    /// Let operations wait in their queue indefinitely
    #[must_use]
    pub const fn without_queue_wait_limit(mut self) -> Self {
        self.max_queue_wait = None;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the queue depth at which health turns degraded
    #[must_use]
    pub const fn with_degraded_queue_depth(mut self, depth: usize) -> Self {
        self.degraded_queue_depth = depth;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_queue_wait: Some(Duration::from_secs(5)),
            shutdown_timeout: Duration::from_secs(30),
            degraded_queue_depth: 256,
        }
    }
}

/// A place where lane workers run.
///
/// Each context wraps a tokio runtime handle and a stable identifier used
/// for placement.
#[derive(Clone)]
pub struct ExecutionContext {
    id: String,
    handle: Handle,
}

impl ExecutionContext {
    /// Create a context from an id and a runtime handle.
    #[must_use]
    pub fn new(id: impl Into<String>, handle: Handle) -> Self {
        Self { id: id.into(), handle }
    }

    /// Create a context on the runtime the caller is running on.
    ///
    /// Returns `None` outside of a tokio runtime.
    #[must_use]
    pub fn current(id: impl Into<String>) -> Option<Self> {
        Handle::try_current().ok().map(|handle| Self::new(id, handle))
    }

    /// The context identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Counters describing coordinator activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Operations accepted into a queue
    pub submitted: u64,
    /// Operations that started running
    pub started: u64,
    /// Operations that finished running (including panics)
    pub completed: u64,
    /// Operations dropped after exceeding the maximum queue wait
    pub timed_out: u64,
    /// Operations cancelled by their caller while queued
    pub cancelled: u64,
    /// Operations that panicked
    pub panicked: u64,
    /// Lane relocations
    pub relocations: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    started: AtomicU64,
    completed: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,
    panicked: AtomicU64,
    relocations: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            relocations: self.relocations.load(Ordering::Relaxed),
        }
    }
}

type Job = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

struct QueuedJob {
    id: u64,
    enqueued_at: Instant,
    run: Job,
}

struct LaneState {
    queue: VecDeque<QueuedJob>,
    /// Id of the operation currently running, from any generation.
    running: Option<u64>,
    /// Bumped on relocation; workers of older generations retire.
    generation: u64,
    /// Whether a worker of the current generation is alive.
    worker_active: bool,
    context: Option<ExecutionContext>,
}

struct Lane {
    state: Mutex<LaneState>,
    idle: Notify,
}

impl Lane {
    fn new(context: Option<ExecutionContext>) -> Self {
        Self {
            state: Mutex::new(LaneState {
                queue: VecDeque::new(),
                running: None,
                generation: 0,
                worker_active: false,
                context,
            }),
            idle: Notify::new(),
        }
    }
}

struct Inner<K> {
    config: CoordinatorConfig,
    lanes: Mutex<HashMap<K, Arc<Lane>>>,
    membership: RwLock<Vec<ExecutionContext>>,
    next_job: AtomicU64,
    shutting_down: AtomicBool,
    counters: Counters,
}

// Critical sections below never panic, so a poisoned lock still guards
// consistent data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keyed FIFO coordinator.
///
/// Cheap to clone; clones share lanes, membership and counters.
pub struct Coordinator<K> {
    inner: Arc<Inner<K>>,
}

impl<K> Clone for Coordinator<K> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K: LaneKey> Coordinator<K> {
    /// Create a coordinator whose lanes run on the caller's runtime.
    #[must_use]
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_membership(config, Vec::new())
    }

    /// Create a coordinator that places lanes over `contexts`.
    ///
    /// With an empty membership, workers are spawned on whichever runtime
    /// submits the operation.
    #[must_use]
    pub fn with_membership(config: CoordinatorConfig, contexts: Vec<ExecutionContext>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                lanes: Mutex::new(HashMap::new()),
                membership: RwLock::new(contexts),
                next_job: AtomicU64::new(1),
                shutting_down: AtomicBool::new(false),
                counters: Counters::default(),
            }),
        }
    }

    /// The configuration this coordinator was built with.
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Queue `operation` behind every earlier operation on `key`.
    ///
    /// Must be called from within a tokio runtime when the membership is
    /// empty, like `tokio::spawn`.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::ShuttingDown`] once shutdown has begun.
    pub fn submit<T, F, Fut>(&self, key: K, operation: F) -> Result<Ticket<K, T>, CoordinatorError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Err(CoordinatorError::ShuttingDown);
        }

        let job_id = self.inner.next_job.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let run: Job = Box::new(move || {
            Box::pin(async move {
                let outcome = AssertUnwindSafe(async move { operation().await })
                    .catch_unwind()
                    .await;
                let result = outcome.map_err(|payload| {
                    Counters::bump(&inner.counters.panicked);
                    CoordinatorMetrics::record_panic();
                    let message = panic_message(&*payload);
                    tracing::error!(job_id, panic = %message, "Operation panicked");
                    CoordinatorError::OperationPanicked(message)
                });
                // The caller may have stopped waiting; the outcome is then unobserved.
                let _ = sender.send(result);
            })
        });

        let lane = {
            let mut lanes = lock(&self.inner.lanes);
            let lane = match lanes.get(&key) {
                Some(lane) => Arc::clone(lane),
                None => {
                    let lane = Arc::new(Lane::new(self.place(&key)));
                    lanes.insert(key.clone(), Arc::clone(&lane));
                    CoordinatorMetrics::record_active_lanes(lanes.len());
                    lane
                },
            };
            let mut state = lock(&lane.state);
            state.queue.push_back(QueuedJob { id: job_id, enqueued_at: Instant::now(), run });
            CoordinatorMetrics::record_queue_depth(state.queue.len());
            if !state.worker_active {
                state.worker_active = true;
                self.spawn_worker(&key, &lane, state.generation, state.context.clone());
            }
            drop(state);
            lane
        };

        Counters::bump(&self.inner.counters.submitted);
        CoordinatorMetrics::record_submitted();
        tracing::debug!(key = %key, job_id, "Operation queued");

        Ok(Ticket {
            key,
            job_id,
            lane,
            receiver: Some(receiver),
            submitted_at: Instant::now(),
            max_wait: self.inner.config.max_queue_wait,
            cancelled: false,
            counters: Arc::clone(&self.inner) as Arc<dyn CounterSink>,
        })
    }

    /// Submit `operation` under `key` and wait for its result.
    ///
    /// # Errors
    ///
    /// Returns a [`CoordinatorError`] if the operation could not be queued,
    /// timed out while queued, or panicked.
    pub async fn execute<T, F, Fut>(&self, key: K, operation: F) -> Result<T, CoordinatorError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(key, operation)?.wait().await
    }

    /// Move `key`'s lane to the context its placement now selects.
    ///
    /// The current worker finishes its running operation and retires; a new
    /// worker picks up the remaining queue afterwards, in order. Returns
    /// `false` when the key has no lane (nothing queued or running).
    pub fn relocate(&self, key: &K) -> bool {
        let target = self.place(key);
        let lanes = lock(&self.inner.lanes);
        let Some(lane) = lanes.get(key) else {
            return false;
        };

        let mut state = lock(&lane.state);
        let from = state.context.as_ref().map(|c| c.id().to_string());
        state.context = target;
        if state.worker_active || !state.queue.is_empty() {
            state.generation += 1;
            state.worker_active = true;
            self.spawn_worker(key, lane, state.generation, state.context.clone());
        }

        Counters::bump(&self.inner.counters.relocations);
        CoordinatorMetrics::record_relocation();
        tracing::info!(
            key = %key,
            from = from.as_deref().unwrap_or("local"),
            to = state.context.as_ref().map_or("local", ExecutionContext::id),
            queued = state.queue.len(),
            "Lane relocated"
        );
        true
    }

    /// Replace the membership and relocate every lane whose placement changed.
    ///
    /// Returns the number of relocated lanes.
    pub fn update_membership(&self, contexts: Vec<ExecutionContext>) -> usize {
        let ids: Vec<String> = contexts.iter().map(|c| c.id.clone()).collect();
        {
            let mut membership =
                self.inner.membership.write().unwrap_or_else(PoisonError::into_inner);
            *membership = contexts.clone();
        }

        let moved: Vec<K> = {
            let lanes = lock(&self.inner.lanes);
            lanes
                .iter()
                .filter(|(key, lane)| {
                    let current = lock(&lane.state).context.as_ref().map(|c| c.id.clone());
                    let target = place_over(&contexts, *key).map(|c| c.id.clone());
                    current != target
                })
                .map(|(key, _)| key.clone())
                .collect()
        };

        let relocated = moved.iter().filter(|key| self.relocate(key)).count();
        tracing::info!(members = ?ids, relocated, "Membership updated");
        relocated
    }

    /// Id of the context `key` is (or would be) placed on; `None` for the
    /// caller's local runtime.
    #[must_use]
    pub fn placement(&self, key: &K) -> Option<String> {
        self.place(key).map(|c| c.id)
    }

    /// Operations queued (not yet started) for `key`.
    #[must_use]
    pub fn queue_depth(&self, key: &K) -> usize {
        let lanes = lock(&self.inner.lanes);
        lanes.get(key).map_or(0, |lane| lock(&lane.state).queue.len())
    }

    /// Keys that currently own a lane.
    #[must_use]
    pub fn active_keys(&self) -> usize {
        lock(&self.inner.lanes).len()
    }

    /// Operations queued or running across all keys.
    #[must_use]
    pub fn pending(&self) -> usize {
        let lanes = lock(&self.inner.lanes);
        lanes
            .values()
            .map(|lane| {
                let state = lock(&lane.state);
                state.queue.len() + usize::from(state.running.is_some())
            })
            .sum()
    }

    /// Activity counters.
    #[must_use]
    pub fn stats(&self) -> CoordinatorStats {
        self.inner.counters.snapshot()
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::Acquire)
    }

    /// Perform a health check on the coordinator
    ///
    /// Unhealthy while shutting down, degraded when any queue is deeper than
    /// the configured threshold.
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        let deepest = {
            let lanes = lock(&self.inner.lanes);
            lanes.values().map(|lane| lock(&lane.state).queue.len()).max().unwrap_or(0)
        };
        let threshold = self.inner.config.degraded_queue_depth;

        let check = if self.is_shutting_down() {
            HealthCheck::unhealthy("coordinator", "Shutting down")
        } else if deepest >= threshold {
            HealthCheck::degraded(
                "coordinator",
                format!("Deepest queue holds {deepest} operations"),
            )
        } else {
            HealthCheck::healthy("coordinator")
        };

        check
            .with_metadata("active_keys", self.active_keys().to_string())
            .with_metadata("deepest_queue", deepest.to_string())
            .with_metadata("pending", self.pending().to_string())
    }

    /// Initiate graceful shutdown
    ///
    /// 1. Rejects new submissions with [`CoordinatorError::ShuttingDown`]
    /// 2. Waits for queued and running operations to finish
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::ShutdownTimeout`] if operations are still
    /// pending when `timeout` expires.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), CoordinatorError> {
        tracing::info!("Initiating coordinator shutdown");
        self.inner.shutting_down.store(true, Ordering::Release);

        let start = Instant::now();
        let poll_interval = Duration::from_millis(10);

        loop {
            let pending = self.pending();
            if pending == 0 {
                tracing::info!("All operations drained, shutdown complete");
                return Ok(());
            }
            if start.elapsed() >= timeout {
                tracing::error!(pending, "Shutdown timed out");
                return Err(CoordinatorError::ShutdownTimeout(pending));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    fn place(&self, key: &K) -> Option<ExecutionContext> {
        let membership = self.inner.membership.read().unwrap_or_else(PoisonError::into_inner);
        place_over(&membership, key).cloned()
    }

    fn spawn_worker(
        &self,
        key: &K,
        lane: &Arc<Lane>,
        generation: u64,
        context: Option<ExecutionContext>,
    ) {
        let worker = run_lane(Arc::clone(&self.inner), key.clone(), Arc::clone(lane), generation);
        match context {
            Some(context) => {
                context.handle.spawn(worker);
            },
            None => {
                tokio::spawn(worker);
            },
        }
    }
}

/// Rendezvous (highest random weight) placement.
fn place_over<'a, K: Hash>(
    contexts: &'a [ExecutionContext],
    key: &K,
) -> Option<&'a ExecutionContext> {
    contexts.iter().max_by_key(|context| {
        let mut hasher = DefaultHasher::new();
        context.id.hash(&mut hasher);
        key.hash(&mut hasher);
        hasher.finish()
    })
}

enum Step {
    Run(QueuedJob),
    AwaitPredecessor,
    Drained,
    Retire,
}

async fn run_lane<K: LaneKey>(inner: Arc<Inner<K>>, key: K, lane: Arc<Lane>, generation: u64) {
    loop {
        // Registered before inspecting state so a completion between the
        // check and the await is not missed.
        let idle = lane.idle.notified();

        let step = {
            let mut state = lock(&lane.state);
            if state.generation != generation {
                Step::Retire
            } else if state.running.is_some() {
                Step::AwaitPredecessor
            } else if let Some(job) = state.queue.pop_front() {
                state.running = Some(job.id);
                Step::Run(job)
            } else {
                Step::Drained
            }
        };

        match step {
            Step::Retire => {
                tracing::debug!(key = %key, generation, "Worker retired after relocation");
                return;
            },
            Step::AwaitPredecessor => idle.await,
            Step::Run(job) => {
                let waited = job.enqueued_at.elapsed();
                Counters::bump(&inner.counters.started);
                CoordinatorMetrics::record_wait(waited);
                tracing::trace!(key = %key, job_id = job.id, waited_ms = waited.as_millis(), "Operation started");

                (job.run)().await;

                lock(&lane.state).running = None;
                lane.idle.notify_waiters();
                Counters::bump(&inner.counters.completed);
            },
            Step::Drained => {
                let mut lanes = lock(&inner.lanes);
                let mut state = lock(&lane.state);
                if state.generation != generation {
                    return;
                }
                if !state.queue.is_empty() {
                    continue;
                }
                state.worker_active = false;
                if lanes.get(&key).is_some_and(|current| Arc::ptr_eq(current, &lane)) {
                    lanes.remove(&key);
                    CoordinatorMetrics::record_active_lanes(lanes.len());
                }
                return;
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

fn remove_queued(lane: &Lane, job_id: u64) -> bool {
    let removed = {
        let mut state = lock(&lane.state);
        state
            .queue
            .iter()
            .position(|job| job.id == job_id)
            .and_then(|position| state.queue.remove(position))
    };
    // Dropped outside the lock: the job owns caller-provided captures.
    removed.is_some()
}

trait CounterSink: Send + Sync {
    fn record_cancelled(&self);
    fn record_timed_out(&self);
}

impl<K: Send + Sync> CounterSink for Inner<K> {
    fn record_cancelled(&self) {
        Counters::bump(&self.counters.cancelled);
        CoordinatorMetrics::record_cancelled();
    }

    fn record_timed_out(&self) {
        Counters::bump(&self.counters.timed_out);
        CoordinatorMetrics::record_timeout();
    }
}

/// Handle to a submitted operation.
///
/// Dropping a ticket whose operation has not started removes the operation
/// from its queue.
#[must_use = "dropping a ticket cancels the queued operation"]
pub struct Ticket<K, T> {
    key: K,
    job_id: u64,
    lane: Arc<Lane>,
    receiver: Option<oneshot::Receiver<Result<T, CoordinatorError>>>,
    submitted_at: Instant,
    max_wait: Option<Duration>,
    cancelled: bool,
    counters: Arc<dyn CounterSink>,
}

impl<K: Display, T> Ticket<K, T> {
    /// The key this operation was submitted under.
    pub const fn key(&self) -> &K {
        &self.key
    }

    /// Cancel the operation if it has not started yet.
    ///
    /// Returns `true` if it was removed from its queue; it will never run
    /// and [`wait`](Self::wait) reports [`CoordinatorError::Cancelled`].
    /// Returns `false` if it already started (or finished); it then runs to
    /// completion as if `cancel` had not been called.
    pub fn cancel(&mut self) -> bool {
        if remove_queued(&self.lane, self.job_id) {
            self.cancelled = true;
            self.counters.record_cancelled();
            tracing::debug!(key = %self.key, job_id = self.job_id, "Operation cancelled while queued");
            true
        } else {
            false
        }
    }

    /// Wait for the operation's result.
    ///
    /// If the coordinator has a maximum queue wait and the operation is still
    /// queued when it expires, the operation is removed and
    /// [`CoordinatorError::QueueTimeout`] is returned. An operation that has
    /// already started is always awaited to completion.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::QueueTimeout`], [`CoordinatorError::Cancelled`],
    /// [`CoordinatorError::OperationPanicked`] or [`CoordinatorError::WorkerLost`].
    pub async fn wait(mut self) -> Result<T, CoordinatorError> {
        if self.cancelled {
            return Err(CoordinatorError::Cancelled);
        }
        let Some(receiver) = self.receiver.as_mut() else {
            return Err(CoordinatorError::WorkerLost(self.key.to_string()));
        };

        let received = match self.max_wait {
            None => receiver.await,
            Some(limit) => {
                let remaining = limit.saturating_sub(self.submitted_at.elapsed());
                match tokio::time::timeout(remaining, &mut *receiver).await {
                    Ok(received) => received,
                    Err(_elapsed) => {
                        if remove_queued(&self.lane, self.job_id) {
                            self.receiver = None;
                            self.counters.record_timed_out();
                            let waited = self.submitted_at.elapsed();
                            tracing::warn!(
                                key = %self.key,
                                job_id = self.job_id,
                                waited_ms = waited.as_millis(),
                                "Operation timed out in queue"
                            );
                            return Err(CoordinatorError::QueueTimeout {
                                key: self.key.to_string(),
                                waited,
                            });
                        }
                        receiver.await
                    },
                }
            },
        };

        self.receiver = None;
        received.unwrap_or_else(|_| Err(CoordinatorError::WorkerLost(self.key.to_string())))
    }
}

impl<K, T> Drop for Ticket<K, T> {
    fn drop(&mut self) {
        if self.receiver.is_some() && !self.cancelled && remove_queued(&self.lane, self.job_id) {
            self.counters.record_cancelled();
        }
    }
}
