//! Failure injection for the state store.

use hotel_ops_core::state::{Revision, StateKey};
use hotel_ops_core::state_store::{
    Snapshot, StateStore, StateStoreError, StoreFuture, Versioned, Write,
};
use hotel_ops_runtime::InMemoryStateStore;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Wraps a [`StateStore`] and fails operations on demand.
///
/// Scripted commit failures are consumed one per commit attempt, in the
/// order they were queued; once the script is empty, commits go through to
/// the inner store. Reads can be switched off wholesale to simulate losing
/// quorum.
///
/// # Example
///
/// ```
/// use hotel_ops_testing::FlakyStateStore;
/// use hotel_ops_core::state_store::StateStoreError;
///
/// let store = FlakyStateStore::in_memory();
/// store.fail_next_commits(2, StateStoreError::Unavailable("leader election".into()));
/// assert_eq!(store.scripted_failures(), 2);
/// ```
#[derive(Debug)]
pub struct FlakyStateStore<S = InMemoryStateStore> {
    inner: S,
    commit_failures: Mutex<VecDeque<StateStoreError>>,
    reads_unavailable: AtomicBool,
    commit_attempts: AtomicUsize,
}

impl FlakyStateStore<InMemoryStateStore> {
    /// Flaky wrapper around a fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(InMemoryStateStore::new())
    }
}

impl<S: StateStore> FlakyStateStore<S> {
    /// Wrap `inner` with no failures scheduled.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            commit_failures: Mutex::new(VecDeque::new()),
            reads_unavailable: AtomicBool::new(false),
            commit_attempts: AtomicUsize::new(0),
        }
    }

    /// Fail the next `count` commits with `error`.
    pub fn fail_next_commits(&self, count: usize, error: StateStoreError) {
        let mut script = self.commit_failures.lock().unwrap_or_else(PoisonError::into_inner);
        script.extend(std::iter::repeat_n(error, count));
    }

    /// Make every read fail with [`StateStoreError::Unavailable`] until reset.
    pub fn set_reads_unavailable(&self, unavailable: bool) {
        self.reads_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Commit attempts seen so far, including injected failures.
    #[must_use]
    pub fn commit_attempts(&self) -> usize {
        self.commit_attempts.load(Ordering::SeqCst)
    }

    /// Injected failures not yet consumed.
    #[must_use]
    pub fn scripted_failures(&self) -> usize {
        self.commit_failures.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    fn read_failure(&self) -> Option<StateStoreError> {
        self.reads_unavailable
            .load(Ordering::SeqCst)
            .then(|| StateStoreError::Unavailable("reads disabled by test".to_string()))
    }
}

impl<S: StateStore> StateStore for FlakyStateStore<S> {
    fn get<'a>(&'a self, key: &'a StateKey) -> StoreFuture<'a, Option<Versioned>> {
        match self.read_failure() {
            Some(error) => Box::pin(futures::future::ready(Err(error))),
            None => self.inner.get(key),
        }
    }

    fn snapshot<'a>(&'a self, keys: &'a [StateKey]) -> StoreFuture<'a, Snapshot> {
        match self.read_failure() {
            Some(error) => Box::pin(futures::future::ready(Err(error))),
            None => self.inner.snapshot(keys),
        }
    }

    fn scan_prefix<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Snapshot> {
        match self.read_failure() {
            Some(error) => Box::pin(futures::future::ready(Err(error))),
            None => self.inner.scan_prefix(prefix),
        }
    }

    fn commit(&self, writes: Vec<Write>) -> StoreFuture<'_, Revision> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        let injected =
            self.commit_failures.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        match injected {
            Some(error) => Box::pin(futures::future::ready(Err(error))),
            None => self.inner.commit(writes),
        }
    }

    fn next_sequence<'a>(&'a self, name: &'a str) -> StoreFuture<'a, u64> {
        self.inner.next_sequence(name)
    }

    fn revision(&self) -> StoreFuture<'_, Revision> {
        match self.read_failure() {
            Some(error) => Box::pin(futures::future::ready(Err(error))),
            None => self.inner.revision(),
        }
    }
}
