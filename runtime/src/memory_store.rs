//! In-memory, linearizable implementation of [`StateStore`].
//!
//! All operations take one lock over the whole keyspace, so every read
//! observes a single revision and every commit is applied atomically. This
//! is the single-node stand-in for a consensus-backed store; it offers the
//! same contract the booking layer relies on.

use crate::metrics::StoreMetrics;
use hotel_ops_core::state::{Revision, StateKey};
use hotel_ops_core::state_store::{
    ActualRevision, Snapshot, StateStore, StateStoreError, StoreFuture, Versioned, Write,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

#[derive(Debug, Default)]
struct Keyspace {
    revision: Revision,
    entries: BTreeMap<StateKey, (Revision, Vec<u8>)>,
    sequences: HashMap<String, u64>,
}

impl Keyspace {
    fn versioned(&self, key: &StateKey) -> Option<Versioned> {
        self.entries.get(key).map(|(revision, bytes)| Versioned {
            key: key.clone(),
            revision: *revision,
            bytes: bytes.clone(),
        })
    }
}

/// Single-node linearizable state store.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    keyspace: RwLock<Keyspace>,
}

impl InMemoryStateStore {
    /// Create an empty store at revision zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Keyspace) -> T) -> T {
        let keyspace = self.keyspace.read().unwrap_or_else(PoisonError::into_inner);
        f(&keyspace)
    }

    fn apply(&self, writes: Vec<Write>) -> Result<Revision, StateStoreError> {
        let started = Instant::now();
        let mut keyspace = self.keyspace.write().unwrap_or_else(PoisonError::into_inner);

        for write in &writes {
            let current = keyspace.entries.get(&write.key).map(|(revision, _)| *revision);
            if !write.expect.holds(current) {
                StoreMetrics::record_conflict();
                tracing::debug!(key = %write.key, expected = %write.expect, "Commit precondition failed");
                return Err(StateStoreError::Conflict {
                    key: write.key.clone(),
                    expected: write.expect,
                    actual: ActualRevision(current),
                });
            }
        }

        let count = writes.len();
        let revision = keyspace.revision.next();
        keyspace.revision = revision;
        for write in writes {
            keyspace.entries.insert(write.key, (revision, write.bytes));
        }
        StoreMetrics::record_commit(count, started.elapsed());
        Ok(revision)
    }
}

impl StateStore for InMemoryStateStore {
    fn get<'a>(&'a self, key: &'a StateKey) -> StoreFuture<'a, Option<Versioned>> {
        let entry = self.read(|keyspace| keyspace.versioned(key));
        Box::pin(futures::future::ready(Ok(entry)))
    }

    fn snapshot<'a>(&'a self, keys: &'a [StateKey]) -> StoreFuture<'a, Snapshot> {
        let snapshot = self.read(|keyspace| {
            Snapshot::new(keyspace.revision, keys.iter().filter_map(|key| keyspace.versioned(key)))
        });
        Box::pin(futures::future::ready(Ok(snapshot)))
    }

    fn scan_prefix<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Snapshot> {
        let snapshot = self.read(|keyspace| {
            let entries = keyspace
                .entries
                .range(StateKey::new(prefix)..)
                .take_while(|(key, _)| key.starts_with(prefix))
                .map(|(key, (revision, bytes))| Versioned {
                    key: key.clone(),
                    revision: *revision,
                    bytes: bytes.clone(),
                });
            Snapshot::new(keyspace.revision, entries)
        });
        Box::pin(futures::future::ready(Ok(snapshot)))
    }

    fn commit(&self, writes: Vec<Write>) -> StoreFuture<'_, Revision> {
        Box::pin(futures::future::ready(self.apply(writes)))
    }

    fn next_sequence<'a>(&'a self, name: &'a str) -> StoreFuture<'a, u64> {
        let value = {
            let mut keyspace = self.keyspace.write().unwrap_or_else(PoisonError::into_inner);
            let slot = keyspace.sequences.entry(name.to_string()).or_insert(0);
            *slot += 1;
            *slot
        };
        Box::pin(futures::future::ready(Ok(value)))
    }

    fn revision(&self) -> StoreFuture<'_, Revision> {
        let revision = self.read(|keyspace| keyspace.revision);
        Box::pin(futures::future::ready(Ok(revision)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use hotel_ops_core::state_store::Expect;

    fn put(key: &str, expect: Expect, value: u32) -> Write {
        Write::put(StateKey::new(key), expect, &value).unwrap()
    }

    #[tokio::test]
    async fn commit_then_read_observes_write() {
        let store = InMemoryStateStore::new();
        let revision = store.commit(vec![put("a", Expect::Absent, 1)]).await.unwrap();

        let entry = store.get(&StateKey::new("a")).await.unwrap().unwrap();
        assert_eq!(entry.revision, revision);
        assert_eq!(entry.decode::<u32>().unwrap(), 1);
        assert_eq!(store.revision().await.unwrap(), revision);
    }

    #[tokio::test]
    async fn absent_precondition_rejects_existing_key() {
        let store = InMemoryStateStore::new();
        store.commit(vec![put("a", Expect::Absent, 1)]).await.unwrap();

        let result = store.commit(vec![put("a", Expect::Absent, 2)]).await;
        assert!(matches!(result, Err(StateStoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn stale_revision_is_rejected() {
        let store = InMemoryStateStore::new();
        let first = store.commit(vec![put("a", Expect::Absent, 1)]).await.unwrap();
        store.commit(vec![put("a", Expect::Revision(first), 2)]).await.unwrap();

        let stale = store.commit(vec![put("a", Expect::Revision(first), 3)]).await;
        match stale {
            Err(StateStoreError::Conflict { actual, .. }) => {
                assert_eq!(actual, ActualRevision(Some(first.next())));
            },
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_commit_applies_nothing() {
        let store = InMemoryStateStore::new();
        store.commit(vec![put("taken", Expect::Absent, 1)]).await.unwrap();
        let before = store.revision().await.unwrap();

        let result = store
            .commit(vec![put("fresh", Expect::Absent, 1), put("taken", Expect::Absent, 2)])
            .await;

        assert!(result.is_err());
        assert!(store.get(&StateKey::new("fresh")).await.unwrap().is_none());
        assert_eq!(store.revision().await.unwrap(), before);
    }

    #[tokio::test]
    async fn multi_key_commit_shares_one_revision() {
        let store = InMemoryStateStore::new();
        let revision = store
            .commit(vec![put("x", Expect::Absent, 1), put("y", Expect::Absent, 2)])
            .await
            .unwrap();

        let keys = [StateKey::new("x"), StateKey::new("y"), StateKey::new("missing")];
        let snapshot = store.snapshot(&keys).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.revision, revision);
        assert!(snapshot.iter().all(|entry| entry.revision == revision));
    }

    #[tokio::test]
    async fn scan_prefix_is_bounded_by_prefix() {
        let store = InMemoryStateStore::new();
        store
            .commit(vec![
                put("hotel/catalog/1", Expect::Any, 1),
                put("hotel/catalog/2", Expect::Any, 2),
                put("hotel/rooms/1", Expect::Any, 3),
                put("authz/roles/admin", Expect::Any, 4),
            ])
            .await
            .unwrap();

        let catalog = store.scan_prefix("hotel/catalog/").await.unwrap();
        assert_eq!(catalog.len(), 2);
        let everything = store.scan_prefix("").await.unwrap();
        assert_eq!(everything.len(), 4);
    }

    #[tokio::test]
    async fn sequences_are_independent_and_monotonic() {
        let store = InMemoryStateStore::new();
        assert_eq!(store.next_sequence("hotel").await.unwrap(), 1);
        assert_eq!(store.next_sequence("hotel").await.unwrap(), 2);
        assert_eq!(store.next_sequence("room").await.unwrap(), 1);
    }
}
