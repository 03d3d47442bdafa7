//! Versioned state store abstraction.
//!
//! Everything that must be consistent across the cluster (room ledgers,
//! the hotel catalog, role/permission mappings, identifier sequences) lives
//! behind this one narrow interface. The contract mirrors what consensus
//! key/value stores offer:
//!
//! - Linearizable read-after-write per key
//! - A store-wide revision that advances by one on every commit
//! - Atomic multi-key commits guarded by per-key compare-and-set
//! - Consistent multi-key snapshots taken at a single revision
//!
//! # Implementations
//!
//! - `InMemoryStateStore` (in `hotel-ops-runtime`): single-node, linearizable
//! - `FlakyStateStore` (in `hotel-ops-testing`): wraps another store and injects faults
//!
//! # Example
//!
//! ```ignore
//! use hotel_ops_core::state_store::{Expect, StateStore, Write};
//!
//! async fn bump(store: &dyn StateStore) -> Result<(), StateStoreError> {
//!     let key = StateKey::new("counters/visits");
//!     let current = store.get(&key).await?;
//!     let (count, expect) = match &current {
//!         Some(entry) => (entry.decode::<u64>()?, Expect::Revision(entry.revision)),
//!         None => (0, Expect::Absent),
//!     };
//!     store.commit(vec![Write::put(key, expect, &(count + 1))?]).await?;
//!     Ok(())
//! }
//! ```

use crate::state::{Revision, StateKey};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during state store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateStoreError {
    /// A commit precondition did not hold.
    ///
    /// Another writer modified `key` after it was read. Nothing in the
    /// commit was applied.
    #[error("Conflict on '{key}': expected {expected}, found {actual}")]
    Conflict {
        /// The key whose precondition failed.
        key: StateKey,
        /// What the writer expected.
        expected: Expect,
        /// The mod revision actually found (`None` when absent).
        actual: ActualRevision,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The store could not be reached or rejected the request.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StateStoreError {
    /// Whether retrying the whole read-modify-commit cycle may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Unavailable(_))
    }
}

/// Mod revision observed by a failed precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActualRevision(pub Option<Revision>);

impl std::fmt::Display for ActualRevision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(revision) => write!(f, "revision {revision}"),
            None => write!(f, "no entry"),
        }
    }
}

/// Precondition attached to each write in a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Unconditional write.
    Any,
    /// The key must not exist.
    Absent,
    /// The key's mod revision must equal this value.
    Revision(Revision),
}

impl Expect {
    /// Precondition matching what a read observed: the entry's revision if
    /// it existed, otherwise absence.
    #[must_use]
    pub fn observed(entry: Option<&Versioned>) -> Self {
        entry.map_or(Self::Absent, |entry| Self::Revision(entry.revision))
    }

    /// Check the precondition against the key's current mod revision.
    #[must_use]
    pub fn holds(self, current: Option<Revision>) -> bool {
        match self {
            Self::Any => true,
            Self::Absent => current.is_none(),
            Self::Revision(expected) => current == Some(expected),
        }
    }
}

impl std::fmt::Display for Expect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "any revision"),
            Self::Absent => write!(f, "no entry"),
            Self::Revision(revision) => write!(f, "revision {revision}"),
        }
    }
}

/// One entry as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    /// The entry's key.
    pub key: StateKey,
    /// Revision of the commit that last wrote this entry.
    pub revision: Revision,
    /// Encoded value.
    pub bytes: Vec<u8>,
}

impl Versioned {
    /// Decode the stored value.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::Serialization`] if the bytes do not decode as `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StateStoreError> {
        decode(&self.bytes)
    }
}

/// Encode a value the way the store expects it.
///
/// # Errors
///
/// Returns [`StateStoreError::Serialization`] if `value` cannot be encoded.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StateStoreError> {
    bincode::serialize(value).map_err(|e| StateStoreError::Serialization(e.to_string()))
}

/// Decode bytes produced by [`encode`].
///
/// # Errors
///
/// Returns [`StateStoreError::Serialization`] if the bytes do not decode as `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StateStoreError> {
    bincode::deserialize(bytes).map_err(|e| StateStoreError::Serialization(e.to_string()))
}

/// A single write inside an atomic commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Write {
    /// Target key.
    pub key: StateKey,
    /// Precondition on the key's current mod revision.
    pub expect: Expect,
    /// New encoded value.
    pub bytes: Vec<u8>,
}

impl Write {
    /// Build a write from an already encoded value.
    #[must_use]
    pub const fn raw(key: StateKey, expect: Expect, bytes: Vec<u8>) -> Self {
        Self { key, expect, bytes }
    }

    /// Encode `value` and build a write for it.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::Serialization`] if `value` cannot be encoded.
    pub fn put<T: Serialize>(
        key: StateKey,
        expect: Expect,
        value: &T,
    ) -> Result<Self, StateStoreError> {
        Ok(Self { key, expect, bytes: encode(value)? })
    }
}

/// A consistent view of several entries, all read at one store revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Store revision at which the snapshot was taken.
    pub revision: Revision,
    entries: BTreeMap<StateKey, Versioned>,
}

impl Snapshot {
    /// Assemble a snapshot from entries read at `revision`.
    #[must_use]
    pub fn new(revision: Revision, entries: impl IntoIterator<Item = Versioned>) -> Self {
        Self {
            revision,
            entries: entries.into_iter().map(|e| (e.key.clone(), e)).collect(),
        }
    }

    /// Look up one entry.
    #[must_use]
    pub fn get(&self, key: &StateKey) -> Option<&Versioned> {
        self.entries.get(key)
    }

    /// Decode one entry if present.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::Serialization`] if the entry exists but does not decode.
    pub fn decode<T: DeserializeOwned>(&self, key: &StateKey) -> Result<Option<T>, StateStoreError> {
        self.entries.get(key).map(Versioned::decode).transpose()
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Versioned> {
        self.entries.values()
    }

    /// Iterate over entries whose key starts with `prefix`, in key order.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Versioned> + 'a {
        self.entries.values().filter(move |e| e.key.starts_with(prefix))
    }

    /// Number of entries present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no requested entry was present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Boxed future returned by [`StateStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StateStoreError>> + Send + 'a>>;

/// Linearizable, revisioned key/value store.
///
/// # Guarantees
///
/// - A `get` or `snapshot` issued after a `commit` returned observes that commit
/// - `commit` applies all writes or none; on precondition failure it returns
///   [`StateStoreError::Conflict`] naming the first failing key
/// - `snapshot` and `scan_prefix` never mix entries from different revisions
/// - `next_sequence` never hands out the same value twice for one name
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// to enable trait object usage (`Arc<dyn StateStore>`), so the booking layer,
/// the permission resolver and the read paths can all share one store handle.
pub trait StateStore: Send + Sync {
    /// Read a single entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve the read.
    fn get<'a>(&'a self, key: &'a StateKey) -> StoreFuture<'a, Option<Versioned>>;

    /// Read several entries at one revision. Missing keys are simply absent
    /// from the returned snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve the read.
    fn snapshot<'a>(&'a self, keys: &'a [StateKey]) -> StoreFuture<'a, Snapshot>;

    /// Read every entry whose key starts with `prefix`, at one revision.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve the read.
    fn scan_prefix<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Snapshot>;

    /// Atomically apply `writes` if every precondition holds.
    ///
    /// Returns the new store revision.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError::Conflict`] if a precondition fails, or a
    /// backend error. In both cases nothing was written.
    fn commit(&self, writes: Vec<Write>) -> StoreFuture<'_, Revision>;

    /// Allocate the next value of a named, monotonically increasing sequence
    /// (starting at 1).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve the request.
    fn next_sequence<'a>(&'a self, name: &'a str) -> StoreFuture<'a, u64>;

    /// Current store revision.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve the read.
    fn revision(&self) -> StoreFuture<'_, Revision>;
}
