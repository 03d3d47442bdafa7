//! State key and revision types.
//!
//! This module defines strong types for addressing entries in the clustered
//! state store (`StateKey`) and for the store's monotonic revision counter
//! (`Revision`) used for compare-and-set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `StateKey` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid state key: {0}")]
pub struct ParseStateKeyError(String);

/// Path-like identifier of one entry in the state store.
///
/// Keys are `/`-separated segments, for example:
/// - `"hotel/catalog/7"`
/// - `"hotel/ledger/7/12"`
/// - `"authz/roles/manager"`
///
/// Prefix scans rely on this layout: every key under `"hotel/"` belongs to
/// the hotel domain, every key under `"authz/"` to authorization.
///
/// # Validation
///
/// - `FromStr::from_str()`: Rejects empty strings and empty segments
/// - `From::from()` and `new()`: No validation (for internal use with trusted input)
///
/// # Examples
///
/// ```
/// use hotel_ops_core::state::StateKey;
///
/// let key = StateKey::new("hotel/catalog/7");
/// assert_eq!(key.as_str(), "hotel/catalog/7");
/// assert!(key.starts_with("hotel/"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateKey(String);

impl StateKey {
    /// Create a new `StateKey` from a string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key lives under `prefix`.
    #[must_use]
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// The last `/`-separated segment.
    ///
    /// ```
    /// use hotel_ops_core::state::StateKey;
    ///
    /// assert_eq!(StateKey::new("hotel/catalog/7").last_segment(), "7");
    /// ```
    #[must_use]
    pub fn last_segment(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Convert the `StateKey` into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StateKey {
    type Err = ParseStateKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseStateKeyError("state key cannot be empty".to_string()));
        }
        if s.split('/').any(str::is_empty) {
            return Err(ParseStateKeyError(format!("empty segment in '{s}'")));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for StateKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StateKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for StateKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Store-wide revision number.
///
/// Every successful commit advances the store revision by one, and each
/// written entry records the revision of the commit that last wrote it
/// (its *mod revision*). Comparing an entry's mod revision against the one
/// observed at read time is how writers detect concurrent modification.
///
/// # Examples
///
/// ```
/// use hotel_ops_core::state::Revision;
///
/// let r0 = Revision::ZERO;
/// let r1 = r0.next();
/// assert_eq!(r1, Revision::new(1));
/// assert!(r1 > r0);
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Revision(u64);

impl Revision {
    /// Revision of an empty store.
    pub const ZERO: Self = Self(0);

    /// Create a new `Revision` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the revision number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next revision (current + 1).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Revision {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Revision> for u64 {
    fn from(revision: Revision) -> Self {
        revision.0
    }
}
