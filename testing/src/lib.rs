//! # Hotel Ops Testing
//!
//! Testing utilities and helpers for the hotel operations engine.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - [`ReducerTest`], a Given-When-Then harness for reducers
//! - [`FlakyStateStore`], a state store wrapper that injects failures
//! - proptest strategies for stay dates
//!
//! ## Example
//!
//! ```ignore
//! use hotel_ops_testing::{test_clock, ReducerTest};
//!
//! ReducerTest::new(ReservationReducer)
//!     .with_env(environment(test_clock()))
//!     .given_state(empty_ledger())
//!     .when_action(LedgerAction::Create { .. })
//!     .then_state(|ledger| assert_eq!(ledger.reservations.len(), 1))
//!     .run();
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};
use hotel_ops_core::environment::Clock;

pub mod reducer_test;
pub mod store_mocks;

pub use reducer_test::{ReducerTest, assertions};
pub use store_mocks::FlakyStateStore;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use hotel_ops_testing::mocks::FixedClock;
    /// use hotel_ops_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Lets lifecycle tests cross "today" boundaries (a stay that was in the
    /// future becomes current) without sleeping.
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Create a clock frozen at `time`
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time: Mutex::new(time) }
        }

        /// Jump to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }

        /// Move forward by `by`
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Move forward by whole days
        pub fn advance_days(&self, days: i64) {
            self.advance(Duration::days(days));
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers and utilities
pub mod helpers {
    use super::{NaiveDate, Utc};

    /// Install a `tracing` subscriber that writes through the test harness.
    ///
    /// Honors `RUST_LOG`. Safe to call from every test; only the first call
    /// installs anything.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Seconds since the Unix epoch at UTC midnight of `date`.
    #[must_use]
    pub fn midnight_epoch_seconds(date: NaiveDate) -> i64 {
        date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
    }

    /// `days` days after the current UTC date.
    #[must_use]
    pub fn days_from_today(days: i64) -> NaiveDate {
        Utc::now().date_naive() + chrono::Duration::days(days)
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use super::{Duration, NaiveDate};
    use proptest::prelude::*;

    /// Strategy producing half-open stays `[check_in, check_out)` that start
    /// within `horizon_days` of `base` and last between 1 and `max_nights`
    /// nights.
    pub fn stay_strategy(
        base: NaiveDate,
        horizon_days: i64,
        max_nights: i64,
    ) -> impl Strategy<Value = (NaiveDate, NaiveDate)> {
        (0..horizon_days.max(1), 1..=max_nights.max(1)).prop_map(move |(offset, nights)| {
            let check_in = base + Duration::days(offset);
            (check_in, check_in + Duration::days(nights))
        })
    }

    /// Whether two half-open stays share at least one night.
    #[must_use]
    pub fn stays_overlap(a: (NaiveDate, NaiveDate), b: (NaiveDate, NaiveDate)) -> bool {
        a.0 < b.1 && b.0 < a.1
    }
}

// Re-export commonly used items
pub use helpers::{days_from_today, init_test_tracing, midnight_epoch_seconds};
pub use mocks::{FixedClock, ManualClock, test_clock};
