//! # Hotel Ops Core
//!
//! Core traits and types for the hotel operations engine.
//!
//! This crate provides the abstractions every other crate builds on: the
//! Reducer pattern for business logic, effect descriptions, injected clocks,
//! and a narrow, explicitly versioned interface to the clustered state store.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state owned by one resource key (a room ledger, a hotel's room list)
//! - **Action**: Inputs to a reducer (create, confirm, cancel, ...)
//! - **Reducer**: `(State, Action, Environment) → Result<Effects, Error>`
//! - **Effect**: Side effect descriptions, dispatched only after a durable commit
//! - **Environment**: Injected dependencies via traits
//! - **State store**: Linearizable, revisioned key/value store with atomic compare-and-set
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Reducers never touch the store; the runtime loads, reduces, commits, then publishes
//! - A rejected action leaves state untouched
//! - Dependency Injection via Environment
//!
//! ## Example
//!
//! ```ignore
//! use hotel_ops_core::*;
//!
//! impl Reducer for LedgerReducer {
//!     type State = RoomLedger;
//!     type Action = LedgerAction;
//!     type Event = LedgerEvent;
//!     type Environment = LedgerEnvironment;
//!     type Error = LedgerError;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut RoomLedger,
//!         action: LedgerAction,
//!         env: &LedgerEnvironment,
//!     ) -> Result<Effects<LedgerEvent>, LedgerError> {
//!         // Business logic goes here
//!         Ok(smallvec![])
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

pub mod event_bus;
pub mod state;
pub mod state_store;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → Result<Effects, Error>`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effects;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Event`: The facts published after the new state is committed
    /// - `Environment`: The injected dependencies this reducer needs
    /// - `Error`: Why an action was rejected
    ///
    /// # Atomicity
    ///
    /// When `reduce` returns `Err`, `state` must be exactly as it was before
    /// the call. Callers rely on this to report a rejection without having
    /// to restore anything.
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for LedgerReducer {
    ///     type State = RoomLedger;
    ///     type Action = LedgerAction;
    ///     type Event = LedgerEvent;
    ///     type Environment = LedgerEnvironment;
    ///     type Error = LedgerError;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut RoomLedger,
    ///         action: LedgerAction,
    ///         env: &LedgerEnvironment,
    ///     ) -> Result<Effects<LedgerEvent>, LedgerError> {
    ///         match action {
    ///             LedgerAction::Confirm { id } => {
    ///                 // Business logic here
    ///                 Ok(smallvec![Effect::Publish(LedgerEvent::Confirmed { id })])
    ///             }
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The event type carried by published effects
        type Event;

        /// The environment type with injected dependencies
        type Environment;

        /// The rejection type
        type Error;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action against the current state
        /// 2. Updates state in place (only when validation passed)
        /// 3. Returns effect descriptions to be executed after commit
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the action is not admissible in the
        /// current state. The state is left unchanged in that case.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<Effects<Self::Event>, Self::Error>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are only acted upon once the state
/// change that produced them has been durably committed.
pub mod effect {
    use smallvec::SmallVec;

    /// Effect list returned by reducers.
    ///
    /// Most transitions publish zero or one event, so four inline slots
    /// keep the common case off the heap.
    pub type Effects<Event> = SmallVec<[Effect<Event>; 4]>;

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Event`: The event type that can be published
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Effect<Event> {
        /// No-op effect
        None,

        /// Publish an event to subscribers (audit trail, history)
        Publish(Event),

        /// Run effects sequentially
        Sequential(Vec<Effect<Event>>),
    }

    impl<Event> Effect<Event> {
        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Event>>) -> Effect<Event> {
            Effect::Sequential(effects)
        }

        /// Whether this effect does nothing when executed.
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Effect::None => true,
                Effect::Publish(_) => false,
                Effect::Sequential(effects) => effects.iter().all(Effect::is_none),
            }
        }

        /// Convert the event type, keeping the effect structure.
        ///
        /// Lets a reducer's narrow event type be lifted into an
        /// application-wide event enum before dispatch.
        #[must_use]
        pub fn map<U>(self, f: &impl Fn(Event) -> U) -> Effect<U> {
            match self {
                Effect::None => Effect::None,
                Effect::Publish(event) => Effect::Publish(f(event)),
                Effect::Sequential(effects) => {
                    Effect::Sequential(effects.into_iter().map(|effect| effect.map(f)).collect())
                },
            }
        }

        /// Flatten into the events that would be published, in order.
        #[must_use]
        pub fn into_events(self) -> Vec<Event> {
            let mut events = Vec::new();
            self.collect_into(&mut events);
            events
        }

        fn collect_into(self, events: &mut Vec<Event>) {
            match self {
                Effect::None => {},
                Effect::Publish(event) => events.push(event),
                Effect::Sequential(effects) => {
                    for effect in effects {
                        effect.collect_into(events);
                    }
                },
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, NaiveDate, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use hotel_ops_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// assert_eq!(clock.today(), clock.now().date_naive());
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;

        /// The current UTC calendar day.
        fn today(&self) -> NaiveDate {
            self.now().date_naive()
        }
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;

    #[test]
    fn effect_none_detection() {
        assert!(Effect::<u32>::None.is_none());
        assert!(Effect::<u32>::chain(vec![Effect::None, Effect::None]).is_none());
        assert!(!Effect::Publish(1_u32).is_none());
        assert!(!Effect::chain(vec![Effect::None, Effect::Publish(2_u32)]).is_none());
    }

    #[test]
    fn sequential_effects_flatten_in_order() {
        let effect = Effect::chain(vec![
            Effect::Publish(1_u32),
            Effect::None,
            Effect::chain(vec![Effect::Publish(2), Effect::Publish(3)]),
        ]);

        assert_eq!(effect.into_events(), vec![1, 2, 3]);
    }

    #[test]
    fn map_lifts_every_event() {
        let effect = Effect::chain(vec![Effect::Publish(1_u32), Effect::None, Effect::Publish(2)]);
        let mapped = effect.map(&|n: u32| format!("event-{n}"));

        assert_eq!(mapped.into_events(), vec!["event-1".to_string(), "event-2".to_string()]);
    }
}
