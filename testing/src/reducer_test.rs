//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use hotel_ops_core::effect::Effect;
use hotel_ops_core::reducer::Reducer;
use std::fmt::Debug;

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<Ev> = Box<dyn FnOnce(&[Effect<Ev>])>;

/// Type alias for error assertion functions
type ErrorAssertion<Er> = Box<dyn FnOnce(&Er)>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// A test either expects success (`then_state` / `then_effects` /
/// `then_events`) or rejection (`then_error`). On rejection the harness also
/// checks that the reducer left the state exactly as it found it.
///
/// # Example
///
/// ```ignore
/// use hotel_ops_testing::ReducerTest;
///
/// ReducerTest::new(CounterReducer)
///     .with_env(())
///     .given_state(Counter { value: 0 })
///     .when_action(CounterAction::Add(2))
///     .then_state(|state| assert_eq!(state.value, 2))
///     .then_events(|events| assert_eq!(events, [CounterEvent::Added(2)]))
///     .run();
///
/// ReducerTest::new(CounterReducer)
///     .with_env(())
///     .given_state(Counter { value: u32::MAX })
///     .when_action(CounterAction::Add(1))
///     .then_error(|error| assert_eq!(*error, CounterError::Overflow))
///     .run();
/// ```
pub struct ReducerTest<R>
where
    R: Reducer,
{
    reducer: R,
    environment: Option<R::Environment>,
    initial_state: Option<R::State>,
    action: Option<R::Action>,
    state_assertions: Vec<StateAssertion<R::State>>,
    effect_assertions: Vec<EffectAssertion<R::Event>>,
    error_assertions: Vec<ErrorAssertion<R::Error>>,
}

impl<R> ReducerTest<R>
where
    R: Reducer,
    R::State: Clone + PartialEq + Debug,
    R::Event: Clone + Debug + 'static,
    R::Error: Debug,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            action: None,
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
            error_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: R::Environment) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: R::State) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the action to test (When)
    #[must_use]
    pub fn when_action(mut self, action: R::Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&R::State) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the resulting effects (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<R::Event>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the published events, flattened in order (Then)
    #[must_use]
    pub fn then_events<F>(self, assertion: F) -> Self
    where
        F: FnOnce(&[R::Event]) + 'static,
    {
        self.then_effects(move |effects| {
            let events: Vec<R::Event> =
                effects.iter().cloned().flat_map(Effect::into_events).collect();
            assertion(&events);
        })
    }

    /// Expect the action to be rejected (Then)
    #[must_use]
    pub fn then_error<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&R::Error) + 'static,
    {
        self.error_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set, if the
    /// outcome (success or rejection) differs from what the assertions
    /// expect, if a rejected action modified the state, or if any assertion
    /// fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let action = self.action.expect("Action must be set with when_action()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        let before = state.clone();
        let outcome = self.reducer.reduce(&mut state, action, &env);

        match outcome {
            Ok(effects) => {
                assert!(
                    self.error_assertions.is_empty(),
                    "Expected the action to be rejected, but it succeeded with {effects:?}"
                );
                for assertion in self.state_assertions {
                    assertion(&state);
                }
                for assertion in self.effect_assertions {
                    assertion(&effects);
                }
            },
            Err(error) => {
                assert!(
                    !self.error_assertions.is_empty(),
                    "Expected the action to succeed, but it was rejected: {error:?}"
                );
                assert_eq!(state, before, "Rejected action must leave state unchanged");
                for assertion in self.error_assertions {
                    assertion(&error);
                }
            },
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use hotel_ops_core::effect::Effect;

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if any effect would publish an event.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<Ev: std::fmt::Debug>(effects: &[Effect<Ev>]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of events the effects publish
    ///
    /// # Panics
    ///
    /// Panics if the number of published events doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_published_count<Ev: Clone>(effects: &[Effect<Ev>], expected: usize) {
        let published: usize =
            effects.iter().cloned().map(|effect| effect.into_events().len()).sum();
        assert_eq!(
            published, expected,
            "Expected {expected} published events, but found {published}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotel_ops_core::effect::Effects;
    use hotel_ops_core::smallvec;

    #[derive(Clone, Debug, PartialEq)]
    struct TestState {
        count: i32,
    }

    #[derive(Clone, Debug)]
    enum TestAction {
        Increment,
        Decrement,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum TestEvent {
        Changed(i32),
    }

    #[derive(Debug, PartialEq)]
    struct BelowZero;

    struct TestReducer;

    struct TestEnv;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Event = TestEvent;
        type Environment = TestEnv;
        type Error = BelowZero;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> Result<Effects<TestEvent>, BelowZero> {
            match action {
                TestAction::Increment => {
                    state.count += 1;
                    Ok(smallvec![Effect::Publish(TestEvent::Changed(state.count))])
                },
                TestAction::Decrement => {
                    if state.count == 0 {
                        return Err(BelowZero);
                    }
                    state.count -= 1;
                    Ok(smallvec![Effect::None])
                },
            }
        }
    }

    #[test]
    fn test_reducer_test_increment() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 0 })
            .when_action(TestAction::Increment)
            .then_state(|state| {
                assert_eq!(state.count, 1);
            })
            .then_events(|events| {
                assert_eq!(events, [TestEvent::Changed(1)]);
            })
            .run();
    }

    #[test]
    fn test_reducer_test_decrement() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 5 })
            .when_action(TestAction::Decrement)
            .then_state(|state| {
                assert_eq!(state.count, 4);
            })
            .then_effects(|effects| {
                assertions::assert_no_effects(effects);
            })
            .run();
    }

    #[test]
    fn test_reducer_test_rejection() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 0 })
            .when_action(TestAction::Decrement)
            .then_error(|error| {
                assert_eq!(*error, BelowZero);
            })
            .run();
    }

    #[test]
    #[should_panic(expected = "Expected the action to be rejected")]
    fn test_unexpected_success_fails() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 0 })
            .when_action(TestAction::Increment)
            .then_error(|_| {})
            .run();
    }

    #[test]
    fn test_assertions_published_count() {
        let effects = [
            Effect::Publish(TestEvent::Changed(1)),
            Effect::None,
            Effect::chain(vec![Effect::Publish(TestEvent::Changed(2))]),
        ];
        assertions::assert_published_count(&effects, 2);
        assertions::assert_no_effects::<TestEvent>(&[Effect::None]);
    }
}
