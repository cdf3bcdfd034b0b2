use std::fmt::Debug;
use std::time::Duration;

use tracing::debug;

use crate::time::{Clock, SystemClock};
use crate::util::elapsed_at_least;

/// Callback invoked after a transition with `(new_state, previous_state)`
pub type TransitionHandler<S> = Box<dyn FnMut(S, S) + Send>;

/// Timed state tracker for gating node behaviour
///
/// The machine knows nothing about the meaning of its states: callers pick
/// the codes (plain integers or their own enum) and the transitions between
/// them. It only remembers where it is, where it came from, when it got
/// there, and whether it has been there too long.
pub struct StateMachine<S, C = SystemClock> {
    current: S,
    previous: S,
    entered_at: u64,
    timeout: Duration,
    timed_out: bool,
    clock: C,
    on_transition: Option<TransitionHandler<S>>,
}

impl<S> StateMachine<S, SystemClock>
where
    S: Copy + PartialEq + Debug,
{
    /// Creates a state machine on the system clock, resting in `initial`
    pub fn new(initial: S, timeout: Duration) -> Self {
        Self::with_clock(initial, timeout, SystemClock::new())
    }
}

impl<S, C> StateMachine<S, C>
where
    S: Copy + PartialEq + Debug,
    C: Clock,
{
    /// Creates a state machine reading time from `clock`
    ///
    /// `initial` doubles as the previous state until the first transition.
    pub fn with_clock(initial: S, timeout: Duration, clock: C) -> Self {
        let entered_at = clock.now_millis();
        StateMachine {
            current: initial,
            previous: initial,
            entered_at,
            timeout,
            timed_out: false,
            clock,
            on_transition: None,
        }
    }

    /// Registers the transition callback, replacing any previous one
    pub fn set_transition_handler<F>(&mut self, handler: F)
    where
        F: FnMut(S, S) + Send + 'static,
    {
        self.on_transition = Some(Box::new(handler));
    }

    /// Removes the transition callback
    pub fn clear_transition_handler(&mut self) {
        self.on_transition = None;
    }

    /// Moves to `state`
    ///
    /// Returns false, changing nothing, if already in `state`.
    pub fn transition_to(&mut self, state: S) -> bool {
        debug!(requested = ?state, "Request to transition state");

        if state == self.current {
            return false;
        }

        self.previous = self.current;
        self.current = state;
        self.timed_out = false;
        self.entered_at = self.clock.now_millis();

        if let Some(handler) = self.on_transition.as_mut() {
            handler(self.current, self.previous);
        }

        debug!(current = ?self.current, previous = ?self.previous, "State changed");
        true
    }

    /// Returns whether the timeout has elapsed in the current state
    ///
    /// Once it has, the answer stays true until the next transition, even if
    /// the clock later reads earlier. The latch is set by this check.
    pub fn is_timed_out(&mut self) -> bool {
        if self.timed_out {
            return true;
        }

        if elapsed_at_least(self.clock.now_millis(), self.entered_at, self.timeout) {
            self.timed_out = true;
        }

        self.timed_out
    }

    /// Returns the current state
    pub fn current_state(&self) -> S {
        self.current
    }

    /// Returns the state before the last transition
    pub fn previous_state(&self) -> S {
        self.previous
    }

    /// Returns when the current state was entered, in clock milliseconds
    pub fn state_entry_time(&self) -> u64 {
        self.entered_at
    }

    /// Returns the configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns how long the machine has been in the current state
    pub fn time_in_state(&self) -> Duration {
        Duration::from_millis(self.clock.now_millis().saturating_sub(self.entered_at))
    }
}

impl<S: Debug, C> Debug for StateMachine<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current)
            .field("previous", &self.previous)
            .field("entered_at", &self.entered_at)
            .field("timeout", &self.timeout)
            .field("timed_out", &self.timed_out)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Phase {
        Idle,
        Connecting,
        Connected,
    }

    fn machine(start: u64) -> (StateMachine<Phase, ManualClock>, ManualClock) {
        let clock = ManualClock::new(start);
        let machine = StateMachine::with_clock(Phase::Idle, Duration::from_millis(100), clock.clone());
        (machine, clock)
    }

    #[test]
    fn test_transition_updates_states() {
        let (mut state, clock) = machine(1_000);
        clock.advance(40);

        assert!(state.transition_to(Phase::Connecting));
        assert_eq!(state.current_state(), Phase::Connecting);
        assert_eq!(state.previous_state(), Phase::Idle);
        assert_eq!(state.state_entry_time(), 1_040);

        assert!(state.transition_to(Phase::Connected));
        assert_eq!(state.previous_state(), Phase::Connecting);
    }

    #[test]
    fn test_same_state_is_noop() {
        let (mut state, clock) = machine(0);
        state.transition_to(Phase::Connecting);
        clock.advance(30);

        assert!(!state.transition_to(Phase::Connecting));
        assert_eq!(state.previous_state(), Phase::Idle);
        assert_eq!(state.state_entry_time(), 0);
    }

    #[test]
    fn test_timeout_latches() {
        let (mut state, clock) = machine(500);
        state.transition_to(Phase::Connecting);
        assert!(!state.is_timed_out());

        clock.advance(99);
        assert!(!state.is_timed_out());

        clock.advance(1);
        assert!(state.is_timed_out());

        // Rewinding the clock does not clear the latch
        clock.set(0);
        assert!(state.is_timed_out());

        // Only a transition does
        state.transition_to(Phase::Connected);
        assert!(!state.is_timed_out());
    }

    #[test]
    fn test_unchecked_timeout_does_not_latch() {
        let (mut state, clock) = machine(0);
        clock.advance(200);
        clock.set(50);
        assert!(!state.is_timed_out());
    }

    #[test]
    fn test_transition_handler() {
        let (mut state, _clock) = machine(0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        state.set_transition_handler(move |to, from| sink.lock().unwrap().push((to, from)));

        state.transition_to(Phase::Connecting);
        state.transition_to(Phase::Connecting);
        state.transition_to(Phase::Connected);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (Phase::Connecting, Phase::Idle),
                (Phase::Connected, Phase::Connecting),
            ]
        );

        state.clear_transition_handler();
        state.transition_to(Phase::Idle);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_integer_states() {
        let clock = ManualClock::new(0);
        let mut state = StateMachine::with_clock(0i32, Duration::from_secs(10), &clock);
        assert!(state.transition_to(3));
        clock.advance(10_000);
        assert!(state.is_timed_out());
        assert_eq!(state.time_in_state(), Duration::from_secs(10));
    }
}
