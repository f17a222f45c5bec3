//! Circuit breaker guarding an unreliable external resource.
//!
//! State transitions are a pure function of (state, outcome, failure
//! count) in [`next_state`]; [`CircuitBreaker`] adds the cooldown timer
//! on top of it using an injected [`Clock`].

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::clock::{Clock, SystemClock};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls are rejected until the cooldown elapses.
    Open,
    /// The cooldown elapsed; the next call decides.
    HalfOpen,
}

/// Result of one guarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The call succeeded, or failed in a way that does not count.
    Success,
    /// The call failed and counts toward the threshold.
    Failure,
}

/// The state after a guarded call finishes with `outcome`.
/// `failures` is the consecutive failure count including this call.
#[must_use]
pub const fn next_state(
    state: CircuitState,
    outcome: Outcome,
    failures: u32,
    threshold: u32,
) -> CircuitState {
    match (state, outcome) {
        (_, Outcome::Success) => CircuitState::Closed,
        (CircuitState::HalfOpen | CircuitState::Open, Outcome::Failure) => CircuitState::Open,
        (CircuitState::Closed, Outcome::Failure) => {
            if failures >= threshold {
                CircuitState::Open
            } else {
                CircuitState::Closed
            }
        }
    }
}

/// Breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial call is allowed.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerStats {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive counted failures since the last success.
    pub failure_count: u32,
    /// When an open circuit will admit its next trial call.
    pub next_retry_time: Option<DateTime<Utc>>,
}

/// Error returned by [`CircuitBreaker::execute`] and
/// [`CircuitBreaker::execute_if`].
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the guarded call was not made.
    #[error("Circuit breaker open until {next_retry_time}")]
    Open { next_retry_time: DateTime<Utc> },

    /// The guarded call ran and failed.
    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    next_retry_time: Option<DateTime<Utc>>,
}

/// Failure and cooldown tracking for one named resource.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Creates a closed breaker on the system clock.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                next_retry_time: None,
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.lock();
        CircuitBreakerStats {
            state: inner.state,
            failure_count: inner.failure_count,
            next_retry_time: inner.next_retry_time,
        }
    }

    /// `true` while the circuit is open and its cooldown has not elapsed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        let inner = self.lock();
        inner.state == CircuitState::Open
            && inner
                .next_retry_time
                .is_some_and(|until| self.clock.now() < until)
    }

    /// Admits or rejects a call. An open circuit whose cooldown has
    /// elapsed moves to half-open and admits it.
    fn acquire(&self) -> Result<(), DateTime<Utc>> {
        let mut inner = self.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let now = self.clock.now();
        match inner.next_retry_time {
            Some(until) if now < until => Err(until),
            _ => {
                log::info!("Circuit {}: cooldown elapsed, half-open", self.name);
                inner.state = CircuitState::HalfOpen;
                Ok(())
            }
        }
    }

    /// Records a successful call: resets the failure count and closes the
    /// circuit.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            log::info!("Circuit {}: closed", self.name);
        }
        inner.state = next_state(inner.state, Outcome::Success, 0, self.config.failure_threshold);
        inner.failure_count = 0;
        inner.next_retry_time = None;
    }

    /// Records a failed call, opening the circuit once the threshold is
    /// reached or when a half-open trial fails.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        let next = next_state(
            inner.state,
            Outcome::Failure,
            inner.failure_count,
            self.config.failure_threshold,
        );

        if next == CircuitState::Open {
            let cooldown = TimeDelta::from_std(self.config.cooldown).unwrap_or(TimeDelta::MAX);
            let until = self
                .clock
                .now()
                .checked_add_signed(cooldown)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            log::warn!(
                "Circuit {}: open after {} failure(s), next retry at {until}",
                self.name,
                inner.failure_count
            );
            inner.next_retry_time = Some(until);
        }
        inner.state = next;
    }

    /// Runs `f` through the breaker.
    ///
    /// # Errors
    ///
    /// * [`BreakerError::Open`] if the circuit is open; `f` is not called
    /// * [`BreakerError::Inner`] if `f` fails
    pub async fn execute<T, E, F, Fut>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_if(f, |_| true).await
    }

    /// Like [`Self::execute`], but only errors for which `is_failure`
    /// returns `true` count against the circuit. Any other error means the
    /// resource answered and is recorded as a success.
    ///
    /// # Errors
    ///
    /// * [`BreakerError::Open`] if the circuit is open; `f` is not called
    /// * [`BreakerError::Inner`] if `f` fails
    pub async fn execute_if<T, E, F, Fut, P>(
        &self,
        f: F,
        is_failure: P,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        self.acquire()
            .map_err(|next_retry_time| BreakerError::Open { next_retry_time })?;

        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                if is_failure(&e) {
                    self.record_failure();
                } else {
                    self.record_success();
                }
                Err(BreakerError::Inner(e))
            }
        }
    }
}
