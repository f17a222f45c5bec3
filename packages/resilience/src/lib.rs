#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resilience primitives for calls against the external dashboard.
//!
//! [`CircuitBreaker`] tracks sustained failure of a resource across many
//! calls and fails fast while it is open. [`execute_with_retry`] absorbs
//! transient failure of a single call with bounded exponential backoff.
//! Both report outcomes as values; neither panics on failure.

pub mod breaker;
pub mod clock;
pub mod retry;

pub use breaker::{
    BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use retry::{
    RetryOptions, RetryResult, backoff_delay, execute_with_retry, execute_with_retry_if,
};
