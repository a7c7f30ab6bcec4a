//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to dependency:
//!     → circuit_breaker.rs (admission gate, re-checked before every retry)
//!     → timeouts.rs (attempt deadline + caller cancellation)
//!     → On failure: retries.rs (classify), backoff.rs (how long to wait)
//!     → circuit_breaker.rs (record outcome, open circuit if threshold exceeded)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - Jittered backoff prevents thundering herd
//! - Clock and randomness are injectable so timing is testable
//! - Circuit breaker prevents cascading failures

pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod retries;
pub mod timeouts;

pub use backoff::{FixedRandom, RandomSource, RetryPolicy, ThreadRandom};
pub use circuit_breaker::{AdmissionPermit, BreakerStats, CircuitBreaker, CircuitOpenError, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use retries::Classification;
pub use timeouts::{AttemptScope, Interrupted};
