//! Exponential backoff with jitter.

use std::fmt;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Source of uniform random values in `[0, 1)`.
pub trait RandomSource: Send + Sync + fmt::Debug {
    fn next_unit(&self) -> f64;
}

/// Thread-local RNG from `rand`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Always returns the same value. Used to pin jitter in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_unit(&self) -> f64 {
        self.0
    }
}

/// Backoff bounds for one client.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_factor: config.backoff_factor,
            min_delay: config.min_delay(),
            max_delay: config.max_delay(),
            jitter: config.jitter,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (1-indexed) failed attempt.
    ///
    /// `min_delay * factor^(attempt-1)`, scaled by a factor in `[0.5, 1.5]` when
    /// jitter is on, then clamped to `[min_delay, max_delay]`.
    pub fn delay_for(&self, attempt: u32, random: &dyn RandomSource) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let min = self.min_delay.as_nanos() as f64;
        let max = self.max_delay.as_nanos() as f64;
        let mut delay = min * self.backoff_factor.powi(exponent);

        if self.jitter {
            delay *= 0.5 + random.next_unit().clamp(0.0, 1.0);
        }

        if !delay.is_finite() || delay >= max {
            return self.max_delay.max(self.min_delay);
        }
        if delay <= min {
            return self.min_delay;
        }
        Duration::from_nanos(delay.round() as u64)
    }

    /// Total attempts a call may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
