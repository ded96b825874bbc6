//! Bounded retry policies with blocking backoff.

use std::time::Duration;

use rand::prelude::*;
use tracing::debug;

/// How long to wait between attempts and how many attempts to allow.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryPolicy {
    /// The same delay before every retry.
    Constant { delay: Duration, max_attempts: u32 },

    /// Exponential growth with uniform jitter, limited by a cap.
    ExpRandLimited {
        init: Duration,
        factor: f64,
        jitter: f64,
        cap: Duration,
        max_attempts: u32,
    },
}

/// Progress of one request through its retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
}

impl RetryState {
    /// The attempt currently underway, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl RetryPolicy {
    pub fn constant_bounded_ms(delay_ms: u64, max_attempts: u32) -> Self {
        Self::Constant {
            delay: Duration::from_millis(delay_ms),
            max_attempts,
        }
    }

    pub fn exp_rand_limit_bounded_ms(
        init_ms: u64,
        factor: f64,
        jitter: f64,
        cap_ms: u64,
        max_attempts: u32,
    ) -> Self {
        Self::ExpRandLimited {
            init: Duration::from_millis(init_ms),
            factor,
            jitter,
            cap: Duration::from_millis(cap_ms),
            max_attempts,
        }
    }

    /// State for a fresh request, before any retries.
    pub fn init(&self) -> RetryState {
        RetryState { attempt: 1 }
    }

    /// Sleeps the backoff and advances to the next attempt, or returns `None`
    /// once the attempt budget is spent.
    pub async fn await_next(&self, state: RetryState) -> Option<RetryState> {
        if state.attempt >= self.max_attempts() {
            return None;
        }

        let delay = self.delay_for(state.attempt);
        debug!(attempt = state.attempt, delay_ms = delay.as_millis() as u64, "Backing off");
        tokio::time::sleep(delay).await;

        Some(RetryState {
            attempt: state.attempt + 1,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::Constant { max_attempts, .. } => *max_attempts,
            Self::ExpRandLimited { max_attempts, .. } => *max_attempts,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Constant { delay, .. } => *delay,
            Self::ExpRandLimited {
                init,
                factor,
                jitter,
                cap,
                ..
            } => {
                let exp = init.as_secs_f64() * factor.powi(attempt.saturating_sub(1) as i32);
                let spread = thread_rng().gen_range(-jitter..=*jitter);
                let delay = Duration::from_secs_f64((exp * (1.0 + spread)).max(0.0));
                delay.min(*cap)
            }
        }
    }
}
