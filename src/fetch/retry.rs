// src/fetch/retry.rs
//! Retry policy and the retry state machine.
//!
//! The machine is pure: it never sleeps and never performs I/O. The caller
//! feeds it one attempt outcome at a time and acts on the returned state
//! (perform another attempt, wait `delay`, or stop). The same machine can be
//! driven by blocking sleeps, timers, or async suspension.

use std::time::Duration;

use super::FailureKind;

/// Retry tuning: attempt ceiling and exponential backoff bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 behave as 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff after the `attempt`-th failed attempt (1-based):
    /// `base * 2^(attempt-1)`, capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let factor = 1u32.checked_shl(exp).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay to apply after a retryable failure. A server-provided hint wins
    /// over the computed backoff; both are capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        match hint {
            Some(h) => h.min(self.max_delay),
            None => self.backoff_delay(attempt),
        }
    }

    fn ceiling(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Classified result of one attempt, as seen by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure {
        kind: FailureKind,
        retry_after: Option<Duration>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// About to perform attempt number `attempt` (1-based).
    Attempting { attempt: u32 },
    /// Attempt `attempt` failed with a retryable `kind`; wait `delay` first.
    BackingOff {
        attempt: u32,
        kind: FailureKind,
        delay: Duration,
    },
    /// No further attempts: either the failure was terminal or the ceiling was reached.
    Exhausted { attempt: u32, kind: FailureKind },
    Succeeded { attempt: u32 },
}

impl RetryState {
    pub fn start() -> Self {
        Self::Attempting { attempt: 1 }
    }

    pub fn attempt(&self) -> u32 {
        match *self {
            Self::Attempting { attempt }
            | Self::BackingOff { attempt, .. }
            | Self::Exhausted { attempt, .. }
            | Self::Succeeded { attempt } => attempt,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted { .. } | Self::Succeeded { .. })
    }

    /// Transition after an attempt finished. Only meaningful from `Attempting`;
    /// other states are returned unchanged.
    pub fn on_outcome(self, policy: &RetryPolicy, outcome: AttemptOutcome) -> Self {
        let Self::Attempting { attempt } = self else {
            return self;
        };
        match outcome {
            AttemptOutcome::Success => Self::Succeeded { attempt },
            AttemptOutcome::Failure { kind, .. } if !kind.is_retryable() => {
                Self::Exhausted { attempt, kind }
            }
            AttemptOutcome::Failure { kind, .. } if attempt >= policy.ceiling() => {
                Self::Exhausted { attempt, kind }
            }
            AttemptOutcome::Failure { kind, retry_after } => Self::BackingOff {
                attempt,
                kind,
                delay: policy.delay_for(attempt, retry_after),
            },
        }
    }

    /// Leave `BackingOff` once the delay has elapsed.
    pub fn resume(self) -> Self {
        match self {
            Self::BackingOff { attempt, .. } => Self::Attempting {
                attempt: attempt + 1,
            },
            other => other,
        }
    }
}
