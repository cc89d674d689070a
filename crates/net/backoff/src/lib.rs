//! Capped exponential backoff for reconnection attempts.
//!
//! The delay before the first attempt is the configured initial delay. Every
//! recorded attempt doubles the delay, saturating at the configured maximum:
//!
//! ```text
//! D, min(2D, M), min(4D, M), ...
//! ```
//!
//! A retry limit of zero means unlimited attempts. With a limit of `N`, the
//! `N`th recorded attempt exhausts the policy and no further delay is handed
//! out until [`Backoff::reset`] is called.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default delay before the first attempt.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1_000);

/// Default ceiling for the delay between attempts.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Backoff policy parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Maximum number of attempts. `0` means unlimited.
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_retries: 0,
        }
    }
}

impl BackoffConfig {
    pub fn new(initial_delay: Duration, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_retries,
        }
    }

    /// True if the policy never runs out of attempts.
    pub fn is_unlimited(&self) -> bool {
        self.max_retries == 0
    }

    /// The delay sequence this policy produces, in attempt order.
    ///
    /// Finite when a retry limit is set, infinite otherwise.
    pub fn delays(&self) -> Delays {
        Delays {
            backoff: Backoff::new(*self),
        }
    }
}

/// Result of recording one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Another attempt is allowed after the given delay.
    Retry { attempt: u32, next_delay: Duration },
    /// That was the last permitted attempt.
    Exhausted { attempt: u32 },
}

impl AttemptOutcome {
    pub fn attempt(&self) -> u32 {
        match self {
            Self::Retry { attempt, .. } | Self::Exhausted { attempt } => *attempt,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Mutable backoff state for one reconnection episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    config: BackoffConfig,
    attempts: u32,
    current_delay: Duration,
    exhausted: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            current_delay: config.initial_delay.min(config.max_delay),
            config,
            attempts: 0,
            exhausted: false,
        }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Replace the policy and start over.
    pub fn reconfigure(&mut self, config: BackoffConfig) {
        *self = Self::new(config);
    }

    /// Attempts recorded since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay to wait before the next attempt.
    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Record that an attempt is being made now.
    ///
    /// Returns `None` once the policy is exhausted; the attempt counter does
    /// not move past the retry limit.
    pub fn record_attempt(&mut self) -> Option<AttemptOutcome> {
        if self.exhausted {
            return None;
        }

        self.attempts = self.attempts.saturating_add(1);

        if !self.config.is_unlimited() && self.attempts >= self.config.max_retries {
            self.exhausted = true;
            return Some(AttemptOutcome::Exhausted {
                attempt: self.attempts,
            });
        }

        self.current_delay = self
            .current_delay
            .saturating_mul(2)
            .min(self.config.max_delay);

        Some(AttemptOutcome::Retry {
            attempt: self.attempts,
            next_delay: self.current_delay,
        })
    }

    /// Back to the initial delay with zero attempts.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.exhausted = false;
        self.current_delay = self.config.initial_delay.min(self.config.max_delay);
    }
}

/// Iterator over the delays of a [`BackoffConfig`].
#[derive(Debug, Clone)]
pub struct Delays {
    backoff: Backoff,
}

impl Iterator for Delays {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.backoff.is_exhausted() {
            return None;
        }
        let delay = self.backoff.current_delay();
        self.backoff.record_attempt()?;
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_doubling_until_ceiling() {
        let config = BackoffConfig::new(ms(1_000), ms(30_000), 0);
        let delays: Vec<_> = config.delays().take(7).collect();
        assert_eq!(
            delays,
            vec![
                ms(1_000),
                ms(2_000),
                ms(4_000),
                ms(8_000),
                ms(16_000),
                ms(30_000),
                ms(30_000)
            ]
        );
    }

    #[test]
    fn test_retry_limit_stops_attempts() {
        let mut backoff = Backoff::new(BackoffConfig::new(ms(10), ms(100), 3));

        assert_eq!(
            backoff.record_attempt(),
            Some(AttemptOutcome::Retry {
                attempt: 1,
                next_delay: ms(20)
            })
        );
        assert_eq!(backoff.record_attempt().map(|o| o.attempt()), Some(2));
        assert_eq!(
            backoff.record_attempt(),
            Some(AttemptOutcome::Exhausted { attempt: 3 })
        );

        // Counter stays at the limit
        assert_eq!(backoff.record_attempt(), None);
        assert_eq!(backoff.attempts(), 3);
        assert!(backoff.is_exhausted());
    }

    #[test]
    fn test_reset_restores_initial_delay() {
        let mut backoff = Backoff::new(BackoffConfig::new(ms(50), ms(400), 0));
        for _ in 0..5 {
            backoff.record_attempt();
        }
        assert_eq!(backoff.current_delay(), ms(400));

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.current_delay(), ms(50));
        assert!(!backoff.is_exhausted());
    }

    #[test]
    fn test_initial_delay_above_max_is_clamped() {
        let backoff = Backoff::new(BackoffConfig::new(ms(500), ms(100), 0));
        assert_eq!(backoff.current_delay(), ms(100));
    }

    #[test]
    fn test_finite_schedule_length() {
        let config = BackoffConfig::new(ms(1), ms(8), 4);
        assert_eq!(config.delays().count(), 4);
    }

    proptest! {
        #[test]
        fn prop_delays_monotonic_and_bounded(
            initial in 1u64..10_000,
            extra in 0u64..100_000,
            retries in 0u32..20,
        ) {
            let max = initial + extra;
            let config = BackoffConfig::new(ms(initial), ms(max), retries);

            let delays: Vec<_> = config.delays().take(40).collect();
            prop_assert_eq!(delays.first().copied(), Some(ms(initial)));

            for pair in delays.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
                prop_assert_eq!(pair[1], (pair[0] * 2).min(ms(max)));
            }
            for delay in &delays {
                prop_assert!(*delay <= ms(max));
            }
            if retries > 0 {
                prop_assert_eq!(delays.len(), retries as usize);
            }
        }
    }
}
