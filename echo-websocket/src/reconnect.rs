//! Reconnection back-off policy.
//!
//! The policy is a pure calculation over the attempt number and the
//! [`ReconnectionConfig`]; scheduling the wait is the session's job.
//!
//! ```
//! use echo_websocket::config::ReconnectionConfig;
//! use echo_websocket::reconnect::{ExponentialBackoff, ReconnectionStrategy};
//! use std::time::Duration;
//!
//! let policy = ExponentialBackoff::new(ReconnectionConfig {
//!     max_retries: 3,
//!     initial_delay_ms: 1000,
//!     max_delay_ms: 5000,
//!     backoff_multiplier: 2.0,
//!     ..ReconnectionConfig::DEFAULT
//! });
//!
//! assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(1000)));
//! assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(2000)));
//! assert_eq!(policy.delay_for_attempt(3), Some(Duration::from_millis(4000)));
//! assert_eq!(policy.delay_for_attempt(4), None);
//! ```

// Delays are well inside f64's exact integer range
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use crate::close_code::CloseCode;
use crate::config::ReconnectionConfig;
use echo_core::error::WebSocketError;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Why a connection ended, as seen by the reconnect decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectCause {
    /// The transport failed or the heartbeat timed out.
    Failure(WebSocketError),
    /// The server closed the connection.
    RemoteClose {
        /// Close code sent by the server.
        code: u16,
    },
    /// The caller closed the connection.
    LocalClose,
}

/// Decides whether and when to reconnect.
pub trait ReconnectionStrategy: Send + Sync + std::fmt::Debug {
    /// Base delay before the given one-based attempt, or `None` to give up.
    fn delay_for_attempt(&self, attempt: u32) -> Option<Duration>;

    /// Delay actually scheduled for the attempt. Defaults to the base delay.
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        self.delay_for_attempt(attempt)
    }

    /// Whether a disconnect with this cause should trigger a reconnect at all.
    fn should_reconnect(&self, cause: &DisconnectCause) -> bool;

    /// Maximum number of attempts before giving up.
    fn max_retries(&self) -> u32;
}

/// Exponential back-off capped at `max_delay_ms`, with optional jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: ReconnectionConfig,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(ReconnectionConfig::DEFAULT)
    }
}

impl ExponentialBackoff {
    /// Creates a policy from the reconnection settings.
    #[must_use]
    pub fn new(config: ReconnectionConfig) -> Self {
        Self { config }
    }

    /// Returns the underlying settings.
    #[must_use]
    pub fn config(&self) -> &ReconnectionConfig {
        &self.config
    }

    fn base_delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        // delays never shrink, even for settings that skipped validation
        let multiplier = self.config.backoff_multiplier.max(1.0);
        let delay = self.config.initial_delay_ms as f64 * multiplier.powi(exponent);
        delay.min(self.config.max_delay_ms as f64) as u64
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if !self.config.enabled || attempt > self.config.max_retries {
            return None;
        }
        Some(Duration::from_millis(self.base_delay_ms(attempt)))
    }

    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        let base = self.delay_for_attempt(attempt)?;
        if self.config.jitter_factor <= 0.0 {
            return Some(base);
        }

        let base_ms = base.as_millis() as u64;
        let max_jitter = (base_ms as f64 * self.config.jitter_factor) as u64;
        let jitter = rand::thread_rng().gen_range(0..=max_jitter);
        let delay_ms = base_ms.saturating_add(jitter).min(self.config.max_delay_ms);

        debug!(attempt, base_ms, delay_ms, "Calculated reconnect delay");
        Some(Duration::from_millis(delay_ms))
    }

    fn should_reconnect(&self, cause: &DisconnectCause) -> bool {
        if !self.config.enabled {
            return false;
        }
        match cause {
            DisconnectCause::LocalClose => false,
            DisconnectCause::RemoteClose { code } => {
                let code = CloseCode(*code);
                if code.is_normal() && !self.config.reconnect_on_close {
                    false
                } else if code.is_retryable() {
                    true
                } else {
                    self.config.reconnect_on_close
                }
            }
            DisconnectCause::Failure(_) => self.config.reconnect_on_failure,
        }
    }

    fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32, initial: u64, max: u64, multiplier: f64) -> ExponentialBackoff {
        ExponentialBackoff::new(ReconnectionConfig {
            max_retries,
            initial_delay_ms: initial,
            max_delay_ms: max,
            backoff_multiplier: multiplier,
            ..ReconnectionConfig::DEFAULT
        })
    }

    #[test]
    fn test_backoff_sequence() {
        let policy = policy(3, 1000, 5000, 2.0);
        let delays: Vec<_> = (1..=4)
            .map(|attempt| policy.delay_for_attempt(attempt).map(|d| d.as_millis()))
            .collect();
        assert_eq!(delays, vec![Some(1000), Some(2000), Some(4000), None]);
    }

    #[test]
    fn test_give_up_beyond_max_retries() {
        let policy = policy(5, 100, 1000, 2.0);
        for attempt in 6..50 {
            assert_eq!(policy.delay_for_attempt(attempt), None);
        }
    }

    #[test]
    fn test_bounded_and_non_decreasing() {
        let policy = policy(40, 250, 60_000, 1.7);
        let mut previous = Duration::ZERO;
        for attempt in 1..=40 {
            let delay = policy.delay_for_attempt(attempt).unwrap();
            assert!(delay <= Duration::from_millis(60_000));
            assert!(delay >= previous);
            previous = delay;
        }
        assert_eq!(previous, Duration::from_millis(60_000));
    }

    #[test]
    fn test_multiplier_below_one_never_shrinks_delay() {
        let policy = policy(5, 1000, 30_000, 0.5);
        for attempt in 1..=5 {
            assert_eq!(
                policy.delay_for_attempt(attempt),
                Some(Duration::from_millis(1000))
            );
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = policy(u32::MAX, 1000, 30_000, 2.0);
        assert_eq!(
            policy.delay_for_attempt(u32::MAX),
            Some(Duration::from_millis(30_000))
        );
    }

    #[test]
    fn test_disabled_never_reconnects() {
        let policy = ExponentialBackoff::new(ReconnectionConfig::NONE);
        assert_eq!(policy.delay_for_attempt(1), None);
        assert!(!policy.should_reconnect(&DisconnectCause::Failure(
            WebSocketError::timeout("pong")
        )));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = ExponentialBackoff::new(ReconnectionConfig {
            initial_delay_ms: 1000,
            max_delay_ms: 1300,
            jitter_factor: 0.5,
            ..ReconnectionConfig::DEFAULT
        });
        for _ in 0..100 {
            let delay = policy.next_delay(1).unwrap();
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(1300));
        }
    }

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let policy = ExponentialBackoff::default();
        assert_eq!(policy.next_delay(2), policy.delay_for_attempt(2));
    }

    #[test]
    fn test_should_reconnect_rules() {
        let policy = ExponentialBackoff::default();
        assert!(!policy.should_reconnect(&DisconnectCause::LocalClose));
        assert!(policy.should_reconnect(&DisconnectCause::RemoteClose { code: 1000 }));
        assert!(policy.should_reconnect(&DisconnectCause::Failure(
            WebSocketError::connection_failed("refused")
        )));

        let close_off = ExponentialBackoff::new(ReconnectionConfig {
            reconnect_on_close: false,
            ..ReconnectionConfig::DEFAULT
        });
        assert!(!close_off.should_reconnect(&DisconnectCause::RemoteClose { code: 1000 }));
        assert!(!close_off.should_reconnect(&DisconnectCause::RemoteClose { code: 1008 }));
        assert!(close_off.should_reconnect(&DisconnectCause::RemoteClose { code: 1012 }));

        let failure_off = ExponentialBackoff::new(ReconnectionConfig {
            reconnect_on_failure: false,
            ..ReconnectionConfig::DEFAULT
        });
        assert!(!failure_off.should_reconnect(&DisconnectCause::Failure(
            WebSocketError::timeout("heartbeat")
        )));
    }
}
