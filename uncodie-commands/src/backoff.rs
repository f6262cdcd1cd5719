//! Poll interval strategies.

use std::time::Duration;

/// Delay between command lookups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay for every attempt.
    Fixed { delay_ms: u64 },
    /// `base_ms * multiplier^attempt`, capped at `max_ms`.
    Exponential {
        base_ms: u64,
        multiplier: f64,
        max_ms: u64,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            base_ms: 1_000,
            multiplier: 1.5,
            max_ms: 5_000,
        }
    }
}

impl Backoff {
    /// Delay to sleep after the given zero-based attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let ms = match *self {
            Backoff::Fixed { delay_ms } => delay_ms,
            Backoff::Exponential {
                base_ms,
                multiplier,
                max_ms,
            } => {
                let exponent = attempt.min(64) as i32;
                let delay = (base_ms as f64) * multiplier.powi(exponent);
                if delay.is_finite() {
                    (delay as u64).min(max_ms)
                } else {
                    max_ms
                }
            }
        };
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_capped_exponential() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay_for_attempt(0), Duration::from_millis(1_000));
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(1_500));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(2_250));
        assert_eq!(backoff.delay_for_attempt(10), Duration::from_millis(5_000));
        assert_eq!(backoff.delay_for_attempt(u32::MAX), Duration::from_millis(5_000));
    }

    #[test]
    fn test_fixed() {
        let backoff = Backoff::Fixed { delay_ms: 1_500 };
        assert_eq!(backoff.delay_for_attempt(0), backoff.delay_for_attempt(42));
    }
}
