//! Jittered delays between consecutive fetches.

use std::time::Duration;

use rand::{Rng, rng};

/// Sleeps a uniformly random duration in `[min, max]` seconds between
/// fetches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacer {
    min_secs: f64,
    max_secs: f64,
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(8.0, 12.0)
    }
}

impl Pacer {
    /// Creates a pacer for the given range. A reversed range is swapped and
    /// negative bounds are clamped to zero.
    #[must_use]
    pub fn new(min_secs: f64, max_secs: f64) -> Self {
        let min_secs = min_secs.max(0.0);
        let max_secs = max_secs.max(0.0);
        if min_secs <= max_secs {
            Self { min_secs, max_secs }
        } else {
            Self {
                min_secs: max_secs,
                max_secs: min_secs,
            }
        }
    }

    /// A pacer that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Draws the next delay.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        if self.max_secs <= 0.0 {
            return Duration::ZERO;
        }
        let secs = if self.min_secs < self.max_secs {
            rng().random_range(self.min_secs..=self.max_secs)
        } else {
            self.min_secs
        };
        Duration::from_secs_f64(secs)
    }

    /// Sleeps for [`Self::next_delay`].
    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            log::debug!("Waiting {delay:.1?} before next request");
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_stay_within_range() {
        let pacer = Pacer::new(8.0, 12.0);
        for _ in 0..200 {
            let delay = pacer.next_delay().as_secs_f64();
            assert!((8.0..=12.0).contains(&delay), "{delay} out of range");
        }
    }

    #[test]
    fn reversed_range_is_normalized() {
        assert_eq!(Pacer::new(5.0, 2.0), Pacer::new(2.0, 5.0));
    }

    #[test]
    fn fixed_range_is_exact() {
        assert_eq!(Pacer::new(3.0, 3.0).next_delay(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_pacer_does_not_sleep() {
        let start = tokio::time::Instant::now();
        Pacer::disabled().pause().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
