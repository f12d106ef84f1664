//! Pacing between a worker's actions.
//!
//! A pause is a steady base delay followed by uniform random jitter. The two
//! parts are slept separately and either sleep ends early when the campaign
//! stops.

use std::time::Duration;

use rand::Rng;

use crate::signal::RunningSignal;

/// Base pause plus uniform jitter in `[0, jitter_bound)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    base: Duration,
    jitter_bound: Duration,
}

impl Pacing {
    pub fn new(base: Duration, jitter_bound: Duration) -> Self {
        Self { base, jitter_bound }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn jitter_bound(&self) -> Duration {
        self.jitter_bound
    }

    /// Draws one jitter sample, uniform in `[0, jitter_bound)`.
    ///
    /// A zero bound yields zero without consuming randomness.
    pub fn jitter<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.jitter_bound.is_zero() {
            return Duration::ZERO;
        }
        let bound = u64::try_from(self.jitter_bound.as_nanos()).unwrap_or(u64::MAX);
        Duration::from_nanos(rng.random_range(0..bound))
    }

    /// Sleeps the base pause, then a fresh jitter sample.
    ///
    /// Returns the delay that was planned. A stop during either sleep ends the
    /// pause early; the caller re-checks the flag.
    pub async fn pause<R: Rng>(&self, rng: &mut R, signal: &mut RunningSignal) -> Duration {
        let jitter = self.jitter(rng);

        if signal.sleep(self.base).await {
            signal.sleep(jitter).await;
        }

        self.base + jitter
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tokio::time::Instant;

    use super::*;
    use crate::signal::RunningFlag;

    #[test]
    fn test_zero_bound_disables_jitter() {
        let pacing = Pacing::new(Duration::from_millis(100), Duration::ZERO);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            assert_eq!(pacing.jitter(&mut rng), Duration::ZERO);
        }
    }

    #[test]
    fn test_jitter_spreads_across_bound() {
        let pacing = Pacing::new(Duration::ZERO, Duration::from_millis(50));
        let mut rng = StdRng::seed_from_u64(42);

        // Ten 5ms buckets, 10k samples: each bucket expects 1000.
        let mut buckets = [0usize; 10];
        for _ in 0..10_000 {
            let sample = pacing.jitter(&mut rng);
            assert!(sample < Duration::from_millis(50));
            buckets[(sample.as_millis() / 5) as usize] += 1;
        }

        for (index, count) in buckets.iter().enumerate() {
            assert!(
                (800..=1200).contains(count),
                "bucket {index} has {count} samples"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_without_jitter_is_deterministic() {
        let flag = RunningFlag::new();
        flag.start();
        let mut signal = flag.signal();
        let mut rng = StdRng::seed_from_u64(1);
        let pacing = Pacing::new(Duration::from_millis(100), Duration::ZERO);

        for _ in 0..5 {
            let started = Instant::now();
            let planned = pacing.pause(&mut rng, &mut signal).await;
            let elapsed = started.elapsed();

            assert_eq!(planned, Duration::from_millis(100));
            assert!(elapsed >= Duration::from_millis(100));
            assert!(elapsed < Duration::from_millis(110));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_includes_jitter() {
        let flag = RunningFlag::new();
        flag.start();
        let mut signal = flag.signal();
        let mut rng = StdRng::seed_from_u64(3);
        let pacing = Pacing::new(Duration::from_millis(10), Duration::from_millis(50));

        let started = Instant::now();
        let planned = pacing.pause(&mut rng, &mut signal).await;
        let elapsed = started.elapsed();

        assert!(planned >= Duration::from_millis(10));
        assert!(planned < Duration::from_millis(60));
        assert!(elapsed + Duration::from_millis(1) >= planned);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_returns_early_when_stopped() {
        let flag = RunningFlag::new();
        flag.start();
        flag.stop();
        let mut signal = flag.signal();
        let mut rng = StdRng::seed_from_u64(5);
        let pacing = Pacing::new(Duration::from_secs(60), Duration::from_secs(60));

        let started = Instant::now();
        pacing.pause(&mut rng, &mut signal).await;
        assert!(started.elapsed() < Duration::from_millis(1));
    }

    proptest! {
        #[test]
        fn prop_jitter_below_bound(seed in any::<u64>(), bound_ms in 1u64..10_000) {
            let pacing = Pacing::new(Duration::ZERO, Duration::from_millis(bound_ms));
            let mut rng = StdRng::seed_from_u64(seed);
            prop_assert!(pacing.jitter(&mut rng) < Duration::from_millis(bound_ms));
        }
    }
}
