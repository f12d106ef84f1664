//! Network condition simulation

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Latency and failure injection applied to every simulated round trip.
///
/// Cloned handles share one seeded RNG, so a run with a fixed seed and a
/// fixed call order reproduces the same delays and failures.
#[derive(Debug, Clone)]
pub struct NetworkConditions {
    latency: Range<u64>,
    failure_rate: f64,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl Default for NetworkConditions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// What one simulated round trip should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTrip {
    pub latency: Duration,
    pub fail: bool,
}

impl NetworkConditions {
    /// Perfect network: no latency and no failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns builder for customizing network conditions.
    pub fn builder() -> NetworkConditionsBuilder {
        NetworkConditionsBuilder::new()
    }

    pub fn latency(&self) -> Range<u64> {
        self.latency.clone()
    }

    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }

    /// Draws latency and failure for the next round trip.
    pub fn next_round_trip(&self) -> RoundTrip {
        let mut rng = self.rng.lock();

        let latency_ms = if self.latency.start < self.latency.end {
            rng.random_range(self.latency.clone())
        } else {
            self.latency.start
        };
        let fail = self.failure_rate > 0.0 && rng.random::<f64>() < self.failure_rate;

        RoundTrip {
            latency: Duration::from_millis(latency_ms),
            fail,
        }
    }

    /// Sleeps the simulated latency. Returns true if the call should fail.
    pub async fn round_trip(&self) -> bool {
        let trip = self.next_round_trip();
        if !trip.latency.is_zero() {
            tokio::time::sleep(trip.latency).await;
        }
        trip.fail
    }
}

/// Builder for configuring network simulation parameters.
pub struct NetworkConditionsBuilder {
    latency: Range<u64>,
    failure_rate: f64,
    seed: u64,
}

impl NetworkConditionsBuilder {
    fn new() -> Self {
        Self {
            latency: 0..0,
            failure_rate: 0.0,
            seed: 42,
        }
    }

    /// Sets latency range in milliseconds.
    pub fn latency(mut self, range: Range<u64>) -> Self {
        self.latency = range;
        self
    }

    /// Sets the probability (0.0-1.0) that a call fails.
    pub fn failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> NetworkConditions {
        NetworkConditions {
            latency: self.latency,
            failure_rate: self.failure_rate,
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(self.seed))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_perfect_network() {
        let network = NetworkConditions::new();
        for _ in 0..100 {
            assert_eq!(
                network.next_round_trip(),
                RoundTrip {
                    latency: Duration::ZERO,
                    fail: false
                }
            );
        }
    }

    #[test]
    fn test_latency_stays_in_range() {
        let network = NetworkConditions::builder().latency(100..200).build();
        for _ in 0..1000 {
            let latency = network.next_round_trip().latency;
            assert!(latency >= Duration::from_millis(100));
            assert!(latency < Duration::from_millis(200));
        }
    }

    #[test]
    fn test_failure_rate_extremes() {
        let never = NetworkConditions::builder().failure_rate(0.0).build();
        let always = NetworkConditions::builder().failure_rate(1.0).build();
        for _ in 0..100 {
            assert!(!never.next_round_trip().fail);
            assert!(always.next_round_trip().fail);
        }
    }

    #[test]
    fn test_failure_rate_is_approximate() {
        let network = NetworkConditions::builder().failure_rate(0.25).seed(7).build();
        let failures = (0..10_000)
            .filter(|_| network.next_round_trip().fail)
            .count();
        assert!((2_200..=2_800).contains(&failures), "{failures} failures");
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let build = || {
            NetworkConditions::builder()
                .latency(10..50)
                .failure_rate(0.5)
                .seed(99)
                .build()
        };
        let (first, second) = (build(), build());
        for _ in 0..100 {
            assert_eq!(first.next_round_trip(), second.next_round_trip());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_sleeps_latency() {
        let network = NetworkConditions::builder().latency(50..51).build();

        let start = tokio::time::Instant::now();
        network.round_trip().await;
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(60));
    }
}
