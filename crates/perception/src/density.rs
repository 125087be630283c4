//! Lane density sources
//!
//! Only the north approach carries a real camera; the other three lanes get
//! their vehicle counts from a pluggable density source refreshed on a
//! slower fixed interval.

use crate::PerceptionError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Provider of a vehicle-count estimate for one junction approach
pub trait DensitySource: Send {
    /// Current estimated vehicle count for the lane
    fn sample(&mut self) -> Result<u32, PerceptionError>;

    /// How often the estimate should be refreshed (seconds)
    fn refresh_interval_secs(&self) -> f64 {
        10.0
    }
}

/// Random-walk simulated density for non-instrumented lanes
pub struct SimulatedDensity {
    rng: StdRng,
    current: u32,
    max_count: u32,
}

impl SimulatedDensity {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            current: 0,
            max_count: 30,
        }
    }
}

impl DensitySource for SimulatedDensity {
    fn sample(&mut self) -> Result<u32, PerceptionError> {
        // Random walk keeps successive samples plausible instead of jumping
        let step = self.rng.gen_range(-4i32..=6);
        self.current = self
            .current
            .saturating_add_signed(step)
            .min(self.max_count);
        debug!("Simulated density sample: {}", self.current);
        Ok(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_stay_bounded() {
        let mut source = SimulatedDensity::new(7);
        for _ in 0..200 {
            let count = source.sample().unwrap();
            assert!(count <= 30);
        }
    }

    #[test]
    fn test_default_refresh_interval() {
        let source = SimulatedDensity::new(7);
        assert_eq!(source.refresh_interval_secs(), 10.0);
    }
}
