//! Green-duration strategies
//!
//! One pure signature (vehicle count -> green seconds) behind a trait, with
//! two interchangeable implementations: fuzzy inference and a deterministic
//! linear fallback. Both are monotonically non-decreasing in count and
//! clamp to the same [min_green, max_green] window.

use tracing::debug;

/// Maps a lane's vehicle count to a green duration in seconds
pub trait GreenTimeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Green duration for the given density, within [min, max]
    fn green_duration(&self, vehicle_count: u32) -> f64;
}

/// Fuzzy inference over three overlapping triangular density sets.
///
/// Density is classified into low/medium/high memberships and reduced to a
/// crisp duration by weighted-centroid defuzzification against the set
/// centers (min, midpoint, max of the green window).
#[derive(Debug, Clone)]
pub struct FuzzyGreenTime {
    min_green: f64,
    max_green: f64,
}

impl FuzzyGreenTime {
    pub fn new(min_green: f64, max_green: f64) -> Self {
        Self { min_green, max_green }
    }

    /// Falling ramp: full membership at 0 vehicles, none at 20
    fn low(count: f64) -> f64 {
        ((20.0 - count) / 20.0).clamp(0.0, 1.0)
    }

    /// Triangle peaking at 25 vehicles, shoulders at 10 and 40
    fn medium(count: f64) -> f64 {
        let rising = (count - 10.0) / 15.0;
        let falling = (40.0 - count) / 15.0;
        rising.min(falling).clamp(0.0, 1.0)
    }

    /// Rising ramp: no membership below 30, full at 50+
    fn high(count: f64) -> f64 {
        ((count - 30.0) / 20.0).clamp(0.0, 1.0)
    }
}

impl GreenTimeStrategy for FuzzyGreenTime {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    fn green_duration(&self, vehicle_count: u32) -> f64 {
        let c = vehicle_count as f64;
        let (mu_low, mu_med, mu_high) = (Self::low(c), Self::medium(c), Self::high(c));

        let mid = (self.min_green + self.max_green) / 2.0;
        let weight_sum = mu_low + mu_med + mu_high;
        let duration = if weight_sum > 0.0 {
            (mu_low * self.min_green + mu_med * mid + mu_high * self.max_green) / weight_sum
        } else {
            // Outside every set (cannot happen with these ramps), treat as saturated
            self.max_green
        };

        debug!(
            count = vehicle_count,
            low = mu_low,
            medium = mu_med,
            high = mu_high,
            duration,
            "fuzzy green duration"
        );
        duration.clamp(self.min_green, self.max_green)
    }
}

/// Deterministic linear fallback used when fuzzy inference is unavailable.
///
/// Interpolates from min_green at zero vehicles to max_green at the
/// saturation count. Shares the window and ordering of the fuzzy strategy.
#[derive(Debug, Clone)]
pub struct LinearGreenTime {
    min_green: f64,
    max_green: f64,
    /// Count at which the window saturates to max_green
    saturation_count: u32,
}

impl LinearGreenTime {
    pub fn new(min_green: f64, max_green: f64) -> Self {
        Self {
            min_green,
            max_green,
            saturation_count: 40,
        }
    }
}

impl GreenTimeStrategy for LinearGreenTime {
    fn name(&self) -> &'static str {
        "linear-fallback"
    }

    fn green_duration(&self, vehicle_count: u32) -> f64 {
        let fill = (vehicle_count.min(self.saturation_count) as f64)
            / self.saturation_count as f64;
        self.min_green + (self.max_green - self.min_green) * fill
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MIN: f64 = 10.0;
    const MAX: f64 = 60.0;

    #[test]
    fn test_fuzzy_empty_lane_gets_min_green() {
        let fuzzy = FuzzyGreenTime::new(MIN, MAX);
        assert!((fuzzy.green_duration(0) - MIN).abs() < 1e-9);
    }

    #[test]
    fn test_fuzzy_saturated_lane_gets_max_green() {
        let fuzzy = FuzzyGreenTime::new(MIN, MAX);
        assert!((fuzzy.green_duration(50) - MAX).abs() < 1e-9);
        assert!((fuzzy.green_duration(100) - MAX).abs() < 1e-9);
    }

    #[test]
    fn test_fuzzy_medium_density_hits_midpoint() {
        let fuzzy = FuzzyGreenTime::new(MIN, MAX);
        assert!((fuzzy.green_duration(25) - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_endpoints() {
        let linear = LinearGreenTime::new(MIN, MAX);
        assert!((linear.green_duration(0) - MIN).abs() < 1e-9);
        assert!((linear.green_duration(40) - MAX).abs() < 1e-9);
        assert!((linear.green_duration(90) - MAX).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_fuzzy_monotone_in_count(c1 in 0u32..100, c2 in 0u32..100) {
            let fuzzy = FuzzyGreenTime::new(MIN, MAX);
            let (lo, hi) = if c1 <= c2 { (c1, c2) } else { (c2, c1) };
            prop_assert!(fuzzy.green_duration(lo) <= fuzzy.green_duration(hi) + 1e-9);
        }

        #[test]
        fn prop_linear_monotone_in_count(c1 in 0u32..100, c2 in 0u32..100) {
            let linear = LinearGreenTime::new(MIN, MAX);
            let (lo, hi) = if c1 <= c2 { (c1, c2) } else { (c2, c1) };
            prop_assert!(linear.green_duration(lo) <= linear.green_duration(hi) + 1e-9);
        }

        #[test]
        fn prop_both_strategies_stay_in_window(c in 0u32..500) {
            let fuzzy = FuzzyGreenTime::new(MIN, MAX);
            let linear = LinearGreenTime::new(MIN, MAX);
            for d in [fuzzy.green_duration(c), linear.green_duration(c)] {
                prop_assert!((MIN..=MAX).contains(&d));
            }
        }
    }
}
