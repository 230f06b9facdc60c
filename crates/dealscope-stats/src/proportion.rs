use serde::{Deserialize, Serialize};

/// Default z multiplier for a 95% Wald interval.
pub const WALD_Z_95: f64 = 1.96;

/// A closed interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Observed proportion of successes among trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proportion {
    pub successes: usize,
    pub trials: usize,
}

impl Proportion {
    #[must_use]
    pub fn new(successes: usize, trials: usize) -> Self {
        debug_assert!(successes <= trials);
        Self { successes, trials }
    }

    /// `successes / trials`, or `0.0` when there are no trials.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn rate(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.successes as f64 / self.trials as f64
        }
    }

    /// Wald (normal approximation) interval `p ± z·sqrt(p(1-p)/n)` clamped to `[0, 1]`.
    ///
    /// Returns `None` when there are no trials.
    ///
    /// # Examples
    ///
    /// ```
    /// use dealscope_stats::proportion::{Proportion, WALD_Z_95};
    ///
    /// let interval = Proportion::new(8, 10).wald_interval(WALD_Z_95).unwrap();
    /// assert!((interval.lower - 0.552_08).abs() < 1e-4);
    /// assert_eq!(interval.upper, 1.0);
    /// assert!(Proportion::new(0, 0).wald_interval(WALD_Z_95).is_none());
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn wald_interval(&self, z: f64) -> Option<Interval> {
        if self.trials == 0 {
            return None;
        }
        let p = self.rate();
        let margin = z * (p * (1.0 - p) / self.trials as f64).sqrt();
        Some(Interval {
            lower: (p - margin).clamp(0.0, 1.0),
            upper: (p + margin).clamp(0.0, 1.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_trials_rate_is_zero() {
        assert_eq!(Proportion::new(0, 0).rate(), 0.0);
    }

    #[test]
    fn test_degenerate_rates_have_zero_width() {
        let all = Proportion::new(5, 5).wald_interval(WALD_Z_95).unwrap();
        assert_eq!((all.lower, all.upper), (1.0, 1.0));
        let none = Proportion::new(0, 5).wald_interval(WALD_Z_95).unwrap();
        assert_eq!((none.lower, none.upper), (0.0, 0.0));
    }

    #[test]
    fn test_interval_contains_rate() {
        let p = Proportion::new(37, 120);
        let interval = p.wald_interval(WALD_Z_95).unwrap();
        assert!(interval.contains(p.rate()));
        assert!(interval.width() > 0.0);
    }
}
