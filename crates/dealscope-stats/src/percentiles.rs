use serde::{Deserialize, Serialize};

/// Interpolated values at a fixed set of percentile points.
///
/// ```
/// use dealscope_stats::percentiles::Percentiles;
///
/// let percentiles = Percentiles::new(&[5.0, 1.0, 4.0, 2.0, 3.0], &[25.0, 50.0]);
/// assert_eq!(percentiles.get(50.0), Some(3.0));
/// assert_eq!(percentiles.get(90.0), None);
/// ```
#[derive(Debug, Clone)]
pub struct Percentiles {
    /// `(percentile in 0..=100, value)`, in request order.
    values: Vec<(f64, f64)>,
}

impl Percentiles {
    /// # Panics
    ///
    /// Panics if `sorted_values` is not ascending.
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64], points: &[f64]) -> Self {
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be in ascending order"
        );
        Self {
            values: points
                .iter()
                .map(|&p| (p, compute_percentile(sorted_values, p)))
                .collect(),
        }
    }

    #[must_use]
    pub fn new(values: &[f64], points: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self::from_sorted(&sorted, points)
    }

    /// The value at `percentile`, if it was one of the requested points.
    #[must_use]
    pub fn get(&self, percentile: f64) -> Option<f64> {
        self.values
            .iter()
            .find(|(p, _)| (p - percentile).abs() < f64::EPSILON)
            .map(|&(_, value)| value)
    }
}

/// Computes a single percentile value from sorted data.
///
/// Uses linear interpolation between closest ranks: the k-th percentile sits
/// at fractional position `(n - 1) * k / 100`, and values on either side are
/// blended by the fractional part.
///
/// Returns `f64::NAN` if the input is empty.
///
/// # Examples
///
/// ```
/// use dealscope_stats::percentiles::compute_percentile;
///
/// let values = vec![1.0, 2.0, 3.0, 4.0];
/// assert_eq!(compute_percentile(&values, 50.0), 2.5);
/// assert_eq!(compute_percentile(&values, 0.0), 1.0);
/// assert_eq!(compute_percentile(&values, 100.0), 4.0);
/// ```
#[expect(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn compute_percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return f64::NAN;
    }
    let rank = (sorted_values.len() - 1) as f64 * percentile.clamp(0.0, 100.0) / 100.0;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted_values[lower] + (sorted_values[upper] - sorted_values[lower]) * fraction
}

/// First and third quartiles plus the interquartile range.
///
/// Used for Tukey-style outlier fences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quartiles {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
}

impl Quartiles {
    /// Tukey fence multiplier.
    pub const DEFAULT_FENCE: f64 = 1.5;

    /// Computes quartiles from unsorted values, or `None` if empty.
    ///
    /// ```
    /// use dealscope_stats::percentiles::Quartiles;
    ///
    /// let q = Quartiles::new(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    /// assert_eq!((q.q1, q.q3, q.iqr), (2.0, 4.0, 2.0));
    /// ```
    #[must_use]
    pub fn new(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let percentiles = Percentiles::new(values, &[25.0, 75.0]);
        let q1 = percentiles.get(25.0)?;
        let q3 = percentiles.get(75.0)?;
        Some(Self {
            q1,
            q3,
            iqr: q3 - q1,
        })
    }

    /// Returns the `(lower, upper)` fences `[Q1 - m·IQR, Q3 + m·IQR]`.
    #[must_use]
    pub fn fences(&self, multiplier: f64) -> (f64, f64) {
        (
            self.q1 - multiplier * self.iqr,
            self.q3 + multiplier * self.iqr,
        )
    }
}
