use dealscope_stats::descriptive::DescriptiveStats;
use serde::{Deserialize, Serialize};

use crate::error::Warning;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::FromStr)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizationMethod {
    #[default]
    None,
    ZScore,
    MinMax,
}

/// `(value - center) / scale` for one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnScaling {
    pub center: f64,
    pub scale: f64,
}

impl ColumnScaling {
    pub const IDENTITY: Self = Self {
        center: 0.0,
        scale: 1.0,
    };

    #[must_use]
    pub fn apply(&self, value: f64) -> f64 {
        (value - self.center) / self.scale
    }
}

/// Per-column scaling recorded at preprocessing time and replayed when scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub method: NormalizationMethod,
    pub columns: Vec<ColumnScaling>,
}

impl Normalization {
    /// Fits scaling parameters for each column.
    ///
    /// Columns flagged in `skip` (categorical codes) keep the identity
    /// scaling. A column without spread gets a scale of 1 and a
    /// [`Warning::ZeroVariance`].
    #[must_use]
    pub(crate) fn fit(
        method: NormalizationMethod,
        dimensions: &[String],
        x: &[Vec<f64>],
        skip: &[bool],
    ) -> Option<(Self, Vec<Warning>)> {
        if method == NormalizationMethod::None {
            return None;
        }
        let mut warnings = vec![];
        let columns = dimensions
            .iter()
            .enumerate()
            .map(|(j, dimension)| {
                if skip[j] {
                    return ColumnScaling::IDENTITY;
                }
                let Some(stats) = DescriptiveStats::new(x.iter().map(|row| row[j])) else {
                    return ColumnScaling::IDENTITY;
                };
                let (center, spread) = match method {
                    NormalizationMethod::ZScore => (stats.mean, stats.std_dev),
                    NormalizationMethod::MinMax => (stats.min, stats.range()),
                    NormalizationMethod::None => unreachable!(),
                };
                if spread > 0.0 {
                    ColumnScaling {
                        center,
                        scale: spread,
                    }
                } else {
                    warnings.push(Warning::ZeroVariance {
                        dimension: dimension.clone(),
                    });
                    ColumnScaling { center, scale: 1.0 }
                }
            })
            .collect();
        Some((Self { method, columns }, warnings))
    }

    /// Scales a row in place.
    ///
    /// # Panics
    ///
    /// Panics if the row length differs from the number of fitted columns.
    pub fn apply_row(&self, row: &mut [f64]) {
        assert_eq!(row.len(), self.columns.len());
        for (value, scaling) in row.iter_mut().zip(&self.columns) {
            *value = scaling.apply(*value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("d{i}")).collect()
    }

    #[test]
    fn test_z_score() {
        let x = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let (norm, warnings) =
            Normalization::fit(NormalizationMethod::ZScore, &names(2), &x, &[false, false]).unwrap();
        assert_eq!(norm.columns[0], ColumnScaling { center: 2.0, scale: 1.0 });
        assert_eq!(norm.columns[1], ColumnScaling { center: 5.0, scale: 1.0 });
        assert_eq!(
            warnings,
            vec![Warning::ZeroVariance {
                dimension: "d1".into()
            }]
        );

        let mut row = vec![3.0, 5.0];
        norm.apply_row(&mut row);
        assert_eq!(row, vec![1.0, 0.0]);
    }

    #[test]
    fn test_min_max_skips_categorical_columns() {
        let x = vec![vec![10.0, 1.0], vec![20.0, 2.0], vec![30.0, 3.0]];
        let (norm, warnings) =
            Normalization::fit(NormalizationMethod::MinMax, &names(2), &x, &[false, true]).unwrap();
        assert!(warnings.is_empty());
        let mut row = vec![20.0, 2.0];
        norm.apply_row(&mut row);
        assert_eq!(row, vec![0.5, 2.0]);
    }

    #[test]
    fn test_none_is_not_fitted() {
        assert!(Normalization::fit(NormalizationMethod::None, &names(1), &[vec![1.0]], &[false]).is_none());
    }
}
