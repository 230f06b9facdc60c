//! Closed-form multivariate linear regression with inferential statistics.
//!
//! The model is fit by the normal equations `β = (XᵗX)⁻¹Xᵗy` on a design
//! matrix with a leading intercept column. Standard errors come from
//! `σ²·diag((XᵗX)⁻¹)`, coefficient tests use Student's t with `n − p − 1`
//! degrees of freedom and the overall fit is tested with an F statistic.
//!
//! # Example
//!
//! ```
//! use dealscope_engine::regression::{RegressionOptions, fit};
//!
//! let x = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
//! let y = vec![2.0, 4.0, 6.0, 8.0];
//! let model = fit(&x, &y, &["n".to_owned()], &RegressionOptions::default()).unwrap();
//!
//! assert!(model.coefficients[0].estimate.abs() < 1e-9);
//! assert!((model.coefficients[1].estimate - 2.0).abs() < 1e-9);
//! assert!((model.r_squared - 1.0).abs() < 1e-12);
//! ```

use dealscope_stats::{
    descriptive,
    distribution::{FisherSnedecor, StudentT},
    matrix::{design_matrix, gram_inverse},
    proportion::Interval,
};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AnalysisError, Result},
    preprocess::{EncodingInfo, FeatureMatrix, validate_shape},
};

/// How coefficient impact is made comparable across dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::FromStr)]
#[serde(rename_all = "kebab-case")]
pub enum ImpactPolicy {
    /// Continuous: coefficient × column standard deviation. Categorical: raw coefficient.
    #[default]
    StdDevScaled,
    /// Raw coefficient for every dimension.
    Raw,
    /// Coefficient × column standard deviation for every dimension.
    StdDevScaledAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegressionOptions {
    pub confidence_level: f64,
    pub impact_policy: ImpactPolicy,
}

impl Default for RegressionOptions {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            impact_policy: ImpactPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    /// `±inf` for a nonzero estimate with zero standard error.
    pub t_statistic: f64,
    pub p_value: f64,
    pub confidence_interval: Interval,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Impact {
    pub name: String,
    pub categorical: bool,
    pub std_dev: f64,
    pub impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionModel {
    /// Index 0 is the intercept.
    pub coefficients: Vec<Coefficient>,
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
    pub residual_std_error: f64,
    /// `+inf` for a perfect fit.
    pub f_statistic: f64,
    pub f_p_value: f64,
    pub observations: usize,
    pub degrees_of_freedom: usize,
    pub confidence_level: f64,
    /// Ranked by descending absolute impact.
    pub impacts: Vec<Impact>,
}

/// Fits `y ~ 1 + X`, treating every column as continuous.
///
/// `names` labels the columns of `X`; the intercept is named `intercept`.
pub fn fit(
    x: &[Vec<f64>],
    y: &[f64],
    names: &[String],
    options: &RegressionOptions,
) -> Result<RegressionModel> {
    validate_shape(names, x, y)?;
    fit_validated(x, y, names, &vec![false; names.len()], options)
}

/// Fits a preprocessed matrix; columns present in `encoding` are categorical.
pub fn fit_matrix(
    matrix: &FeatureMatrix,
    encoding: &EncodingInfo,
    options: &RegressionOptions,
) -> Result<RegressionModel> {
    let categorical = matrix
        .dimensions()
        .iter()
        .map(|d| encoding.is_categorical(d))
        .collect::<Vec<_>>();
    fit_validated(matrix.x(), matrix.y(), matrix.dimensions(), &categorical, options)
}

#[expect(clippy::cast_precision_loss)]
fn fit_validated(
    x: &[Vec<f64>],
    y: &[f64],
    names: &[String],
    categorical: &[bool],
    options: &RegressionOptions,
) -> Result<RegressionModel> {
    let level = options.confidence_level;
    if !(level > 0.0 && level < 1.0) {
        return Err(AnalysisError::validation(format!(
            "confidence level must be in (0, 1), got {level}"
        )));
    }

    let n = x.len();
    let p = names.len();
    let design = design_matrix(x);
    let xtx_inv = gram_inverse(&design).map_err(|err| {
        let column = if err.column == 0 {
            "intercept"
        } else {
            names[err.column - 1].as_str()
        };
        AnalysisError::SingularMatrix {
            context: format!(
                "XᵗX is not invertible at column '{column}'; drop a collinear dimension or add observations"
            ),
        }
    })?;
    let df = n
        .checked_sub(p + 1)
        .filter(|&df| df > 0)
        .ok_or(AnalysisError::InsufficientData {
            observations: n,
            parameters: p + 1,
        })?;

    let y_vec = DVector::from_column_slice(y);
    let beta = &xtx_inv * design.tr_mul(&y_vec);
    if beta.iter().any(|b| !b.is_finite()) {
        return Err(AnalysisError::non_finite(
            "coefficients",
            "normal equations produced a non-finite estimate",
        ));
    }

    let fitted = &design * &beta;
    let y_mean = y.iter().sum::<f64>() / n as f64;
    let rss = y.iter().zip(fitted.iter()).map(|(a, b)| (a - b).powi(2)).sum::<f64>();
    let tss = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>();
    let scale = y.iter().map(|v| v * v).sum::<f64>();
    if tss <= f64::EPSILON * scale {
        return Err(AnalysisError::non_finite(
            "r_squared",
            "target has zero variance, so R² is undefined",
        ));
    }

    let df_f = df as f64;
    let r_squared = (1.0 - rss / tss).clamp(0.0, 1.0);
    let adjusted_r_squared = 1.0 - (1.0 - r_squared) * (n as f64 - 1.0) / df_f;
    let sigma2 = rss / df_f;

    let t_dist = StudentT::new(df_f).ok_or(AnalysisError::InsufficientData {
        observations: n,
        parameters: p + 1,
    })?;
    let t_crit = critical_t(&t_dist, level);

    let coefficients = beta
        .iter()
        .zip(xtx_inv.diagonal().iter())
        .enumerate()
        .map(|(i, (&estimate, &diag))| {
            let std_error = (sigma2 * diag.max(0.0)).sqrt();
            let t_statistic = if std_error > 0.0 {
                estimate / std_error
            } else if estimate == 0.0 {
                0.0
            } else {
                estimate.signum() * f64::INFINITY
            };
            let name = if i == 0 {
                "intercept".to_owned()
            } else {
                names[i - 1].clone()
            };
            Coefficient {
                name,
                estimate,
                std_error,
                t_statistic,
                p_value: t_dist.two_tailed_p_value(t_statistic),
                confidence_interval: Interval {
                    lower: estimate - t_crit * std_error,
                    upper: estimate + t_crit * std_error,
                },
            }
        })
        .collect::<Vec<_>>();

    let (f_statistic, f_p_value) = if r_squared >= 1.0 {
        (f64::INFINITY, 0.0)
    } else {
        let f = (r_squared / p as f64) / ((1.0 - r_squared) / df_f);
        let f_dist = FisherSnedecor::new(p as f64, df_f).ok_or(AnalysisError::InsufficientData {
            observations: n,
            parameters: p + 1,
        })?;
        (f, f_dist.sf(f))
    };
    if f_statistic.is_nan() || f_p_value.is_nan() {
        return Err(AnalysisError::non_finite(
            "f_statistic",
            format!("R² = {r_squared} with {p} predictors and {df} residual df"),
        ));
    }

    let impacts = impacts(x, names, categorical, &beta.as_slice()[1..], options.impact_policy);

    tracing::debug!(
        observations = n,
        predictors = p,
        r_squared,
        f_statistic,
        "fitted regression"
    );

    Ok(RegressionModel {
        coefficients,
        r_squared,
        adjusted_r_squared,
        residual_std_error: sigma2.sqrt(),
        f_statistic,
        f_p_value,
        observations: n,
        degrees_of_freedom: df,
        confidence_level: level,
        impacts,
    })
}

fn critical_t(t_dist: &StudentT, level: f64) -> f64 {
    t_dist.inverse_cdf(1.0 - (1.0 - level) / 2.0)
}

fn impacts(
    x: &[Vec<f64>],
    names: &[String],
    categorical: &[bool],
    slopes: &[f64],
    policy: ImpactPolicy,
) -> Vec<Impact> {
    let mut impacts = names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let column = x.iter().map(|row| row[j]).collect::<Vec<_>>();
            let std_dev = descriptive::std_dev(&column).unwrap_or(0.0);
            let scaled = match policy {
                ImpactPolicy::StdDevScaled => !categorical[j],
                ImpactPolicy::Raw => false,
                ImpactPolicy::StdDevScaledAll => true,
            };
            Impact {
                name: name.clone(),
                categorical: categorical[j],
                std_dev,
                impact: if scaled { slopes[j] * std_dev } else { slopes[j] },
            }
        })
        .collect::<Vec<_>>();
    impacts.sort_by(|a, b| b.impact.abs().total_cmp(&a.impact.abs()));
    impacts
}

impl RegressionModel {
    /// Recomputes the interval of coefficient `index` at another confidence level.
    ///
    /// Returns `None` for an out-of-range index or a level outside `(0, 1)`.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn confidence_interval(&self, index: usize, level: f64) -> Option<Interval> {
        if !(level > 0.0 && level < 1.0) {
            return None;
        }
        let coefficient = self.coefficients.get(index)?;
        let t_dist = StudentT::new(self.degrees_of_freedom as f64)?;
        let margin = critical_t(&t_dist, level) * coefficient.std_error;
        Some(Interval {
            lower: coefficient.estimate - margin,
            upper: coefficient.estimate + margin,
        })
    }

    /// Predicted value for one row of features.
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() + 1 != self.coefficients.len() {
            return Err(AnalysisError::validation(format!(
                "expected {} features, got {}",
                self.coefficients.len() - 1,
                features.len()
            )));
        }
        Ok(self.coefficients[0].estimate
            + self.coefficients[1..]
                .iter()
                .zip(features)
                .map(|(c, x)| c.estimate * x)
                .sum::<f64>())
    }
}
