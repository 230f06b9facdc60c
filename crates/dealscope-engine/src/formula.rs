//! Human-readable rendering of logistic model weights.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Terms whose |weight| is below this share of the largest |weight| are
/// left out of the simplified formula.
pub const SIMPLIFY_CUTOFF: f64 = 0.05;

const MAX_PRECISION: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaOptions {
    pub simplify: bool,
    /// Decimal places of every rendered number.
    pub precision: usize,
}

impl Default for FormulaOptions {
    fn default() -> Self {
        Self {
            simplify: true,
            precision: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub feature: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formula {
    pub detailed_formula: String,
    pub simplified_formula: String,
    /// Ranked by descending |weight|.
    pub feature_weight_pairs: Vec<FeatureWeight>,
}

/// Renders `logit(p) = bias ± w·feature ...`.
///
/// `weights[0]` is the bias and `weights[1..]` pair with `feature_names`.
///
/// ```
/// use dealscope_engine::formula::{FormulaOptions, generate_formula};
///
/// let names = ["amount".to_owned(), "discount".to_owned(), "noise".to_owned()];
/// let formula = generate_formula(&[-0.5, 1.25, -0.8, 0.01], &names, &FormulaOptions::default())
///     .unwrap();
/// assert_eq!(
///     formula.detailed_formula,
///     "logit(p) = -0.500 + 1.250 × amount - 0.800 × discount + 0.010 × noise"
/// );
/// assert_eq!(
///     formula.simplified_formula,
///     "logit(p) = -0.500 + 1.250 × amount - 0.800 × discount"
/// );
/// assert_eq!(formula.feature_weight_pairs[0].feature, "amount");
/// ```
pub fn generate_formula(
    weights: &[f64],
    feature_names: &[String],
    options: &FormulaOptions,
) -> Result<Formula> {
    if weights.len() != feature_names.len() + 1 {
        return Err(AnalysisError::validation(format!(
            "{} weights for {} features; expected a bias plus one weight per feature",
            weights.len(),
            feature_names.len()
        )));
    }
    if weights.iter().any(|w| !w.is_finite()) {
        return Err(AnalysisError::validation("weights must be finite"));
    }
    let precision = options.precision.min(MAX_PRECISION);
    let terms = feature_names.iter().zip(&weights[1..]).collect::<Vec<_>>();

    let detailed_formula = render(weights[0], &terms, precision);
    let simplified_formula = if options.simplify {
        let largest = terms.iter().map(|(_, w)| w.abs()).fold(0.0, f64::max);
        let kept = terms
            .iter()
            .copied()
            .filter(|(_, w)| w.abs() >= SIMPLIFY_CUTOFF * largest)
            .collect::<Vec<_>>();
        render(weights[0], &kept, precision)
    } else {
        detailed_formula.clone()
    };

    let mut feature_weight_pairs = terms
        .iter()
        .map(|&(name, &weight)| FeatureWeight {
            feature: name.clone(),
            weight,
        })
        .collect::<Vec<_>>();
    feature_weight_pairs.sort_by(|a, b| b.weight.abs().total_cmp(&a.weight.abs()));

    Ok(Formula {
        detailed_formula,
        simplified_formula,
        feature_weight_pairs,
    })
}

fn render(bias: f64, terms: &[(&String, &f64)], precision: usize) -> String {
    let mut out = format!("logit(p) = {bias:.precision$}");
    for &(name, &weight) in terms {
        let sign = if weight < 0.0 { '-' } else { '+' };
        let magnitude = weight.abs();
        out.push_str(&format!(" {sign} {magnitude:.precision$} × {name}"));
    }
    out
}
