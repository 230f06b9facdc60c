//! L2-regularized logistic regression trained by batch gradient descent.
//!
//! # Training
//!
//! Weights (bias first) start at zero. Each iteration computes sigmoid
//! predictions for every row, the mean cross-entropy gradient plus `λ·w` for
//! every non-bias weight, and steps by `learning_rate × gradient`. Training
//! stops once the step norm falls below [`CONVERGENCE_TOLERANCE`] (after at
//! least [`MIN_ITERATIONS`] iterations) or the iteration budget runs out; the
//! latter is reported as `converged: false`, not as an error.
//!
//! # Evaluation
//!
//! [`train`] holds out a (stratified) test partition and reports
//! [`ClassificationMetrics`] on it at threshold 0.5, falling back to the
//! training rows when the ratio leaves the test partition empty.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AnalysisError, Result},
    preprocess::{
        self, BalanceMethod, EncodingInfo, FeatureMatrix, Normalization, validate_shape,
    },
};

pub const CONVERGENCE_TOLERANCE: f64 = 1e-4;
pub const MIN_ITERATIONS: usize = 5;
pub const DECISION_THRESHOLD: f64 = 0.5;
const LOG_GUARD: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrainOptions {
    pub max_iterations: usize,
    pub learning_rate: f64,
    /// L2 strength.
    pub regularization: f64,
    pub test_ratio: f64,
    pub stratified: bool,
    pub balance: Option<BalanceMethod>,
    pub seed: Option<u64>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            learning_rate: 0.1,
            regularization: 0.01,
            test_ratio: 0.2,
            stratified: true,
            balance: None,
            seed: None,
        }
    }
}

impl TrainOptions {
    fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(AnalysisError::validation("max_iterations must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(AnalysisError::validation(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.regularization.is_finite() && self.regularization >= 0.0) {
            return Err(AnalysisError::validation(format!(
                "regularization must be non-negative, got {}",
                self.regularization
            )));
        }
        Ok(())
    }
}

/// Outcome of the gradient descent loop.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientDescent {
    /// Index 0 is the bias.
    pub weights: Vec<f64>,
    /// Cost before each update, then the cost of the final weights.
    pub cost_history: Vec<f64>,
    pub converged: bool,
    pub iterations: usize,
}

/// Numerically stable logistic function.
#[must_use]
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn linear(weights: &[f64], row: &[f64]) -> f64 {
    weights[0] + weights[1..].iter().zip(row).map(|(w, x)| w * x).sum::<f64>()
}

/// Runs gradient descent on rows `x` with 0/1 labels `y`.
///
/// ```
/// use dealscope_engine::logistic::{TrainOptions, fit_weights};
///
/// let x = [-10.0, -9.0, -8.0, 8.0, 9.0, 10.0].map(|v| vec![v]).to_vec();
/// let y = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
/// let fit = fit_weights(&x, &y, &TrainOptions::default()).unwrap();
/// assert!(fit.converged);
/// assert!(fit.weights[1] > 0.0);
/// ```
#[expect(clippy::cast_precision_loss)]
pub fn fit_weights(x: &[Vec<f64>], y: &[f64], options: &TrainOptions) -> Result<GradientDescent> {
    options.validate()?;
    let p = x.first().map_or(0, Vec::len);
    let names = (0..p).map(|j| format!("x{j}")).collect::<Vec<_>>();
    validate_shape(&names, x, y)?;
    validate_labels(y)?;

    let n = x.len() as f64;
    let lambda = options.regularization;
    let mut weights = vec![0.0; p + 1];
    let mut cost_history = Vec::with_capacity(options.max_iterations + 1);
    let mut converged = false;
    let mut iterations = 0;

    for iteration in 1..=options.max_iterations {
        let predictions = x
            .iter()
            .map(|row| sigmoid(linear(&weights, row)))
            .collect::<Vec<_>>();
        cost_history.push(cost(y, &predictions, &weights, lambda));

        let mut gradient = vec![0.0; p + 1];
        for ((row, &target), &prediction) in x.iter().zip(y).zip(&predictions) {
            let error = prediction - target;
            gradient[0] += error;
            for (g, v) in gradient[1..].iter_mut().zip(row) {
                *g += error * v;
            }
        }
        for (j, g) in gradient.iter_mut().enumerate() {
            *g /= n;
            if j > 0 {
                *g += lambda * weights[j];
            }
        }

        let mut step_norm = 0.0;
        for (w, g) in weights.iter_mut().zip(&gradient) {
            let delta = options.learning_rate * g;
            *w -= delta;
            step_norm += delta * delta;
        }
        iterations = iteration;
        if iteration >= MIN_ITERATIONS && step_norm.sqrt() < CONVERGENCE_TOLERANCE {
            converged = true;
            break;
        }
    }
    let predictions = x
        .iter()
        .map(|row| sigmoid(linear(&weights, row)))
        .collect::<Vec<_>>();
    cost_history.push(cost(y, &predictions, &weights, lambda));

    if weights.iter().any(|w| !w.is_finite()) {
        return Err(AnalysisError::non_finite(
            "weights",
            "gradient descent diverged; lower the learning rate",
        ));
    }
    if converged {
        tracing::debug!(iterations, "logistic training converged");
    } else {
        tracing::warn!(iterations, "logistic training hit the iteration cap without converging");
    }

    Ok(GradientDescent {
        weights,
        cost_history,
        converged,
        iterations,
    })
}

fn validate_labels(y: &[f64]) -> Result<()> {
    match y.iter().position(|&v| v != 0.0 && v != 1.0) {
        Some(i) => Err(AnalysisError::validation(format!(
            "label {i} is {}, expected 0 or 1",
            y[i]
        ))),
        None => Ok(()),
    }
}

/// Mean cross-entropy plus `(λ/2)·Σw²` over non-bias weights.
#[expect(clippy::cast_precision_loss)]
fn cost(y: &[f64], predictions: &[f64], weights: &[f64], lambda: f64) -> f64 {
    let n = y.len() as f64;
    let cross_entropy = y
        .iter()
        .zip(predictions)
        .map(|(t, p)| t * (p + LOG_GUARD).ln() + (1.0 - t) * (1.0 - p + LOG_GUARD).ln())
        .sum::<f64>()
        / -n;
    let penalty = weights[1..].iter().map(|w| w * w).sum::<f64>() * lambda / 2.0;
    cross_entropy + penalty
}

/// Threshold-0.5 classification metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub log_loss: f64,
    /// Area under the ROC curve; `None` unless both classes are present.
    pub auc: Option<f64>,
    pub samples: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

impl ClassificationMetrics {
    /// Scores predicted probabilities against 0/1 labels.
    ///
    /// Precision, recall and F1 resolve to 0 when their denominator is 0.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn compute(y: &[f64], probabilities: &[f64]) -> Self {
        assert_eq!(y.len(), probabilities.len());
        let mut cm = ConfusionMatrix::default();
        for (&target, &p) in y.iter().zip(probabilities) {
            match (target >= 0.5, p >= DECISION_THRESHOLD) {
                (true, true) => cm.true_positive += 1,
                (false, true) => cm.false_positive += 1,
                (false, false) => cm.true_negative += 1,
                (true, false) => cm.false_negative += 1,
            }
        }
        let tp = cm.true_positive as f64;
        let precision = ratio(tp, tp + cm.false_positive as f64);
        let recall = ratio(tp, tp + cm.false_negative as f64);
        let samples = y.len();
        Self {
            accuracy: ratio(tp + cm.true_negative as f64, samples as f64),
            precision,
            recall,
            f1: ratio(2.0 * precision * recall, precision + recall),
            confusion_matrix: cm,
            log_loss: ratio(
                -y.iter()
                    .zip(probabilities)
                    .map(|(t, p)| t * (p + LOG_GUARD).ln() + (1.0 - t) * (1.0 - p + LOG_GUARD).ln())
                    .sum::<f64>(),
                samples as f64,
            ),
            auc: auc(y, probabilities),
            samples,
        }
    }
}

/// Mann-Whitney estimate of ROC AUC with average ranks for ties.
#[expect(clippy::cast_precision_loss)]
fn auc(y: &[f64], probabilities: &[f64]) -> Option<f64> {
    let positives = y.iter().filter(|&&t| t >= 0.5).count();
    let negatives = y.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }
    let mut order = (0..y.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && probabilities[order[end]] == probabilities[order[start]] {
            end += 1;
        }
        let average_rank = (start + end + 1) as f64 / 2.0;
        positive_rank_sum += average_rank
            * order[start..end].iter().filter(|&&i| y[i] >= 0.5).count() as f64;
        start = end;
    }
    let (pos, neg) = (positives as f64, negatives as f64);
    Some((positive_rank_sum - pos * (pos + 1.0) / 2.0) / (pos * neg))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureImportance {
    pub dimension: String,
    pub weight: f64,
    /// `|w| / Σ|w|` over non-bias weights.
    pub importance: f64,
}

/// A trained win-probability model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogisticModel {
    /// Index 0 is the bias; the rest follow `dimensions`.
    pub weights: Vec<f64>,
    pub dimensions: Vec<String>,
    pub encoding: EncodingInfo,
    #[serde(default)]
    pub normalization: Option<Normalization>,
    /// Held-out metrics, or training metrics when nothing was held out.
    pub metrics: ClassificationMetrics,
    pub training_metrics: ClassificationMetrics,
    pub cost_history: Vec<f64>,
    pub converged: bool,
    pub iterations: usize,
    pub trained_at: DateTime<Utc>,
}

impl LogisticModel {
    /// Win probability for an already encoded and normalized feature row.
    pub fn probability(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.dimensions.len() || self.weights.len() != features.len() + 1 {
            return Err(AnalysisError::validation(format!(
                "model has {} dimensions, got {} features",
                self.dimensions.len(),
                features.len()
            )));
        }
        Ok(sigmoid(linear(&self.weights, features)))
    }

    /// Non-bias weights ranked by share of total absolute weight.
    #[must_use]
    pub fn feature_importance(&self) -> Vec<FeatureImportance> {
        let total = self.weights[1..].iter().map(|w| w.abs()).sum::<f64>();
        let mut importance = self
            .dimensions
            .iter()
            .zip(&self.weights[1..])
            .map(|(dimension, &weight)| FeatureImportance {
                dimension: dimension.clone(),
                weight,
                importance: ratio(weight.abs(), total),
            })
            .collect::<Vec<_>>();
        importance.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        importance
    }

    /// Name → weight map, without the bias.
    #[must_use]
    pub fn weight_map(&self) -> BTreeMap<&str, f64> {
        self.dimensions
            .iter()
            .map(String::as_str)
            .zip(self.weights[1..].iter().copied())
            .collect()
    }
}

/// Splits, optionally balances, trains and evaluates.
///
/// `encoding` and `normalization` are the ones that produced `matrix`; they
/// are stored in the model so scoring reproduces the same features.
pub fn train<R>(
    matrix: &FeatureMatrix,
    encoding: EncodingInfo,
    normalization: Option<Normalization>,
    options: &TrainOptions,
    rng: &mut R,
) -> Result<LogisticModel>
where
    R: Rng + ?Sized,
{
    options.validate()?;
    validate_labels(matrix.y())?;
    let split = preprocess::train_test_split(matrix, options.test_ratio, options.stratified, rng)?;
    let train_rows = match options.balance {
        Some(method) => preprocess::balance(&split.train, method, rng)?,
        None => split.train,
    };

    let fit = fit_weights(train_rows.x(), train_rows.y(), options)?;
    let probabilities = |m: &FeatureMatrix| {
        m.x()
            .iter()
            .map(|row| sigmoid(linear(&fit.weights, row)))
            .collect::<Vec<_>>()
    };
    let training_metrics = ClassificationMetrics::compute(train_rows.y(), &probabilities(&train_rows));
    let metrics = match &split.test {
        Some(test) => ClassificationMetrics::compute(test.y(), &probabilities(test)),
        None => training_metrics.clone(),
    };
    tracing::debug!(
        train_rows = train_rows.len(),
        test_rows = split.test.as_ref().map_or(0, FeatureMatrix::len),
        accuracy = metrics.accuracy,
        "trained logistic model"
    );

    Ok(LogisticModel {
        weights: fit.weights,
        dimensions: matrix.dimensions().to_vec(),
        encoding,
        normalization,
        metrics,
        training_metrics,
        cost_history: fit.cost_history,
        converged: fit.converged,
        iterations: fit.iterations,
        trained_at: Utc::now(),
    })
}

/// Trains on raw numeric rows with no categorical encoding.
///
/// Randomness comes from `options.seed`, or the system when unset.
pub fn train_raw(
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
    names: Option<Vec<String>>,
    options: &TrainOptions,
) -> Result<LogisticModel> {
    let p = x.first().map_or(0, Vec::len);
    let names = names.unwrap_or_else(|| (0..p).map(|j| format!("x{j}")).collect());
    let matrix = FeatureMatrix::new(names, x, y)?;
    let mut rng = crate::seeded_rng(options.seed);
    train(&matrix, EncodingInfo::default(), None, options, &mut rng)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x = [-10.0, -9.0, -8.0, 8.0, 9.0, 10.0].map(|v| vec![v]).to_vec();
        let y = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    mod descent {
        use super::*;

        #[test]
        fn test_separable_data_converges() {
            let (x, y) = separable();
            let fit = fit_weights(&x, &y, &TrainOptions::default()).unwrap();
            assert!(fit.converged);
            assert!(fit.iterations < 500);
            assert_eq!(fit.cost_history.len(), fit.iterations + 1);
            assert!(fit.weights[0].abs() < 1e-6);
            assert!(fit.weights[1] > 0.5);
        }

        #[test]
        fn test_final_cost_not_above_initial() {
            let (x, y) = separable();
            let fit = fit_weights(&x, &y, &TrainOptions::default()).unwrap();
            let first = fit.cost_history[0];
            assert!((first - std::f64::consts::LN_2).abs() < 1e-6);
            let last = *fit.cost_history.last().unwrap();
            assert!(last <= first);

            let predictions = x
                .iter()
                .map(|row| sigmoid(linear(&fit.weights, row)))
                .collect::<Vec<_>>();
            let lambda = TrainOptions::default().regularization;
            assert_eq!(last, cost(&y, &predictions, &fit.weights, lambda));
            assert!(last <= fit.cost_history[fit.cost_history.len() - 2]);
        }

        #[test]
        fn test_iteration_cap_is_not_an_error() {
            let (x, y) = separable();
            let options = TrainOptions {
                max_iterations: 3,
                ..TrainOptions::default()
            };
            let fit = fit_weights(&x, &y, &options).unwrap();
            assert!(!fit.converged);
            assert_eq!(fit.iterations, 3);
        }

        #[test]
        fn test_rejects_non_binary_labels() {
            let (x, _) = separable();
            let y = vec![0.0, 0.0, 0.5, 1.0, 1.0, 1.0];
            assert!(fit_weights(&x, &y, &TrainOptions::default()).is_err());
        }

        #[test]
        fn test_rejects_invalid_options() {
            let (x, y) = separable();
            for options in [
                TrainOptions {
                    max_iterations: 0,
                    ..TrainOptions::default()
                },
                TrainOptions {
                    learning_rate: 0.0,
                    ..TrainOptions::default()
                },
                TrainOptions {
                    regularization: -1.0,
                    ..TrainOptions::default()
                },
            ] {
                assert!(fit_weights(&x, &y, &options).is_err());
            }
        }

        #[test]
        fn test_sigmoid_is_stable() {
            assert_eq!(sigmoid(0.0), 0.5);
            assert!(sigmoid(-1000.0) >= 0.0);
            assert_eq!(sigmoid(1000.0), 1.0);
            assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-15);
        }
    }

    mod metrics {
        use super::*;

        #[test]
        fn test_confusion_and_rates() {
            let y = [1.0, 1.0, 0.0, 0.0, 1.0];
            let p = [0.9, 0.2, 0.6, 0.1, 0.7];
            let m = ClassificationMetrics::compute(&y, &p);
            assert_eq!(
                m.confusion_matrix,
                ConfusionMatrix {
                    true_positive: 2,
                    false_positive: 1,
                    true_negative: 1,
                    false_negative: 1,
                }
            );
            assert!((m.accuracy - 0.6).abs() < 1e-12);
            assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
            assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
            assert!((m.f1 - 2.0 / 3.0).abs() < 1e-12);
            // positives 0.9, 0.2, 0.7 vs negatives 0.6, 0.1: 4 of 6 pairs ordered
            assert!((m.auc.unwrap() - 4.0 / 6.0).abs() < 1e-12);
        }

        #[test]
        fn test_zero_denominators_resolve_to_zero() {
            let m = ClassificationMetrics::compute(&[0.0, 0.0], &[0.1, 0.2]);
            assert_eq!(m.precision, 0.0);
            assert_eq!(m.recall, 0.0);
            assert_eq!(m.f1, 0.0);
            assert_eq!(m.accuracy, 1.0);
            assert!(m.auc.is_none());
        }

        #[test]
        fn test_auc_ties_count_half() {
            let auc = auc(&[1.0, 0.0], &[0.5, 0.5]).unwrap();
            assert!((auc - 0.5).abs() < 1e-12);
        }
    }

    mod model {
        use super::*;

        #[test]
        fn test_train_reaches_full_training_accuracy() {
            let (x, y) = separable();
            let matrix = FeatureMatrix::new(vec!["score".into()], x, y).unwrap();
            let options = TrainOptions {
                test_ratio: 0.0,
                ..TrainOptions::default()
            };
            let mut rng = Pcg64::seed_from_u64(11);
            let model = train(&matrix, EncodingInfo::default(), None, &options, &mut rng).unwrap();
            assert!(model.converged);
            assert_eq!(model.training_metrics.accuracy, 1.0);
            assert_eq!(model.metrics, model.training_metrics);
            assert_eq!(model.dimensions, ["score"]);
            assert!(model.probability(&[9.0]).unwrap() > 0.99);
            assert!(model.probability(&[9.0, 1.0]).is_err());
        }

        #[test]
        fn test_held_out_metrics() {
            let x = (0..20)
                .map(|i| vec![-5.0 - f64::from(i)])
                .chain((0..20).map(|i| vec![5.0 + f64::from(i)]))
                .collect();
            let y = (0..40).map(|i| if i < 20 { 0.0 } else { 1.0 }).collect();
            let matrix = FeatureMatrix::new(vec!["score".into()], x, y).unwrap();
            let mut rng = Pcg64::seed_from_u64(12);
            let model =
                train(&matrix, EncodingInfo::default(), None, &TrainOptions::default(), &mut rng)
                    .unwrap();
            assert_eq!(model.metrics.samples, 8);
            assert_eq!(model.training_metrics.samples, 32);
            assert_eq!(model.metrics.accuracy, 1.0);
        }

        #[test]
        fn test_same_seed_same_weights() {
            let (x, y) = separable();
            let options = TrainOptions {
                seed: Some(5),
                test_ratio: 0.3,
                ..TrainOptions::default()
            };
            let a = train_raw(x.clone(), y.clone(), None, &options).unwrap();
            let b = train_raw(x, y, None, &options).unwrap();
            assert_eq!(a.weights, b.weights);
            assert_eq!(a.metrics, b.metrics);
        }

        #[test]
        fn test_feature_importance() {
            let (x, y) = separable();
            let mut model = train_raw(x, y, None, &TrainOptions::default()).unwrap();
            model.dimensions = vec!["a".into(), "b".into()];
            model.weights = vec![0.3, -3.0, 1.0];
            let importance = model.feature_importance();
            assert_eq!(importance[0].dimension, "a");
            assert!((importance[0].importance - 0.75).abs() < 1e-12);
            assert!((importance[1].importance - 0.25).abs() < 1e-12);
            assert_eq!(model.weight_map()["b"], 1.0);
        }

        #[test]
        fn test_model_round_trips_through_json() {
            let (x, y) = separable();
            let model = train_raw(x, y, None, &TrainOptions::default()).unwrap();
            let json = serde_json::to_string(&model).unwrap();
            let back: LogisticModel = serde_json::from_str(&json).unwrap();
            assert_eq!(back.weights, model.weights);
            assert_eq!(back.trained_at, model.trained_at);
        }
    }
}
