//! Scoring new records with a trained [`LogisticModel`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{AnalysisError, Result},
    logistic::LogisticModel,
    record::{Record, Value},
};

/// Probability cut-offs for the [`Category`] buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryThresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for CategoryThresholds {
    fn default() -> Self {
        Self {
            high: 0.7,
            medium: 0.4,
        }
    }
}

impl CategoryThresholds {
    fn validate(&self) -> Result<()> {
        if (0.0..=1.0).contains(&self.medium)
            && (0.0..=1.0).contains(&self.high)
            && self.medium <= self.high
        {
            Ok(())
        } else {
            Err(AnalysisError::validation(format!(
                "thresholds must satisfy 0 <= medium ({}) <= high ({}) <= 1",
                self.medium, self.high
            )))
        }
    }

    #[must_use]
    pub fn categorize(&self, probability: f64) -> Category {
        if probability >= self.high {
            Category::High
        } else if probability >= self.medium {
            Category::Medium
        } else {
            Category::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[display("high")]
    High,
    #[display("medium")]
    Medium,
    #[display("low")]
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub dimension: String,
    /// Encoded (and normalized) feature value.
    pub value: f64,
    pub weight: f64,
    /// `weight × value`.
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub probability: f64,
    pub category: Category,
    /// Ranked by descending absolute contribution.
    pub contributions: Vec<Contribution>,
}

/// Features to score: named raw values, or a numeric vector in model dimension order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureInput {
    Vector(Vec<f64>),
    Named(BTreeMap<String, Option<Value>>),
}

/// Encodes and normalizes named values the way the model's training data was.
pub fn features(model: &LogisticModel, values: &BTreeMap<String, Option<Value>>) -> Result<Vec<f64>> {
    let raw = model.encoding.encode_values(&model.dimensions, values)?;
    normalized(model, raw)
}

fn normalized(model: &LogisticModel, mut row: Vec<f64>) -> Result<Vec<f64>> {
    if row.len() != model.dimensions.len() {
        return Err(AnalysisError::validation(format!(
            "model has {} dimensions, got {} features",
            model.dimensions.len(),
            row.len()
        )));
    }
    if let Some(normalization) = &model.normalization {
        if normalization.columns.len() != row.len() {
            return Err(AnalysisError::validation(
                "model normalization does not match its dimensions",
            ));
        }
        normalization.apply_row(&mut row);
    }
    Ok(row)
}

/// Scores one feature input.
///
/// ```
/// use std::collections::BTreeMap;
///
/// use dealscope_engine::{
///     logistic::{TrainOptions, train_raw},
///     prediction::{Category, CategoryThresholds, FeatureInput, score},
/// };
///
/// let x = [-10.0, -9.0, -8.0, 8.0, 9.0, 10.0].map(|v| vec![v]).to_vec();
/// let y = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
/// let options = TrainOptions { test_ratio: 0.0, seed: Some(1), ..TrainOptions::default() };
/// let model = train_raw(x, y, Some(vec!["score".into()]), &options).unwrap();
///
/// let input = FeatureInput::Vector(vec![9.5]);
/// let prediction = score(&model, &input, &CategoryThresholds::default()).unwrap();
/// assert_eq!(prediction.category, Category::High);
/// assert_eq!(prediction.contributions[0].dimension, "score");
/// ```
pub fn score(
    model: &LogisticModel,
    input: &FeatureInput,
    thresholds: &CategoryThresholds,
) -> Result<Prediction> {
    thresholds.validate()?;
    let row = match input {
        FeatureInput::Vector(raw) => {
            if let Some(i) = raw.iter().position(|v| !v.is_finite()) {
                return Err(AnalysisError::validation(format!("feature {i} is not finite")));
            }
            normalized(model, raw.clone())?
        }
        FeatureInput::Named(values) => features(model, values)?,
    };
    let probability = model.probability(&row)?;

    let mut contributions = model
        .dimensions
        .iter()
        .zip(&model.weights[1..])
        .zip(&row)
        .map(|((dimension, &weight), &value)| Contribution {
            dimension: dimension.clone(),
            value,
            weight,
            contribution: weight * value,
        })
        .collect::<Vec<_>>();
    contributions.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));

    Ok(Prediction {
        probability,
        category: thresholds.categorize(probability),
        contributions,
    })
}

pub fn score_record(
    model: &LogisticModel,
    record: &Record,
    thresholds: &CategoryThresholds,
) -> Result<Prediction> {
    score(model, &FeatureInput::Named(record.values.clone()), thresholds)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub count: usize,
    /// `0` for an empty batch.
    pub average_probability: f64,
    pub category_breakdown: CategoryBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPrediction {
    pub predictions: Vec<Prediction>,
    pub summary: BatchSummary,
}

/// Scores every input; the first failing input fails the batch.
pub fn batch_score(
    model: &LogisticModel,
    inputs: &[FeatureInput],
    thresholds: &CategoryThresholds,
) -> Result<BatchPrediction> {
    let predictions = inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            score(model, input, thresholds).map_err(|err| match err {
                AnalysisError::Validation { message } => AnalysisError::Validation {
                    message: format!("input {i}: {message}"),
                },
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut breakdown = CategoryBreakdown::default();
    for prediction in &predictions {
        match prediction.category {
            Category::High => breakdown.high += 1,
            Category::Medium => breakdown.medium += 1,
            Category::Low => breakdown.low += 1,
        }
    }
    let count = predictions.len();
    #[expect(clippy::cast_precision_loss)]
    let average_probability = if count == 0 {
        0.0
    } else {
        predictions.iter().map(|p| p.probability).sum::<f64>() / count as f64
    };

    Ok(BatchPrediction {
        predictions,
        summary: BatchSummary {
            count,
            average_probability,
            category_breakdown: breakdown,
        },
    })
}
