//! Feature preprocessing: raw records to numeric feature matrices.
//!
//! # Pipeline
//!
//! 1. Target extraction: the `won` flag (`1.0`/`0.0`) or a numeric field
//! 2. Missing values: imputed from configured defaults (or `0`), or the record is dropped
//! 3. Categorical encoding: first-seen label codes recorded in [`EncodingInfo`]
//! 4. Outliers: Tukey fences `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]` per numeric column, capped or removed
//! 5. Normalization: optional z-score or min-max scaling recorded in [`Normalization`]
//!
//! Splitting and class balancing are separate steps ([`train_test_split`],
//! [`balance`]) because only the logistic trainer needs them.
//!
//! # Example
//!
//! ```
//! use dealscope_engine::{
//!     preprocess::{PreprocessConfig, Target, preprocess},
//!     record::{Dimension, Record},
//! };
//!
//! let records = vec![
//!     Record::new("a", true).with("amount", 100.0).with("segment", "smb"),
//!     Record::new("b", false).with("amount", 250.0).with("segment", "ent"),
//!     Record::new("c", true).with_missing("amount").with("segment", "smb"),
//! ];
//! let dims = [Dimension::numeric("amount"), Dimension::categorical("segment")];
//!
//! let out = preprocess(&records, &dims, &Target::Outcome, &PreprocessConfig::default()).unwrap();
//! assert_eq!(out.matrix.x(), &[vec![100.0, 1.0], vec![250.0, 2.0], vec![0.0, 1.0]]);
//! assert_eq!(out.matrix.y(), &[1.0, 0.0, 1.0]);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use dealscope_stats::percentiles::Quartiles;
use serde::{Deserialize, Serialize};

pub use self::{encoding::*, matrix::*, normalize::*, split::*};
use crate::{
    error::{AnalysisError, Result, Warning},
    record::{Dimension, Record, Value},
};

mod encoding;
mod matrix;
mod normalize;
mod split;

/// What the target vector `y` holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// The `won` flag as `1.0`/`0.0`.
    #[default]
    Outcome,
    /// A numeric record field. Records without it are dropped.
    Field(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::FromStr)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    #[default]
    Impute,
    Drop,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::FromStr)]
#[serde(rename_all = "snake_case")]
pub enum OutlierPolicy {
    #[default]
    Cap,
    Remove,
    Keep,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreprocessConfig {
    pub missing: MissingPolicy,
    /// Per-dimension replacement for missing values.
    pub defaults: BTreeMap<String, Value>,
    pub outliers: OutlierPolicy,
    pub normalization: NormalizationMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preprocessed {
    pub matrix: FeatureMatrix,
    pub encoding: EncodingInfo,
    pub normalization: Option<Normalization>,
    pub warnings: Vec<Warning>,
    /// Records removed by the missing-value, target or outlier policy.
    pub dropped: usize,
}

/// Converts records into a [`FeatureMatrix`].
///
/// Column order follows `dimensions`. Fails when a numeric dimension holds a
/// non-numeric value, when dimension names repeat, or when no record survives.
pub fn preprocess(
    records: &[Record],
    dimensions: &[Dimension],
    target: &Target,
    config: &PreprocessConfig,
) -> Result<Preprocessed> {
    if dimensions.is_empty() {
        return Err(AnalysisError::validation("empty feature set"));
    }
    let mut seen = BTreeSet::new();
    if let Some(dup) = dimensions.iter().find(|d| !seen.insert(d.name.as_str())) {
        return Err(AnalysisError::validation(format!(
            "dimension '{}' listed twice",
            dup.name
        )));
    }

    let mut encoding = EncodingInfo::default();
    for dim in dimensions.iter().filter(|d| d.is_categorical()) {
        encoding.register(&dim.name);
    }

    let mut x = Vec::with_capacity(records.len());
    let mut y = Vec::with_capacity(records.len());
    let mut ids = Vec::with_capacity(records.len());
    'records: for record in records {
        let Some(target_value) = target_value(record, target)? else {
            continue;
        };
        let mut row = Vec::with_capacity(dimensions.len());
        for dim in dimensions {
            let value = match record.get(&dim.name) {
                Some(value) => Some(value),
                None if config.missing == MissingPolicy::Drop => continue 'records,
                None => config.defaults.get(&dim.name),
            };
            row.push(encode_value(&mut encoding, record, dim, value)?);
        }
        x.push(row);
        y.push(target_value);
        ids.push(record.id.clone());
    }

    let numeric = dimensions
        .iter()
        .map(|d| !d.is_categorical())
        .collect::<Vec<_>>();
    let mut warnings = vec![];
    if let Some(keep) =
        handle_outliers(dimensions, &numeric, &mut x, config.outliers, &mut warnings)
    {
        retain_rows(&mut x, &keep);
        retain_rows(&mut y, &keep);
        retain_rows(&mut ids, &keep);
    }

    let dropped = records.len() - x.len();
    if x.is_empty() {
        return Err(AnalysisError::validation(format!(
            "no records left after preprocessing ({} input)",
            records.len()
        )));
    }

    let names = dimensions.iter().map(|d| d.name.clone()).collect::<Vec<_>>();
    let categorical = numeric.iter().map(|n| !n).collect::<Vec<_>>();
    let normalization =
        Normalization::fit(config.normalization, &names, &x, &categorical).map(|(norm, w)| {
            warnings.extend(w);
            for row in &mut x {
                norm.apply_row(row);
            }
            norm
        });

    if dropped > 0 {
        warnings.push(Warning::DroppedRecords { count: dropped });
    }
    for warning in &warnings {
        tracing::warn!(%warning, "preprocessing");
    }
    tracing::debug!(
        rows = x.len(),
        columns = names.len(),
        dropped,
        "preprocessed records"
    );

    Ok(Preprocessed {
        matrix: FeatureMatrix::with_ids(names, x, y, ids)?,
        encoding,
        normalization,
        warnings,
        dropped,
    })
}

fn target_value(record: &Record, target: &Target) -> Result<Option<f64>> {
    match target {
        Target::Outcome => Ok(Some(if record.won { 1.0 } else { 0.0 })),
        Target::Field(field) => match record.get(field) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| {
                    AnalysisError::validation(format!(
                        "record '{}': target '{field}' is not numeric ('{value}')",
                        record.id
                    ))
                }),
        },
    }
}

fn encode_value(
    encoding: &mut EncodingInfo,
    record: &Record,
    dim: &Dimension,
    value: Option<&Value>,
) -> Result<f64> {
    if dim.is_categorical() {
        return Ok(value.map_or(0.0, |v| f64::from(encoding.encode_or_insert(&dim.name, v))));
    }
    match value {
        None => Ok(0.0),
        Some(v) => v.as_f64().filter(|n| n.is_finite()).ok_or_else(|| {
            AnalysisError::validation(format!(
                "record '{}': dimension '{}' expects a number, got '{v}'",
                record.id, dim.name
            ))
        }),
    }
}

fn retain_rows<T>(rows: &mut Vec<T>, keep: &[bool]) {
    let mut keep = keep.iter();
    rows.retain(|_| keep.next().copied().unwrap_or(true));
}

/// Applies Tukey fences to every numeric column.
///
/// Capping clips values in place. Removal returns a keep-mask over rows;
/// fences are computed from the full column before any row is removed.
/// A column with zero IQR is left untouched.
fn handle_outliers(
    dimensions: &[Dimension],
    numeric: &[bool],
    x: &mut [Vec<f64>],
    policy: OutlierPolicy,
    warnings: &mut Vec<Warning>,
) -> Option<Vec<bool>> {
    if policy == OutlierPolicy::Keep {
        return None;
    }
    let mut keep = vec![true; x.len()];
    for (j, dim) in dimensions.iter().enumerate() {
        if !numeric[j] {
            continue;
        }
        let column = x.iter().map(|row| row[j]).collect::<Vec<_>>();
        let Some(quartiles) = Quartiles::new(&column) else {
            continue;
        };
        if quartiles.iqr <= 0.0 {
            warnings.push(Warning::ZeroInterquartileRange {
                dimension: dim.name.clone(),
            });
            continue;
        }
        let (lower, upper) = quartiles.fences(Quartiles::DEFAULT_FENCE);
        for (row, keep) in x.iter_mut().zip(&mut keep) {
            let value = row[j];
            if (lower..=upper).contains(&value) {
                continue;
            }
            match policy {
                OutlierPolicy::Cap => row[j] = value.clamp(lower, upper),
                OutlierPolicy::Remove => *keep = false,
                OutlierPolicy::Keep => {}
            }
        }
    }
    (policy == OutlierPolicy::Remove).then_some(keep)
}
