//! Win-rate lookup tables over dimension-value combinations.
//!
//! The table enumerates the Cartesian product of the observed values of each
//! dimension and reports, for every combination, the win rate of the records
//! matching all of its values together with a Wald confidence interval.
//!
//! # Pruning
//!
//! When the full product exceeds `max_combinations`, every dimension is cut
//! independently to its most frequent values, at most
//! `max(2, floor(max_combinations^(1/d)))` each. The bound is approximate:
//! because of the floor of 2 the pruned product can still exceed
//! `max_combinations` (three dimensions under a budget of 4 keep 8 cells).

use std::collections::HashMap;

use dealscope_stats::{
    distribution::normal_critical_value,
    proportion::{Interval, Proportion, WALD_Z_95},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AnalysisError, Result, Warning},
    record::{Dimension, Record, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LookupOptions {
    pub max_combinations: usize,
    /// Minimum sample size for a cell to be flagged significant.
    pub significance_threshold: usize,
    /// Normal multiplier of the Wald interval.
    pub z: f64,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            max_combinations: 1000,
            significance_threshold: 10,
            z: WALD_Z_95,
        }
    }
}

impl LookupOptions {
    /// Uses the exact normal critical value for a two-sided `level`.
    #[must_use]
    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.z = normal_critical_value(level);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupCell {
    /// One value per table dimension.
    pub values: Vec<Value>,
    pub win_rate: f64,
    pub sample_size: usize,
    pub wins: usize,
    /// `None` when no record matches.
    pub confidence_interval: Option<Interval>,
    pub significant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupTable {
    pub dimensions: Vec<String>,
    /// Values actually enumerated per dimension.
    pub domains: Vec<Vec<Value>>,
    pub cells: Vec<LookupCell>,
    /// Whether any domain was cut to respect `max_combinations`.
    pub pruned: bool,
    pub warnings: Vec<Warning>,
}

impl LookupTable {
    /// The cell whose values loosely equal `values`.
    #[must_use]
    pub fn find(&self, values: &[Value]) -> Option<&LookupCell> {
        self.cells.iter().find(|cell| {
            cell.values.len() == values.len()
                && cell.values.iter().zip(values).all(|(a, b)| a.loose_eq(b))
        })
    }
}

/// Observed values of one dimension with their frequencies.
struct Domain {
    values: Vec<Value>,
    counts: Vec<usize>,
}

impl Domain {
    fn observe(records: &[Record], dimension: &Dimension) -> Self {
        let mut domain = Self {
            values: vec![],
            counts: vec![],
        };
        for value in records.iter().filter_map(|r| r.get(&dimension.name)) {
            let legal = dimension
                .domain
                .as_ref()
                .is_none_or(|legal| legal.iter().any(|v| v.loose_eq(value)));
            if !legal {
                continue;
            }
            match domain.position(value) {
                Some(i) => domain.counts[i] += 1,
                None => {
                    domain.values.push(value.clone());
                    domain.counts.push(1);
                }
            }
        }
        domain
    }

    fn position(&self, value: &Value) -> Option<usize> {
        self.values.iter().position(|v| v.loose_eq(value))
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keeps the `cap` most frequent values; ties keep first-seen order.
    ///
    /// Returns whether any value was removed.
    fn prune(&mut self, cap: usize) -> bool {
        if self.len() <= cap {
            return false;
        }
        let mut order = (0..self.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| self.counts[b].cmp(&self.counts[a]).then(a.cmp(&b)));
        order.truncate(cap);
        self.values = order.iter().map(|&i| self.values[i].clone()).collect();
        self.counts = order.iter().map(|&i| self.counts[i]).collect();
        true
    }
}

/// Largest `r` with `r^d <= n`.
fn integer_root(n: usize, d: usize) -> usize {
    let Ok(exp) = u32::try_from(d) else {
        return 1;
    };
    let fits = |r: usize| r.checked_pow(exp).is_some_and(|p| p <= n);
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let mut r = (n as f64).powf(1.0 / d as f64).floor() as usize;
    while r > 0 && !fits(r) {
        r -= 1;
    }
    while fits(r + 1) {
        r += 1;
    }
    r
}

/// Builds a lookup table from raw records.
///
/// ```
/// use dealscope_engine::{
///     lookup::{LookupOptions, generate},
///     record::{Dimension, Record, Value},
/// };
///
/// let records = (0..10)
///     .map(|i| Record::new(i.to_string(), i < 8).with("segment", "smb"))
///     .collect::<Vec<_>>();
/// let table = generate(&records, &[Dimension::categorical("segment")], &LookupOptions::default())
///     .unwrap();
///
/// let cell = table.find(&[Value::from("smb")]).unwrap();
/// assert_eq!(cell.win_rate, 0.8);
/// assert_eq!(cell.sample_size, 10);
/// assert!(cell.significant);
/// ```
pub fn generate(
    records: &[Record],
    dimensions: &[Dimension],
    options: &LookupOptions,
) -> Result<LookupTable> {
    if dimensions.is_empty() {
        return Err(AnalysisError::validation("lookup table needs at least one dimension"));
    }
    if options.max_combinations == 0 {
        return Err(AnalysisError::validation("max_combinations must be positive"));
    }

    let mut domains = dimensions
        .iter()
        .map(|d| Domain::observe(records, d))
        .collect::<Vec<_>>();
    let total = domains
        .iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(d.len()));
    let mut pruned = false;
    if total.is_none_or(|t| t > options.max_combinations) {
        let cap = integer_root(options.max_combinations, dimensions.len()).max(2);
        for domain in &mut domains {
            pruned |= domain.prune(cap);
        }
        tracing::debug!(cap, max_combinations = options.max_combinations, "pruned lookup domains");
    }

    let mut counts: HashMap<Vec<usize>, (usize, usize)> = HashMap::new();
    'records: for record in records {
        let mut key = Vec::with_capacity(dimensions.len());
        for (dimension, domain) in dimensions.iter().zip(&domains) {
            let Some(index) = record.get(&dimension.name).and_then(|v| domain.position(v)) else {
                continue 'records;
            };
            key.push(index);
        }
        let entry = counts.entry(key).or_default();
        entry.0 += usize::from(record.won);
        entry.1 += 1;
    }

    let mut cells = vec![];
    let mut index = vec![0; dimensions.len()];
    if domains.iter().all(|d| !d.is_empty()) {
        loop {
            let (wins, sample_size) = counts.get(&index).copied().unwrap_or_default();
            let proportion = Proportion::new(wins, sample_size);
            cells.push(LookupCell {
                values: index
                    .iter()
                    .zip(&domains)
                    .map(|(&i, d)| d.values[i].clone())
                    .collect(),
                win_rate: proportion.rate(),
                sample_size,
                wins,
                confidence_interval: proportion.wald_interval(options.z),
                significant: sample_size >= options.significance_threshold,
            });
            if !advance(&mut index, &domains) {
                break;
            }
        }
    }

    let mut warnings = vec![];
    let empty = cells.iter().filter(|c| c.sample_size == 0).count();
    if empty > 0 {
        warnings.push(Warning::EmptyLookupCells { count: empty });
        tracing::debug!(empty, "lookup cells without records");
    }

    Ok(LookupTable {
        dimensions: dimensions.iter().map(|d| d.name.clone()).collect(),
        domains: domains.into_iter().map(|d| d.values).collect(),
        cells,
        pruned,
        warnings,
    })
}

/// Odometer increment, last dimension fastest. Returns `false` after the last combination.
fn advance(index: &mut [usize], domains: &[Domain]) -> bool {
    for (i, domain) in index.iter_mut().zip(domains).rev() {
        *i += 1;
        if *i < domain.len() {
            return true;
        }
        *i = 0;
    }
    false
}
