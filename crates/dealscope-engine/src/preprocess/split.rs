use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use super::FeatureMatrix;
use crate::error::{AnalysisError, Result};

/// Train and held-out partitions of a [`FeatureMatrix`].
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: FeatureMatrix,
    /// `None` when the ratio rounds every stratum down to zero rows.
    pub test: Option<FeatureMatrix>,
}

/// Splits rows into train and test partitions.
///
/// In stratified mode won (`y >= 0.5`) and lost rows are split independently,
/// each stratum sending `round(len · test_ratio)` rows to the test partition,
/// so both partitions keep the class ratio. Both partitions are shuffled.
///
/// ```
/// use dealscope_engine::preprocess::{FeatureMatrix, train_test_split};
/// use rand::SeedableRng;
///
/// let x = (0..10).map(|i| vec![f64::from(i)]).collect();
/// let y = (0..10).map(|i| f64::from(i % 2)).collect();
/// let m = FeatureMatrix::new(vec!["n".into()], x, y).unwrap();
///
/// let mut rng = rand_pcg::Pcg64::seed_from_u64(7);
/// let split = train_test_split(&m, 0.2, true, &mut rng).unwrap();
/// let test = split.test.unwrap();
/// assert_eq!(test.len(), 2);
/// assert_eq!(test.y().iter().sum::<f64>(), 1.0);
/// ```
pub fn train_test_split<R>(
    matrix: &FeatureMatrix,
    test_ratio: f64,
    stratified: bool,
    rng: &mut R,
) -> Result<Split>
where
    R: Rng + ?Sized,
{
    if !(0.0..1.0).contains(&test_ratio) {
        return Err(AnalysisError::validation(format!(
            "test ratio must be in [0, 1), got {test_ratio}"
        )));
    }

    let strata = if stratified {
        let (won, lost) = partition_by_class(matrix.y());
        vec![won, lost]
    } else {
        vec![(0..matrix.len()).collect()]
    };

    let mut train = vec![];
    let mut test = vec![];
    for mut stratum in strata {
        stratum.shuffle(rng);
        let test_len = test_count(stratum.len(), test_ratio);
        test.extend_from_slice(&stratum[..test_len]);
        train.extend_from_slice(&stratum[test_len..]);
    }
    train.shuffle(rng);
    test.shuffle(rng);

    let train = matrix.select(&train).ok_or_else(|| {
        AnalysisError::validation(format!(
            "test ratio {test_ratio} leaves no training rows out of {}",
            matrix.len()
        ))
    })?;
    Ok(Split {
        train,
        test: matrix.select(&test),
    })
}

#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn test_count(len: usize, ratio: f64) -> usize {
    ((len as f64 * ratio).round() as usize).min(len)
}

fn partition_by_class(y: &[f64]) -> (Vec<usize>, Vec<usize>) {
    (0..y.len()).partition(|&i| y[i] >= 0.5)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::FromStr)]
#[serde(rename_all = "snake_case")]
pub enum BalanceMethod {
    /// Keeps a random subset of the majority class.
    Undersample,
    /// Draws extra minority rows with replacement.
    Oversample,
}

/// Equalizes class counts.
///
/// Equal counts return the matrix unchanged whatever the method. Kept rows
/// stay in their original order; oversampled copies are appended.
pub fn balance<R>(matrix: &FeatureMatrix, method: BalanceMethod, rng: &mut R) -> Result<FeatureMatrix>
where
    R: Rng + ?Sized,
{
    let (won, lost) = partition_by_class(matrix.y());
    if won.is_empty() || lost.is_empty() {
        return Err(AnalysisError::validation(
            "class balancing needs both won and lost rows",
        ));
    }
    if won.len() == lost.len() {
        return Ok(matrix.clone());
    }
    let (majority, minority) = if won.len() > lost.len() {
        (won, lost)
    } else {
        (lost, won)
    };

    let indices = match method {
        BalanceMethod::Undersample => {
            let mut kept = rand::seq::index::sample(rng, majority.len(), minority.len())
                .into_iter()
                .map(|i| majority[i])
                .chain(minority.iter().copied())
                .collect::<Vec<_>>();
            kept.sort_unstable();
            kept
        }
        BalanceMethod::Oversample => {
            let extra = majority.len() - minority.len();
            let mut kept = (0..matrix.len()).collect::<Vec<_>>();
            kept.extend((0..extra).map(|_| minority[rng.random_range(0..minority.len())]));
            kept
        }
    };
    matrix
        .select(&indices)
        .ok_or_else(|| AnalysisError::validation("class balancing produced no rows"))
}
