//! Win-rate analytics over labeled business records.
//!
//! Records are opportunities with a binary won/lost outcome and any number of
//! numeric or categorical dimensions. This crate turns them into models:
//!
//! - [`preprocess`]: records to feature matrices (imputation, encoding, outliers,
//!   normalization, stratified splits, class balancing)
//! - [`regression`]: multivariate linear regression with inferential statistics
//! - [`logistic`]: regularized logistic regression with validation metrics
//! - [`cluster`]: k-means with per-cluster distinctiveness
//! - [`lookup`]: win-rate tables over dimension-value combinations
//! - [`prediction`] and [`formula`]: scoring new records with a trained model
//!
//! Every analysis is a pure function of its inputs. Randomness (centroid
//! draws, shuffles, oversampling) comes from an injected [`rand::Rng`];
//! [`seeded_rng`] builds the generator the service and CLI use.

use rand::SeedableRng;
use rand_pcg::Pcg64;

pub mod cluster;
pub mod error;
pub mod formula;
pub mod logistic;
pub mod lookup;
pub mod prediction;
pub mod preprocess;
pub mod record;
pub mod regression;

/// A deterministic generator for `Some(seed)`, a system-seeded one otherwise.
///
/// ```
/// use rand::Rng;
///
/// let a = dealscope_engine::seeded_rng(Some(3)).random::<u64>();
/// let b = dealscope_engine::seeded_rng(Some(3)).random::<u64>();
/// assert_eq!(a, b);
/// ```
#[must_use]
pub fn seeded_rng(seed: Option<u64>) -> Pcg64 {
    match seed {
        Some(seed) => Pcg64::seed_from_u64(seed),
        None => Pcg64::from_rng(&mut rand::rng()),
    }
}
