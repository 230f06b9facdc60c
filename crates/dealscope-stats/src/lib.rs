//! Statistical building blocks for the dealscope analytics engine.
//!
//! This crate provides the numeric leaf layer that the engine's models are
//! built from:
//!
//! - **Descriptive statistics**: mean, median, population variance and standard deviation
//! - **Percentiles**: interpolated percentiles and quartile-based outlier fences
//! - **Distributions**: Student-t, F and standard normal CDFs and quantiles
//! - **Proportions**: win rates with Wald confidence intervals
//! - **Matrices**: design matrices and scale-invariant Gram inversion for least squares
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`percentiles`]: Percentile computation and Tukey fences
//! - [`distribution`]: Probability distributions used for inference
//! - [`proportion`]: Proportions and their confidence intervals
//! - [`matrix`]: Least-squares helpers over `nalgebra`
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use dealscope_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```
//!
//! ## Computing outlier fences
//!
//! ```
//! use dealscope_stats::percentiles::Quartiles;
//!
//! let quartiles = Quartiles::new(&[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();
//! let (_lower, upper) = quartiles.fences(Quartiles::DEFAULT_FENCE);
//! assert!(upper < 100.0);
//! ```
//!
//! ## Win rate with a confidence interval
//!
//! ```
//! use dealscope_stats::proportion::{Proportion, WALD_Z_95};
//!
//! let win_rate = Proportion::new(30, 60);
//! let interval = win_rate.wald_interval(WALD_Z_95).unwrap();
//! assert!(interval.contains(0.5));
//! ```

pub mod descriptive;
pub mod distribution;
pub mod matrix;
pub mod percentiles;
pub mod proportion;
