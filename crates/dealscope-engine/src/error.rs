use serde::{Deserialize, Serialize};

/// Errors raised by the analytics engine.
///
/// Every error is local to one call and recoverable by the caller: fix the
/// input shape, drop a collinear dimension, or pick a different `k`.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum AnalysisError {
    #[display("invalid input: {message}")]
    Validation { message: String },
    #[display("singular matrix: {context}")]
    SingularMatrix { context: String },
    #[display(
        "insufficient data: {observations} observations for {parameters} parameters leaves no residual degrees of freedom"
    )]
    InsufficientData {
        observations: usize,
        parameters: usize,
    },
    #[display("cannot compute {statistic}: {detail}")]
    NonFinite { statistic: String, detail: String },
    #[display("k must be between 1 and {points}, got {k}")]
    InvalidK { k: usize, points: usize },
}

/// Coarse error category, used by callers to decide how to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Numerical,
}

impl AnalysisError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn non_finite(statistic: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::NonFinite {
            statistic: statistic.into(),
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::InvalidK { .. } => ErrorKind::Validation,
            Self::SingularMatrix { .. } | Self::InsufficientData { .. } | Self::NonFinite { .. } => {
                ErrorKind::Numerical
            }
        }
    }
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;

/// Degenerate-input and convergence conditions that are handled with a
/// documented fallback instead of failing the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_more::Display)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Warning {
    /// Every value of the dimension is identical; a normalizer of 1 is used.
    #[display("dimension '{dimension}' has zero variance")]
    ZeroVariance { dimension: String },
    /// The interquartile range is zero, so outlier fences were not applied.
    #[display("dimension '{dimension}' has zero interquartile range; outlier handling skipped")]
    ZeroInterquartileRange { dimension: String },
    /// No point was assigned to the cluster; its previous centroid was kept.
    #[display("cluster {cluster} has no members")]
    EmptyCluster { cluster: usize },
    /// The iteration budget ran out before the convergence criterion was met.
    #[display("stopped after {iterations} iterations without converging")]
    NotConverged { iterations: usize },
    /// Lookup cells without matching records; their win rate is 0 and interval empty.
    #[display("{count} lookup cells have no matching records")]
    EmptyLookupCells { count: usize },
    /// Records removed by the missing-value or outlier policy.
    #[display("{count} records dropped during preprocessing")]
    DroppedRecords { count: usize },
}
