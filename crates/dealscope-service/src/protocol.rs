//! Wire types of the worker protocol.
//!
//! ```text
//! Request:  { action, id, data }
//! Success:  { success: true,  id, result }
//! Failure:  { success: false, id, error, kind }
//! ```
//!
//! `id` is an opaque correlation token: it is echoed back untouched and never
//! inspected.

use dealscope_engine::{
    error::{AnalysisError, ErrorKind},
    formula::FormulaOptions,
    logistic::{LogisticModel, TrainOptions},
    lookup::LookupOptions,
    prediction::{CategoryThresholds, FeatureInput},
    record::{Dimension, Record},
    regression::RegressionOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub action: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub data: Value,
}

/// Failure category reported to callers.
///
/// `validation` and `numerical` can be fixed by adjusting the input;
/// `internal` is a defect in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    #[display("validation")]
    Validation,
    #[display("numerical")]
    Numerical,
    #[display("internal")]
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ResponseKind>,
}

impl Response {
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            success: true,
            id,
            result: Some(result),
            error: None,
            kind: None,
        }
    }

    #[must_use]
    pub fn failure(id: Value, error: &ServiceError) -> Self {
        Self {
            success: false,
            id,
            result: None,
            error: Some(error.to_string()),
            kind: Some(error.kind()),
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ServiceError {
    #[display("malformed request: {source}")]
    Malformed { source: serde_json::Error },
    #[display("unknown action '{action}'")]
    UnknownAction { action: String },
    #[display("invalid {action} payload: {source}")]
    InvalidPayload {
        action: String,
        source: serde_json::Error,
    },
    #[display("{_0}")]
    Analysis(#[error(not(source))] AnalysisError),
    #[display("failed to encode {action} result: {source}")]
    Encode {
        action: &'static str,
        source: serde_json::Error,
    },
    #[display("operation panicked: {message}")]
    Panicked { message: String },
}

impl ServiceError {
    #[must_use]
    pub fn kind(&self) -> ResponseKind {
        match self {
            Self::Malformed { .. } | Self::UnknownAction { .. } | Self::InvalidPayload { .. } => {
                ResponseKind::Validation
            }
            Self::Analysis(err) => match err.kind() {
                ErrorKind::Validation => ResponseKind::Validation,
                ErrorKind::Numerical => ResponseKind::Numerical,
            },
            Self::Encode { .. } | Self::Panicked { .. } => ResponseKind::Internal,
        }
    }
}

impl From<AnalysisError> for ServiceError {
    fn from(err: AnalysisError) -> Self {
        Self::Analysis(err)
    }
}

/// A request payload decoded according to its action.
#[derive(Debug, Clone)]
pub enum Operation {
    FitRegression(FitRegressionData),
    TrainLogistic(TrainLogisticData),
    Predict(PredictData),
    BatchPredict(BatchPredictData),
    ClusterKmeans(ClusterKmeansData),
    ClusterAnalysis(ClusterAnalysisData),
    GenerateLookupTable(LookupTableData),
    GenerateFormula(FormulaData),
}

impl Operation {
    pub const ACTIONS: [&str; 8] = [
        "fit_regression",
        "train_logistic",
        "predict",
        "batch_predict",
        "cluster_kmeans",
        "cluster_analysis",
        "generate_lookup_table",
        "generate_formula",
    ];

    /// Decodes `data` as the payload of `action`.
    ///
    /// ```
    /// use dealscope_service::Operation;
    /// use serde_json::json;
    ///
    /// let data = json!({"X": [[1.0], [2.0], [3.0]], "y": [1.0, 2.0, 2.5], "variableNames": ["a"]});
    /// let op = Operation::parse("fit_regression", data).unwrap();
    /// assert_eq!(op.action(), "fit_regression");
    ///
    /// assert!(Operation::parse("delete_everything", json!({})).is_err());
    /// ```
    pub fn parse(action: &str, data: Value) -> Result<Self, ServiceError> {
        fn payload<T>(action: &str, data: Value) -> Result<T, ServiceError>
        where
            T: serde::de::DeserializeOwned,
        {
            serde_json::from_value(data).map_err(|source| ServiceError::InvalidPayload {
                action: action.to_owned(),
                source,
            })
        }

        let op = match action {
            "fit_regression" => Self::FitRegression(payload(action, data)?),
            "train_logistic" => Self::TrainLogistic(payload(action, data)?),
            "predict" => Self::Predict(payload(action, data)?),
            "batch_predict" => Self::BatchPredict(payload(action, data)?),
            "cluster_kmeans" => Self::ClusterKmeans(payload(action, data)?),
            "cluster_analysis" => Self::ClusterAnalysis(payload(action, data)?),
            "generate_lookup_table" => Self::GenerateLookupTable(payload(action, data)?),
            "generate_formula" => Self::GenerateFormula(payload(action, data)?),
            _ => {
                return Err(ServiceError::UnknownAction {
                    action: action.to_owned(),
                });
            }
        };
        Ok(op)
    }

    #[must_use]
    pub fn action(&self) -> &'static str {
        let index = match self {
            Self::FitRegression(_) => 0,
            Self::TrainLogistic(_) => 1,
            Self::Predict(_) => 2,
            Self::BatchPredict(_) => 3,
            Self::ClusterKmeans(_) => 4,
            Self::ClusterAnalysis(_) => 5,
            Self::GenerateLookupTable(_) => 6,
            Self::GenerateFormula(_) => 7,
        };
        Self::ACTIONS[index]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitRegressionData {
    #[serde(rename = "X")]
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
    pub variable_names: Vec<String>,
    #[serde(flatten)]
    pub options: RegressionOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainLogisticData {
    #[serde(rename = "X")]
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
    #[serde(default)]
    pub variable_names: Option<Vec<String>>,
    #[serde(default)]
    pub options: TrainOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictData {
    pub model: LogisticModel,
    pub features: FeatureInput,
    #[serde(default)]
    pub thresholds: CategoryThresholds,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPredictData {
    pub model: LogisticModel,
    pub features_list: Vec<FeatureInput>,
    #[serde(default)]
    pub thresholds: CategoryThresholds,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterKmeansData {
    pub points: Vec<Vec<f64>>,
    pub k: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Coordinate names; `x0`, `x1`, ... when absent.
    #[serde(default)]
    pub dimensions: Option<Vec<String>>,
}

fn default_max_iterations() -> usize {
    100
}

/// One cluster's member indices, either bare or wrapped as `{members}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ClusterMembers {
    Indices(Vec<usize>),
    Object { members: Vec<usize> },
}

impl ClusterMembers {
    #[must_use]
    pub fn into_members(self) -> Vec<usize> {
        match self {
            Self::Indices(members) | Self::Object { members } => members,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAnalysisData {
    pub clusters: Vec<ClusterMembers>,
    pub original_data: Vec<Vec<f64>>,
    #[serde(default)]
    pub dimensions: Option<Vec<String>>,
    /// Won/lost flag per point, enabling per-cluster win rates.
    #[serde(default)]
    pub outcomes: Option<Vec<bool>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupTableData {
    pub records: Vec<Record>,
    pub dimensions: Vec<Dimension>,
    #[serde(flatten)]
    pub options: LookupOptions,
}

/// The part of a model needed to render its formula.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelWeights {
    pub weights: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaData {
    pub model: ModelWeights,
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub options: FormulaOptions,
}

/// `x0`, `x1`, ... for unnamed coordinates.
pub(crate) fn default_names(points: &[Vec<f64>]) -> Vec<String> {
    let width = points.first().map_or(0, Vec::len);
    (0..width).map(|j| format!("x{j}")).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    mod parse {
        use super::*;

        #[test]
        fn test_unknown_action() {
            let err = Operation::parse("fit_everything", json!({})).unwrap_err();
            assert!(matches!(err, ServiceError::UnknownAction { .. }));
            assert_eq!(err.kind(), ResponseKind::Validation);
        }

        #[test]
        fn test_missing_payload_field() {
            let err = Operation::parse("cluster_kmeans", json!({"points": [[1.0]]})).unwrap_err();
            assert!(matches!(err, ServiceError::InvalidPayload { .. }));
            assert!(err.to_string().starts_with("invalid cluster_kmeans payload"));
        }

        #[test]
        fn test_regression_options_are_flattened() {
            let op = Operation::parse(
                "fit_regression",
                json!({
                    "X": [[1.0]],
                    "y": [1.0],
                    "variableNames": ["a"],
                    "confidenceLevel": 0.9,
                    "impactPolicy": "raw",
                }),
            )
            .unwrap();
            let Operation::FitRegression(data) = op else {
                panic!("expected fit_regression");
            };
            assert_eq!(data.options.confidence_level, 0.9);
        }

        #[test]
        fn test_kmeans_defaults() {
            let op = Operation::parse("cluster_kmeans", json!({"points": [[1.0]], "k": 1})).unwrap();
            let Operation::ClusterKmeans(data) = op else {
                panic!("expected cluster_kmeans");
            };
            assert_eq!(data.max_iterations, 100);
            assert_eq!(data.seed, None);
            assert_eq!(default_names(&data.points), ["x0"]);
        }

        #[test]
        fn test_cluster_members_shapes() {
            let op = Operation::parse(
                "cluster_analysis",
                json!({
                    "clusters": [[0, 1], {"members": [2]}],
                    "originalData": [[0.0], [1.0], [5.0]],
                }),
            )
            .unwrap();
            let Operation::ClusterAnalysis(data) = op else {
                panic!("expected cluster_analysis");
            };
            let members = data
                .clusters
                .into_iter()
                .map(ClusterMembers::into_members)
                .collect::<Vec<_>>();
            assert_eq!(members, [vec![0, 1], vec![2]]);
        }

        #[test]
        fn test_lookup_options_are_flattened() {
            let op = Operation::parse(
                "generate_lookup_table",
                json!({
                    "records": [{"won": true, "segment": "smb"}],
                    "dimensions": ["segment"],
                    "maxCombinations": 50,
                }),
            )
            .unwrap();
            let Operation::GenerateLookupTable(data) = op else {
                panic!("expected generate_lookup_table");
            };
            assert_eq!(data.options.max_combinations, 50);
            assert_eq!(data.options.significance_threshold, 10);
        }
    }

    mod response {
        use super::*;

        #[test]
        fn test_failure_shape() {
            let err = ServiceError::Analysis(AnalysisError::InsufficientData {
                observations: 2,
                parameters: 3,
            });
            let response = Response::failure(json!("req-7"), &err);
            let value = serde_json::to_value(&response).unwrap();
            assert_eq!(value["success"], json!(false));
            assert_eq!(value["id"], json!("req-7"));
            assert_eq!(value["kind"], json!("numerical"));
            assert!(value.get("result").is_none());
        }

        #[test]
        fn test_success_shape() {
            let response = Response::success(json!(3), json!({"ok": 1}));
            let value = serde_json::to_value(&response).unwrap();
            assert_eq!(value, json!({"success": true, "id": 3, "result": {"ok": 1}}));
        }
    }
}
