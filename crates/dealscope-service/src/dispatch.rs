use std::panic::{self, AssertUnwindSafe};

use dealscope_engine::{cluster, formula, logistic, lookup, prediction, regression};
use serde::Serialize;
use serde_json::Value;

use crate::protocol::{
    ClusterMembers, Operation, Request, Response, ServiceError, default_names,
};

/// Parses one JSON line and answers it.
///
/// A line that is not valid JSON still gets a response, with a null `id`.
///
/// ```
/// use dealscope_service::{ResponseKind, handle_line};
///
/// let response = handle_line(r#"{"action": "nope", "id": "r1", "data": {}}"#);
/// assert!(!response.success);
/// assert_eq!(response.id, "r1");
/// assert_eq!(response.kind, Some(ResponseKind::Validation));
/// ```
#[must_use]
pub fn handle_line(line: &str) -> Response {
    let value = match serde_json::from_str::<Value>(line) {
        Ok(value) => value,
        Err(source) => return Response::failure(Value::Null, &ServiceError::Malformed { source }),
    };
    // Recover the id before the shape check so the caller can correlate the failure.
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    match serde_json::from_value::<Request>(value) {
        Ok(request) => handle(request),
        Err(source) => Response::failure(id, &ServiceError::Malformed { source }),
    }
}

/// Runs one request to completion and produces its single response.
#[must_use]
pub fn handle(request: Request) -> Response {
    let Request { action, id, data } = request;
    guarded(id, || {
        let operation = Operation::parse(&action, data)?;
        execute(operation)
    })
}

/// Runs `f`, turning a panic into an `internal` failure.
fn guarded<F>(id: Value, f: F) -> Response
where
    F: FnOnce() -> Result<Value, ServiceError>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_owned());
        Err(ServiceError::Panicked { message })
    });
    match outcome {
        Ok(result) => Response::success(id, result),
        Err(err) => {
            tracing::warn!(%id, kind = %err.kind(), error = %err, "request failed");
            Response::failure(id, &err)
        }
    }
}

/// Executes a decoded operation and encodes its result.
pub fn execute(operation: Operation) -> Result<Value, ServiceError> {
    let action = operation.action();
    tracing::debug!(action, "executing");
    match operation {
        Operation::FitRegression(data) => {
            let model = regression::fit(&data.x, &data.y, &data.variable_names, &data.options)?;
            encode(action, &model)
        }
        Operation::TrainLogistic(data) => {
            let model = logistic::train_raw(data.x, data.y, data.variable_names, &data.options)?;
            encode(action, &model)
        }
        Operation::Predict(data) => {
            let prediction = prediction::score(&data.model, &data.features, &data.thresholds)?;
            encode(action, &prediction)
        }
        Operation::BatchPredict(data) => {
            let batch =
                prediction::batch_score(&data.model, &data.features_list, &data.thresholds)?;
            encode(action, &batch)
        }
        Operation::ClusterKmeans(data) => {
            let dimensions = data
                .dimensions
                .unwrap_or_else(|| default_names(&data.points));
            let mut rng = dealscope_engine::seeded_rng(data.seed);
            let result = cluster::kmeans(
                &data.points,
                data.k,
                data.max_iterations,
                &dimensions,
                &mut rng,
            )?;
            encode(action, &result)
        }
        Operation::ClusterAnalysis(data) => {
            let dimensions = data
                .dimensions
                .unwrap_or_else(|| default_names(&data.original_data));
            let memberships = data
                .clusters
                .into_iter()
                .map(ClusterMembers::into_members)
                .collect::<Vec<_>>();
            let clusters = cluster::analyze(
                &data.original_data,
                &memberships,
                &dimensions,
                data.outcomes.as_deref(),
            )?;
            encode(action, &ClusterAnalysis { clusters })
        }
        Operation::GenerateLookupTable(data) => {
            let table = lookup::generate(&data.records, &data.dimensions, &data.options)?;
            encode(action, &table)
        }
        Operation::GenerateFormula(data) => {
            let formula =
                formula::generate_formula(&data.model.weights, &data.feature_names, &data.options)?;
            encode(action, &formula)
        }
    }
}

#[derive(Serialize)]
struct ClusterAnalysis {
    clusters: Vec<cluster::Cluster>,
}

fn encode<T>(action: &'static str, value: &T) -> Result<Value, ServiceError>
where
    T: Serialize,
{
    serde_json::to_value(value).map_err(|source| ServiceError::Encode { action, source })
}
