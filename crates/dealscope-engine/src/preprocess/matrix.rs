use serde::Serialize;

use crate::error::{AnalysisError, Result};

/// Numeric feature rows paired with a target vector.
///
/// Invariants, enforced on construction:
///
/// - at least one row and at least one dimension
/// - every row has exactly one value per dimension
/// - `x`, `y` and `ids` have the same length
/// - every value is finite
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureMatrix {
    dimensions: Vec<String>,
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
    ids: Vec<String>,
}

impl FeatureMatrix {
    /// Builds a matrix whose row ids are the row positions.
    ///
    /// ```
    /// use dealscope_engine::preprocess::FeatureMatrix;
    ///
    /// let m = FeatureMatrix::new(
    ///     vec!["amount".into()],
    ///     vec![vec![1.0], vec![2.0]],
    ///     vec![0.0, 1.0],
    /// )
    /// .unwrap();
    /// assert_eq!(m.len(), 2);
    /// assert_eq!(m.ids(), ["0", "1"]);
    ///
    /// assert!(FeatureMatrix::new(vec!["amount".into()], vec![vec![1.0]], vec![]).is_err());
    /// ```
    pub fn new(dimensions: Vec<String>, x: Vec<Vec<f64>>, y: Vec<f64>) -> Result<Self> {
        let ids = (0..x.len()).map(|i| i.to_string()).collect();
        Self::with_ids(dimensions, x, y, ids)
    }

    pub fn with_ids(
        dimensions: Vec<String>,
        x: Vec<Vec<f64>>,
        y: Vec<f64>,
        ids: Vec<String>,
    ) -> Result<Self> {
        validate_shape(&dimensions, &x, &y)?;
        if ids.len() != x.len() {
            return Err(AnalysisError::validation(format!(
                "{} ids for {} rows",
                ids.len(),
                x.len()
            )));
        }
        Ok(Self {
            dimensions,
            x,
            y,
            ids,
        })
    }

    #[must_use]
    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    #[must_use]
    pub fn x(&self) -> &[Vec<f64>] {
        &self.x
    }

    #[must_use]
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Always `false`; a matrix has at least one row.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Values of one column in row order.
    #[must_use]
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.x.iter().map(|row| row[index]).collect()
    }

    /// Rows at the given positions, in the given order.
    ///
    /// Returns `None` for an empty selection.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Option<Self> {
        if indices.is_empty() {
            return None;
        }
        Some(Self {
            dimensions: self.dimensions.clone(),
            x: indices.iter().map(|&i| self.x[i].clone()).collect(),
            y: indices.iter().map(|&i| self.y[i]).collect(),
            ids: indices.iter().map(|&i| self.ids[i].clone()).collect(),
        })
    }
}

/// Checks the shape invariants shared by every `(X, y)` entry point.
pub(crate) fn validate_shape(dimensions: &[String], x: &[Vec<f64>], y: &[f64]) -> Result<()> {
    if x.is_empty() {
        return Err(AnalysisError::validation("no observations"));
    }
    if dimensions.is_empty() {
        return Err(AnalysisError::validation("empty feature set"));
    }
    if x.len() != y.len() {
        return Err(AnalysisError::validation(format!(
            "len(X) = {} but len(y) = {}",
            x.len(),
            y.len()
        )));
    }
    for (i, row) in x.iter().enumerate() {
        if row.len() != dimensions.len() {
            return Err(AnalysisError::validation(format!(
                "row {i} has {} values, expected {}",
                row.len(),
                dimensions.len()
            )));
        }
        if let Some(j) = row.iter().position(|v| !v.is_finite()) {
            return Err(AnalysisError::validation(format!(
                "row {i} has a non-finite value for '{}'",
                dimensions[j]
            )));
        }
    }
    if let Some(i) = y.iter().position(|v| !v.is_finite()) {
        return Err(AnalysisError::validation(format!(
            "target {i} is not finite"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let err = FeatureMatrix::new(dims(&["a", "b"]), vec![vec![1.0, 2.0], vec![1.0]], vec![0.0, 1.0])
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Validation { .. }));
    }

    #[test]
    fn test_rejects_empty_inputs() {
        assert!(FeatureMatrix::new(dims(&["a"]), vec![], vec![]).is_err());
        assert!(FeatureMatrix::new(vec![], vec![vec![]], vec![1.0]).is_err());
    }

    #[test]
    fn test_rejects_non_finite_values() {
        assert!(FeatureMatrix::new(dims(&["a"]), vec![vec![f64::NAN]], vec![1.0]).is_err());
        assert!(FeatureMatrix::new(dims(&["a"]), vec![vec![1.0]], vec![f64::INFINITY]).is_err());
    }

    #[test]
    fn test_select_and_column() {
        let m = FeatureMatrix::with_ids(
            dims(&["a", "b"]),
            vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]],
            vec![0.0, 1.0, 0.0],
            dims(&["x", "y", "z"]),
        )
        .unwrap();
        assert_eq!(m.column(1), vec![10.0, 20.0, 30.0]);

        let s = m.select(&[2, 0]).unwrap();
        assert_eq!(s.x(), &[vec![3.0, 30.0], vec![1.0, 10.0]]);
        assert_eq!(s.y(), &[0.0, 0.0]);
        assert_eq!(s.ids(), ["z", "x"]);
        assert!(m.select(&[]).is_none());
    }
}
