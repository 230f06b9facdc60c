use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{AnalysisError, Result},
    record::Value,
};

/// Categorical label codes, per dimension.
///
/// Codes are assigned in first-seen order starting at 1. Code
/// [`UNKNOWN_CODE`](Self::UNKNOWN_CODE) is reserved for values that were never
/// seen when the encoding was built, so scoring a record with a new category
/// degrades gracefully instead of failing.
///
/// ```
/// use dealscope_engine::{preprocess::EncodingInfo, record::Value};
///
/// let mut encoding = EncodingInfo::default();
/// assert_eq!(encoding.encode_or_insert("segment", &Value::from("smb")), 1);
/// assert_eq!(encoding.encode_or_insert("segment", &Value::from("ent")), 2);
/// assert_eq!(encoding.encode_or_insert("segment", &Value::from("smb")), 1);
/// assert_eq!(encoding.encode("segment", &Value::from("mid")), EncodingInfo::UNKNOWN_CODE);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingInfo {
    codes: BTreeMap<String, BTreeMap<String, u32>>,
}

impl EncodingInfo {
    pub const UNKNOWN_CODE: u32 = 0;

    /// Marks a dimension as categorical even before any value is seen.
    pub fn register(&mut self, dimension: &str) {
        self.codes.entry(dimension.to_owned()).or_default();
    }

    #[must_use]
    pub fn is_categorical(&self, dimension: &str) -> bool {
        self.codes.contains_key(dimension)
    }

    #[must_use]
    pub fn codes(&self, dimension: &str) -> Option<&BTreeMap<String, u32>> {
        self.codes.get(dimension)
    }

    /// Code of a value, or the unknown code for unseen values.
    #[must_use]
    pub fn encode(&self, dimension: &str, value: &Value) -> u32 {
        self.codes
            .get(dimension)
            .and_then(|codes| codes.get(&value.key()))
            .copied()
            .unwrap_or(Self::UNKNOWN_CODE)
    }

    /// Code of a value, assigning the next code on first sight.
    pub fn encode_or_insert(&mut self, dimension: &str, value: &Value) -> u32 {
        let codes = self.codes.entry(dimension.to_owned()).or_default();
        let next = u32::try_from(codes.len() + 1).unwrap_or(u32::MAX);
        *codes.entry(value.key()).or_insert(next)
    }

    /// Encodes one record's values in dimension order for scoring.
    ///
    /// Categorical dimensions use the stored codes. Other dimensions must be
    /// numeric; missing values become `0`.
    pub fn encode_values(
        &self,
        dimensions: &[String],
        values: &BTreeMap<String, Option<Value>>,
    ) -> Result<Vec<f64>> {
        dimensions
            .iter()
            .map(|dimension| {
                let value = values.get(dimension).and_then(Option::as_ref);
                if self.is_categorical(dimension) {
                    Ok(value.map_or(0.0, |v| f64::from(self.encode(dimension, v))))
                } else {
                    match value {
                        None => Ok(0.0),
                        Some(v) => v.as_f64().filter(|n| n.is_finite()).ok_or_else(|| {
                            AnalysisError::validation(format!(
                                "dimension '{dimension}' expects a number, got '{v}'"
                            ))
                        }),
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loosely_equal_values_share_codes() {
        let mut encoding = EncodingInfo::default();
        let a = encoding.encode_or_insert("tier", &Value::Number(3.0));
        let b = encoding.encode_or_insert("tier", &Value::Text("3".into()));
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_values() {
        let mut encoding = EncodingInfo::default();
        encoding.encode_or_insert("segment", &Value::from("smb"));
        encoding.encode_or_insert("segment", &Value::from("ent"));

        let dims = vec!["amount".to_owned(), "segment".to_owned()];
        let mut values = BTreeMap::new();
        values.insert("amount".to_owned(), Some(Value::Text("12.5".into())));
        values.insert("segment".to_owned(), Some(Value::from("ent")));
        assert_eq!(encoding.encode_values(&dims, &values).unwrap(), vec![12.5, 2.0]);

        values.insert("segment".to_owned(), Some(Value::from("gov")));
        values.remove("amount");
        assert_eq!(encoding.encode_values(&dims, &values).unwrap(), vec![0.0, 0.0]);

        values.insert("amount".to_owned(), Some(Value::from("lots")));
        assert!(encoding.encode_values(&dims, &values).is_err());
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut encoding = EncodingInfo::default();
        encoding.encode_or_insert("segment", &Value::from("smb"));
        encoding.register("region");
        let json = serde_json::to_value(&encoding).unwrap();
        assert_eq!(json["segment"]["smb"], 1);
        assert!(json["region"].as_object().unwrap().is_empty());
        let back: EncodingInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back, encoding);
    }
}
