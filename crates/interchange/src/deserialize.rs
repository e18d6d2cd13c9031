//! Deserialization from Neuroscout API JSON into typed structs.
//!
//! The main entry point is [`from_api_analysis`], which takes a
//! `&serde_json::Value` and produces an [`ApiAnalysis`]. List endpoints are
//! parsed by [`parse_datasets`], [`parse_runs`] and [`parse_predictors`].

use crate::types::*;
use serde::de::DeserializeOwned;
use std::fmt;

/// Errors during API document deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterchangeError {
    /// The document is missing a required field.
    MissingField { field: String },
    /// A field is present but has the wrong shape.
    InvalidField { field: String, message: String },
    /// The document structure is invalid.
    InvalidDocument(String),
}

impl fmt::Display for InterchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterchangeError::MissingField { field } => {
                write!(f, "document missing required field: '{}'", field)
            }
            InterchangeError::InvalidField { field, message } => {
                write!(f, "invalid field '{}': {}", field, message)
            }
            InterchangeError::InvalidDocument(msg) => {
                write!(f, "invalid document: {}", msg)
            }
        }
    }
}

impl std::error::Error for InterchangeError {}

/// Deserialize an analysis document into an [`ApiAnalysis`].
///
/// `name` is the only required field. `runs` and `predictors` may be given
/// either as bare ids or as objects carrying an `id`; both shapes occur in
/// backend responses. Unknown top-level fields are ignored.
pub fn from_api_analysis(doc: &serde_json::Value) -> Result<ApiAnalysis, InterchangeError> {
    let obj = doc
        .as_object()
        .ok_or_else(|| InterchangeError::InvalidDocument("expected a JSON object".to_string()))?;

    let name = doc
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| InterchangeError::MissingField {
            field: "name".to_string(),
        })?
        .to_string();

    let status = match obj.get("status") {
        None | Some(serde_json::Value::Null) => AnalysisStatus::Draft,
        Some(v) => {
            let s = v.as_str().ok_or_else(|| invalid("status", "expected a string"))?;
            AnalysisStatus::parse(s)
                .ok_or_else(|| invalid("status", &format!("unknown status '{}'", s)))?
        }
    };

    let dataset_id = match obj.get("dataset_id") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(
            v.as_u64()
                .ok_or_else(|| invalid("dataset_id", "expected a non-negative integer"))?,
        ),
    };

    let transformations = parse_array_field::<Transformation>(doc, "transformations")?;
    let contrasts = parse_array_field::<Contrast>(doc, "contrasts")?;

    let config = match obj.get("config") {
        None | Some(serde_json::Value::Null) => AnalysisConfig::default(),
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| invalid("config", &e.to_string()))?,
    };

    let model = match obj.get("model") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(
            serde_json::from_value::<ModelDocument>(v.clone())
                .map_err(|e| invalid("model", &e.to_string()))?,
        ),
    };

    Ok(ApiAnalysis {
        hash_id: optional_str(doc, "hash_id"),
        name,
        description: optional_str(doc, "description").unwrap_or_default(),
        predictions: optional_str(doc, "predictions").unwrap_or_default(),
        private: doc.get("private").and_then(|v| v.as_bool()).unwrap_or(false),
        dataset_id,
        status,
        runs: parse_id_list(doc, "runs")?,
        predictors: parse_id_list(doc, "predictors")?,
        transformations,
        contrasts,
        config,
        model,
        modified_at: optional_str(doc, "modified_at"),
        traceback: optional_str(doc, "traceback").or_else(|| optional_str(doc, "compile_traceback")),
    })
}

/// Parse the body of `GET /api/datasets`.
pub fn parse_datasets(doc: &serde_json::Value) -> Result<Vec<Dataset>, InterchangeError> {
    parse_list(doc, "datasets")
}

/// Parse the body of `GET /api/runs`.
pub fn parse_runs(doc: &serde_json::Value) -> Result<Vec<Run>, InterchangeError> {
    parse_list(doc, "runs")
}

/// Parse the body of `GET /api/predictors`.
pub fn parse_predictors(doc: &serde_json::Value) -> Result<Vec<Predictor>, InterchangeError> {
    parse_list(doc, "predictors")
}

/// Parse the body of `GET /api/analyses` (a list of analysis documents).
pub fn parse_analyses(doc: &serde_json::Value) -> Result<Vec<ApiAnalysis>, InterchangeError> {
    let arr = doc
        .as_array()
        .ok_or_else(|| InterchangeError::InvalidDocument("expected a list of analyses".to_string()))?;
    arr.iter().map(from_api_analysis).collect()
}

pub fn parse_report(doc: &serde_json::Value) -> Result<Report, InterchangeError> {
    serde_json::from_value(doc.clone()).map_err(|e| invalid("report", &e.to_string()))
}

pub fn parse_bibliography(doc: &serde_json::Value) -> Result<Bibliography, InterchangeError> {
    serde_json::from_value(doc.clone()).map_err(|e| invalid("bibliography", &e.to_string()))
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn invalid(field: &str, message: &str) -> InterchangeError {
    InterchangeError::InvalidField {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn optional_str(obj: &serde_json::Value, field: &str) -> Option<String> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn parse_list<T: DeserializeOwned>(
    doc: &serde_json::Value,
    what: &str,
) -> Result<Vec<T>, InterchangeError> {
    let arr = doc
        .as_array()
        .ok_or_else(|| InterchangeError::InvalidDocument(format!("expected a list of {}", what)))?;
    arr.iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item.clone())
                .map_err(|e| invalid(&format!("{}[{}]", what, i), &e.to_string()))
        })
        .collect()
}

fn parse_array_field<T: DeserializeOwned>(
    doc: &serde_json::Value,
    field: &str,
) -> Result<Vec<T>, InterchangeError> {
    match doc.get(field) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(arr)) => arr
            .iter()
            .enumerate()
            .map(|(i, item)| {
                serde_json::from_value(item.clone())
                    .map_err(|e| invalid(&format!("{}[{}]", field, i), &e.to_string()))
            })
            .collect(),
        Some(_) => Err(invalid(field, "expected an array")),
    }
}

fn parse_id_list(doc: &serde_json::Value, field: &str) -> Result<Vec<u64>, InterchangeError> {
    let arr = match doc.get(field) {
        None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
        Some(serde_json::Value::Array(arr)) => arr,
        Some(_) => return Err(invalid(field, "expected an array")),
    };

    arr.iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_u64()
                .or_else(|| item.get("id").and_then(|id| id.as_u64()))
                .ok_or_else(|| invalid(&format!("{}[{}]", field, i), "expected an id"))
        })
        .collect()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "hash_id": "aBc12",
            "name": "Faces",
            "description": "face vs speech",
            "private": true,
            "dataset_id": 5,
            "status": "FAILED",
            "runs": [1, 2, {"id": 3}],
            "predictors": [{"id": 10, "name": "face"}, 11],
            "transformations": [
                {"Name": "Scale", "Input": ["face"], "Demean": true}
            ],
            "contrasts": [
                {"Name": "C1", "ConditionList": ["face", "speech"], "Weights": [1, -1], "Type": "t"}
            ],
            "config": {"predictorConfigs": {"10": {"convolution": "Glover", "temporalDerivative": false, "orthogonalize": false}}},
            "compile_traceback": "boom",
            "modified_at": "2024-03-01T10:00:00"
        })
    }

    #[test]
    fn parses_full_document() {
        let a = from_api_analysis(&sample()).unwrap();
        assert_eq!(a.hash_id.as_deref(), Some("aBc12"));
        assert_eq!(a.status, AnalysisStatus::Failed);
        assert_eq!(a.runs, vec![1, 2, 3]);
        assert_eq!(a.predictors, vec![10, 11]);
        assert_eq!(a.transformations[0].name, "Scale");
        assert_eq!(a.transformations[0].params.get("Demean"), Some(&json!(true)));
        assert_eq!(a.contrasts[0].weights, vec![1.0, -1.0]);
        assert_eq!(
            a.config.predictor_configs.get(&10).map(|c| c.convolution),
            Some(Convolution::Glover)
        );
        assert_eq!(a.traceback.as_deref(), Some("boom"));
    }

    #[test]
    fn minimal_document_gets_defaults() {
        let a = from_api_analysis(&json!({"name": "x"})).unwrap();
        assert_eq!(a.status, AnalysisStatus::Draft);
        assert!(a.runs.is_empty());
        assert!(a.config.predictor_configs.is_empty());
        assert!(a.model.is_none());
    }

    #[test]
    fn missing_name_is_rejected() {
        let err = from_api_analysis(&json!({"status": "DRAFT"})).unwrap_err();
        assert_eq!(
            err,
            InterchangeError::MissingField {
                field: "name".to_string()
            }
        );
    }

    #[test]
    fn non_numeric_weight_is_rejected() {
        let doc = json!({
            "name": "x",
            "contrasts": [{"Name": "C", "ConditionList": ["a"], "Weights": ["one"]}]
        });
        let err = from_api_analysis(&doc).unwrap_err();
        assert!(matches!(err, InterchangeError::InvalidField { ref field, .. } if field == "contrasts[0]"));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = from_api_analysis(&json!({"name": "x", "status": "DONE"})).unwrap_err();
        assert!(err.to_string().contains("unknown status"));
    }

    #[test]
    fn bad_run_entry_is_rejected() {
        let err = from_api_analysis(&json!({"name": "x", "runs": ["r1"]})).unwrap_err();
        assert!(matches!(err, InterchangeError::InvalidField { ref field, .. } if field == "runs[0]"));
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(matches!(
            from_api_analysis(&json!([1, 2])),
            Err(InterchangeError::InvalidDocument(_))
        ));
    }

    #[test]
    fn parses_runs_list() {
        let runs = parse_runs(&json!([
            {"id": 1, "number": 1, "session": null, "subject": "01", "task": 7},
            {"id": 2, "subject": "02", "task": 7}
        ]))
        .unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].number, None);
    }

    #[test]
    fn runs_list_reports_index_of_bad_entry() {
        let err = parse_runs(&json!([{"id": 1, "task": 1}, {"id": "x"}])).unwrap_err();
        assert!(matches!(err, InterchangeError::InvalidField { ref field, .. } if field == "runs[1]"));
    }

    #[test]
    fn confound_detection_is_case_insensitive() {
        let p: Predictor =
            serde_json::from_value(json!({"id": 1, "name": "rot_x", "source": "fMRIPrep"})).unwrap();
        assert!(p.is_confound());
        let q: Predictor = serde_json::from_value(json!({"id": 2, "name": "face"})).unwrap();
        assert!(!q.is_confound());
    }

    #[test]
    fn serialized_analysis_parses_back() {
        let a = from_api_analysis(&sample()).unwrap();
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["config"]["predictorConfigs"]["10"]["convolution"], "Glover");
        let b = from_api_analysis(&v).unwrap();
        assert_eq!(a, b);
    }
}
