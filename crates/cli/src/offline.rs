//! Commands that work on local files without contacting the API.

use std::path::Path;

use neuroscout_core::{build_model, AnalysisDraft};
use neuroscout_interchange::{
    from_api_analysis, parse_datasets, parse_predictors, parse_runs, ModelDocument,
    ANALYSIS_SCHEMA,
};
use serde_json::Value;

/// Outcome of checking an analysis document.
#[derive(Debug, Default, PartialEq)]
pub struct ValidationReport {
    /// JSON Schema violations and boundary parse errors. Non-empty means
    /// the document is invalid.
    pub errors: Vec<String>,
    /// Reasons a valid document could not be submitted yet.
    pub problems: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn read_json(path: &Path) -> Result<Value, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading file '{}': {}", path.display(), e))?;
    serde_json::from_str(&text)
        .map_err(|e| format!("error parsing JSON in '{}': {}", path.display(), e))
}

/// Check `doc` against the analysis schema, then the typed parser, then
/// the draft rules used before submission.
pub fn validate_analysis(doc: &Value) -> Result<ValidationReport, String> {
    let schema: Value = serde_json::from_str(ANALYSIS_SCHEMA).map_err(|e| {
        format!(
            "internal error: failed to parse embedded analysis schema: {}",
            e
        )
    })?;
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| format!("internal error: failed to compile schema: {}", e))?;

    let mut report = ValidationReport {
        errors: validator
            .iter_errors(doc)
            .map(|e| format!("{}", e))
            .collect(),
        problems: Vec::new(),
    };
    if !report.errors.is_empty() {
        return Ok(report);
    }

    match from_api_analysis(doc) {
        Ok(analysis) => {
            let (draft, _) = AnalysisDraft::from_api(analysis);
            report.problems = draft.submit_errors();
        }
        Err(e) => report.errors.push(e.to_string()),
    }
    Ok(report)
}

/// Build the model document for a local snapshot of the form
/// `{ "analysis": {...}, "datasets": [...], "runs": [...], "predictors": [...] }`.
pub fn model_from_snapshot(snapshot: &Value) -> Result<ModelDocument, String> {
    let analysis = from_api_analysis(section(snapshot, "analysis")?).map_err(|e| e.to_string())?;
    let datasets = match snapshot.get("datasets") {
        Some(v) => parse_datasets(v).map_err(|e| e.to_string())?,
        None => Vec::new(),
    };
    let runs = parse_runs(section(snapshot, "runs")?).map_err(|e| e.to_string())?;
    let predictors = parse_predictors(section(snapshot, "predictors")?).map_err(|e| e.to_string())?;

    let (mut draft, hrf_names) = AnalysisDraft::from_api(analysis);
    draft.resolve_hrf_names(&hrf_names, &predictors);
    Ok(build_model(&draft, &runs, &predictors, &datasets))
}

fn section<'a>(snapshot: &'a Value, key: &str) -> Result<&'a Value, String> {
    snapshot
        .get(key)
        .ok_or_else(|| format!("snapshot missing '{}'", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuroscout_interchange::StepLevel;
    use serde_json::json;

    fn snapshot() -> Value {
        json!({
            "analysis": {
                "name": "Faces",
                "dataset_id": 1,
                "runs": [1, 2],
                "predictors": [10, 11],
                "transformations": [
                    {"Name": "Convolve", "Input": ["face"]}
                ],
                "contrasts": [
                    {"Name": "face", "ConditionList": ["face"], "Weights": [1], "Type": "t"}
                ]
            },
            "datasets": [
                {"id": 1, "name": "Budapest", "tasks": [{"id": 7, "name": "movie"}]}
            ],
            "runs": [
                {"id": 1, "number": 1, "subject": "01", "task": 7},
                {"id": 2, "number": 2, "subject": "01", "task": 7},
                {"id": 3, "number": 1, "subject": "02", "task": 7}
            ],
            "predictors": [
                {"id": 10, "name": "face"},
                {"id": 11, "name": "speech"}
            ]
        })
    }

    #[test]
    fn snapshot_builds_model() {
        let model = model_from_snapshot(&snapshot()).unwrap();
        assert_eq!(model.input.task, vec!["movie".to_string()]);
        assert_eq!(model.input.run, vec![1, 2]);
        let run_step = model.step(StepLevel::Run).unwrap();
        assert_eq!(
            run_step.model.as_ref().unwrap().x,
            vec!["face".to_string(), "speech".to_string()]
        );
        assert_eq!(run_step.transformations.len(), 1);
        assert_eq!(run_step.transformations[0].input, vec!["face".to_string()]);
    }

    #[test]
    fn snapshot_needs_runs() {
        let mut snap = snapshot();
        snap.as_object_mut().unwrap().remove("runs");
        let err = model_from_snapshot(&snap).unwrap_err();
        assert!(err.contains("runs"));
    }

    #[test]
    fn complete_analysis_has_no_problems() {
        let report = validate_analysis(&snapshot()["analysis"]).unwrap();
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.problems.is_empty(), "{:?}", report.problems);
    }

    #[test]
    fn empty_draft_is_valid_but_not_ready() {
        let report = validate_analysis(&json!({"name": "Draft"})).unwrap();
        assert!(report.is_valid());
        assert!(report.problems.contains(&"Select a dataset".to_string()));
    }

    #[test]
    fn schema_violation_is_an_error() {
        let report = validate_analysis(&json!({"name": 5})).unwrap();
        assert!(!report.is_valid());
    }
}
