//! Validates analysis fixtures against the embedded analysis schema and
//! checks that the schema and the typed boundary parser agree.

use std::path::Path;

use neuroscout_interchange::{from_api_analysis, ANALYSIS_SCHEMA};

fn validator() -> jsonschema::Validator {
    let schema: serde_json::Value = serde_json::from_str(ANALYSIS_SCHEMA).unwrap();
    jsonschema::validator_for(&schema).unwrap_or_else(|e| panic!("Failed to compile schema: {}", e))
}

fn load(name: &str) -> serde_json::Value {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let src = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    serde_json::from_str(&src).unwrap()
}

#[test]
fn draft_fixture_is_schema_valid_and_parses() {
    let doc = load("analysis_draft.json");
    let errors: Vec<String> = validator().iter_errors(&doc).map(|e| e.to_string()).collect();
    assert!(errors.is_empty(), "schema errors: {:?}", errors);

    let analysis = from_api_analysis(&doc).unwrap();
    assert_eq!(analysis.runs, vec![101, 102, 103]);
    assert_eq!(analysis.predictors, vec![11, 12]);
    assert_eq!(analysis.transformations.len(), 2);
}

#[test]
fn bad_weights_fail_both_schema_and_parser() {
    let doc = load("analysis_bad_weights.json");
    assert!(!validator().is_valid(&doc));
    assert!(from_api_analysis(&doc).is_err());
}

#[test]
fn serialized_analysis_is_schema_valid() {
    let analysis = from_api_analysis(&load("analysis_draft.json")).unwrap();
    let doc = serde_json::to_value(&analysis).unwrap();
    let errors: Vec<String> = validator().iter_errors(&doc).map(|e| e.to_string()).collect();
    assert!(errors.is_empty(), "schema errors: {:?}", errors);
}
