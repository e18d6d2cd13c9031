//! neuroscout-interchange: typed Neuroscout API documents and deserialization.
//!
//! Provides typed structs for the documents exchanged with the Neuroscout
//! backend (datasets, runs, predictors, analyses, models, reports) and
//! boundary parsers that turn a `serde_json::Value` into those types,
//! rejecting malformed documents with an [`InterchangeError`] instead of
//! letting half-parsed values flow into the wizard.

pub mod deserialize;
pub mod types;

pub use deserialize::{
    from_api_analysis, parse_analyses, parse_bibliography, parse_datasets, parse_predictors,
    parse_report, parse_runs, InterchangeError,
};
pub use types::*;

/// JSON Schema for analysis documents (draft 2020-12).
pub static ANALYSIS_SCHEMA: &str = include_str!("../schema/analysis-schema.json");
