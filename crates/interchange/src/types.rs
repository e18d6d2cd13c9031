//! Typed structs representing the Neuroscout API JSON documents.
//!
//! Leaf documents (datasets, runs, predictors, transformations, contrasts,
//! model steps) derive serde directly. The top-level analysis document is
//! assembled by [`crate::from_api_analysis`] so that malformed fields are
//! reported with their name instead of a bare serde position.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type DatasetId = u64;
pub type TaskId = u64;
pub type RunId = u64;
pub type PredictorId = u64;

// ── Datasets, runs, predictors ──────────────────────────────────────

/// A task within a dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// A dataset descriptor as returned by `GET /api/datasets`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Dataset {
    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }
}

fn default_true() -> bool {
    true
}

/// A run descriptor as returned by `GET /api/runs`.
///
/// `session` and `subject` are strings because BIDS labels them that way
/// (e.g. `"01"`); `number` is absent for single-run tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Run {
    pub id: RunId,
    #[serde(default)]
    pub number: Option<u32>,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub task: TaskId,
}

/// A predictor descriptor as returned by `GET /api/predictors`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Predictor {
    pub id: PredictorId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Predictor {
    /// Confounds are the nuisance regressors extracted by fMRIPrep.
    pub fn is_confound(&self) -> bool {
        self.source
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("fmriprep"))
    }
}

// ── Analysis status ─────────────────────────────────────────────────

/// Lifecycle status of an analysis as tracked by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    #[default]
    Draft,
    Submitting,
    Pending,
    Passed,
    Failed,
}

impl AnalysisStatus {
    pub const ALL: [AnalysisStatus; 5] = [
        AnalysisStatus::Draft,
        AnalysisStatus::Submitting,
        AnalysisStatus::Pending,
        AnalysisStatus::Passed,
        AnalysisStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Draft => "DRAFT",
            AnalysisStatus::Submitting => "SUBMITTING",
            AnalysisStatus::Pending => "PENDING",
            AnalysisStatus::Passed => "PASSED",
            AnalysisStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }

    /// Whether the backend is still working on this analysis, i.e. a
    /// status poll should keep going.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            AnalysisStatus::Draft | AnalysisStatus::Submitting | AnalysisStatus::Pending
        )
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Predictor configuration ─────────────────────────────────────────

/// Hemodynamic response function used to convolve a predictor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Convolution {
    #[default]
    Gamma,
    Glover,
    #[serde(rename = "SPM")]
    Spm,
}

/// Per-predictor convolution settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PredictorConfig {
    #[serde(default)]
    pub convolution: Convolution,
    #[serde(default = "default_true")]
    pub temporal_derivative: bool,
    #[serde(default)]
    pub orthogonalize: bool,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        PredictorConfig {
            convolution: Convolution::Gamma,
            temporal_derivative: true,
            orthogonalize: false,
        }
    }
}

/// The `config` block of an analysis document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AnalysisConfig {
    #[serde(rename = "predictorConfigs", default)]
    pub predictor_configs: BTreeMap<PredictorId, PredictorConfig>,
}

// ── Transformations & contrasts ─────────────────────────────────────

/// A named transformation applied to one or more input variables.
///
/// Transform-specific parameters (e.g. `Threshold`, `Demean`) are kept in
/// `params` and round-trip untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Transformation {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Input", default)]
    pub input: Vec<String>,
    #[serde(rename = "Output", default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<String>>,
    /// The with-respect-to set used by `Orthogonalize`.
    #[serde(rename = "Other", default, skip_serializing_if = "Option::is_none")]
    pub other: Option<Vec<String>>,
    #[serde(flatten)]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl Transformation {
    pub fn new(name: &str, input: Vec<String>) -> Self {
        Transformation {
            name: name.to_string(),
            input,
            ..Default::default()
        }
    }

    /// Names this transformation makes available to later steps: its
    /// explicit outputs, or its inputs when it transforms in place.
    pub fn produced_names(&self) -> &[String] {
        match &self.output {
            Some(out) if !out.is_empty() => out,
            _ => &self.input,
        }
    }
}

/// Statistical test type of a contrast.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ContrastType {
    #[default]
    #[serde(rename = "t")]
    T,
    #[serde(rename = "F")]
    F,
    #[serde(rename = "FEMA")]
    Fema,
}

/// A named linear combination of conditions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Contrast {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "ConditionList", default)]
    pub condition_list: Vec<String>,
    #[serde(rename = "Weights", default)]
    pub weights: Vec<f64>,
    #[serde(rename = "Type", default)]
    pub contrast_type: ContrastType,
}

impl Contrast {
    pub fn new(name: &str, conditions: Vec<String>, weights: Vec<f64>) -> Self {
        Contrast {
            name: name.to_string(),
            condition_list: conditions,
            weights,
            contrast_type: ContrastType::T,
        }
    }

    /// A single-condition identity contrast for `predictor`.
    pub fn identity(predictor: &str) -> Self {
        Contrast::new(predictor, vec![predictor.to_string()], vec![1.0])
    }
}

// ── Model document ──────────────────────────────────────────────────

/// Run/session/subject/task filters of a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ModelInput {
    #[serde(rename = "Run", default, skip_serializing_if = "Vec::is_empty")]
    pub run: Vec<u32>,
    #[serde(rename = "Session", default, skip_serializing_if = "Vec::is_empty")]
    pub session: Vec<String>,
    #[serde(rename = "Subject", default, skip_serializing_if = "Vec::is_empty")]
    pub subject: Vec<String>,
    #[serde(rename = "Task", default, skip_serializing_if = "Vec::is_empty")]
    pub task: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepLevel {
    Run,
    Subject,
    Dataset,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepModel {
    #[serde(rename = "X")]
    pub x: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DummyContrasts {
    #[serde(rename = "Type")]
    pub contrast_type: ContrastType,
}

/// One level of the model hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelStep {
    #[serde(rename = "Level")]
    pub level: StepLevel,
    #[serde(rename = "Transformations", default, skip_serializing_if = "Vec::is_empty")]
    pub transformations: Vec<Transformation>,
    #[serde(rename = "Contrasts", default, skip_serializing_if = "Vec::is_empty")]
    pub contrasts: Vec<Contrast>,
    #[serde(rename = "Model", default, skip_serializing_if = "Option::is_none")]
    pub model: Option<StepModel>,
    #[serde(rename = "DummyContrasts", default, skip_serializing_if = "Option::is_none")]
    pub dummy_contrasts: Option<DummyContrasts>,
}

/// The BIDS-like statistical model derived from an analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDocument {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "Input", default)]
    pub input: ModelInput,
    #[serde(rename = "Steps", default)]
    pub steps: Vec<ModelStep>,
}

impl ModelDocument {
    pub fn step(&self, level: StepLevel) -> Option<&ModelStep> {
        self.steps.iter().find(|s| s.level == level)
    }
}

// ── Analysis ────────────────────────────────────────────────────────

/// The analysis document exchanged with `/api/analyses`.
///
/// Produced by [`crate::from_api_analysis`]; serialized directly for
/// `POST`/`PUT` bodies.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct ApiAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_id: Option<String>,
    pub name: String,
    pub description: String,
    pub predictions: String,
    pub private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<DatasetId>,
    pub status: AnalysisStatus,
    pub runs: Vec<RunId>,
    pub predictors: Vec<PredictorId>,
    pub transformations: Vec<Transformation>,
    pub contrasts: Vec<Contrast>,
    pub config: AnalysisConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

// ── Reports & bibliography ──────────────────────────────────────────

/// Design-matrix report artifacts. Plot specs are opaque to this crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Report {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

/// Citation lists for an analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Bibliography {
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(default)]
    pub extraction: Vec<String>,
    #[serde(default)]
    pub csl_json: Vec<serde_json::Value>,
}
