//! The analysis draft: the single mutable document a wizard session edits.

use std::collections::BTreeSet;

use neuroscout_interchange::{
    AnalysisConfig, AnalysisStatus, ApiAnalysis, Contrast, DatasetId, ModelDocument, Predictor,
    PredictorId, RunId, TaskId, Transformation,
};

use crate::contrast::validate_contrast;
use crate::selection::{names_for, prune_dependents};
use crate::transform::{strip_convolve, synthesize_convolve, validate_xform, with_convolve};

/// Statuses under which the draft may be edited.
///
/// Carried explicitly by the wizard state so every consumer sees the same
/// set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditableStatuses(BTreeSet<AnalysisStatus>);

impl EditableStatuses {
    pub fn new(statuses: impl IntoIterator<Item = AnalysisStatus>) -> Self {
        EditableStatuses(statuses.into_iter().collect())
    }

    pub fn contains(&self, status: AnalysisStatus) -> bool {
        self.0.contains(&status)
    }
}

impl Default for EditableStatuses {
    fn default() -> Self {
        EditableStatuses::new([AnalysisStatus::Draft, AnalysisStatus::Failed])
    }
}

/// In-memory analysis being configured.
///
/// `transformations` never holds a `Convolve` entry; that step is derived
/// from `hrf_predictor_ids` whenever the draft is serialized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisDraft {
    pub analysis_id: Option<String>,
    pub name: String,
    pub description: String,
    pub predictions: String,
    pub private: bool,
    pub dataset_id: Option<DatasetId>,
    pub task_id: Option<TaskId>,
    pub run_ids: Vec<RunId>,
    pub predictor_ids: Vec<PredictorId>,
    pub hrf_predictor_ids: Vec<PredictorId>,
    pub transformations: Vec<Transformation>,
    pub contrasts: Vec<Contrast>,
    pub config: AnalysisConfig,
    pub status: AnalysisStatus,
    pub traceback: Option<String>,
    pub modified_at: Option<String>,
}

impl AnalysisDraft {
    /// Hydrate a draft from a server document.
    ///
    /// Returns the draft and the input names of the document's `Convolve`
    /// step; those map back to HRF predictor ids once predictors are known.
    pub fn from_api(api: ApiAnalysis) -> (AnalysisDraft, Vec<String>) {
        let (transformations, convolve) = strip_convolve(&api.transformations);
        let hrf_names = convolve.map(|c| c.input).unwrap_or_default();

        let draft = AnalysisDraft {
            analysis_id: api.hash_id,
            name: api.name,
            description: api.description,
            predictions: api.predictions,
            private: api.private,
            dataset_id: api.dataset_id,
            task_id: None,
            run_ids: api.runs,
            predictor_ids: api.predictors,
            hrf_predictor_ids: Vec::new(),
            transformations,
            contrasts: api.contrasts,
            config: api.config,
            status: api.status,
            traceback: api.traceback,
            modified_at: api.modified_at,
        };
        (draft, hrf_names)
    }

    /// Serialize for `POST`/`PUT`. `predictors` resolves HRF ids to names.
    pub fn to_api(&self, predictors: &[Predictor], model: Option<ModelDocument>) -> ApiAnalysis {
        let convolve = synthesize_convolve(&names_for(&self.hrf_predictor_ids, predictors));
        ApiAnalysis {
            hash_id: self.analysis_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            predictions: self.predictions.clone(),
            private: self.private,
            dataset_id: self.dataset_id,
            status: self.status,
            runs: self.run_ids.clone(),
            predictors: self.predictor_ids.clone(),
            transformations: with_convolve(&self.transformations, convolve),
            contrasts: self.contrasts.clone(),
            config: self.config.clone(),
            model,
            modified_at: self.modified_at.clone(),
            traceback: None,
        }
    }

    /// Map the input names of a loaded `Convolve` step back to ids among
    /// the selected predictors.
    pub fn resolve_hrf_names(&mut self, names: &[String], available: &[Predictor]) {
        self.hrf_predictor_ids = self
            .predictor_ids
            .iter()
            .copied()
            .filter(|id| {
                available
                    .iter()
                    .any(|p| p.id == *id && names.contains(&p.name))
            })
            .collect();
    }

    pub fn is_editable(&self, editable: &EditableStatuses) -> bool {
        editable.contains(self.status)
    }

    /// Record the id the backend assigned. An id, once set, never changes;
    /// returns `false` when a different id was offered.
    pub fn assign_id(&mut self, id: &str) -> bool {
        match &self.analysis_id {
            Some(existing) => existing == id,
            None => {
                self.analysis_id = Some(id.to_string());
                true
            }
        }
    }

    /// Switch datasets. Everything chosen under the old dataset goes.
    pub fn set_dataset(&mut self, dataset_id: DatasetId) {
        if self.dataset_id == Some(dataset_id) {
            return;
        }
        self.dataset_id = Some(dataset_id);
        self.task_id = None;
        self.run_ids.clear();
        self.predictor_ids.clear();
        self.hrf_predictor_ids.clear();
        self.config = AnalysisConfig::default();
        let (transformations, contrasts) =
            prune_dependents(&self.transformations, &self.contrasts, &[]);
        self.transformations = transformations;
        self.contrasts = contrasts;
    }

    /// Problems that prevent submitting the draft for compilation.
    pub fn submit_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("Analysis name is required".to_string());
        }
        if self.dataset_id.is_none() {
            errors.push("Select a dataset".to_string());
        }
        if self.run_ids.is_empty() {
            errors.push("Select at least one run".to_string());
        }
        if self.predictor_ids.is_empty() {
            errors.push("Select at least one predictor".to_string());
        }
        if self.contrasts.is_empty() {
            errors.push("Add at least one contrast".to_string());
        }
        for (i, xform) in self.transformations.iter().enumerate() {
            for e in validate_xform(xform) {
                errors.push(format!("Transformation {}: {}", i + 1, e));
            }
        }
        for contrast in &self.contrasts {
            for e in validate_contrast(contrast) {
                errors.push(format!("Contrast '{}': {}", contrast.name, e));
            }
        }
        errors
    }
}
