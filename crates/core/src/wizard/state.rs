//! Wizard session state.

use neuroscout_interchange::{Dataset, ModelDocument, Predictor, Run, Transformation};

use crate::draft::{AnalysisDraft, EditableStatuses};
use crate::model::build_model;
use crate::selection::names_for;

use super::action::Ticket;
use super::tab::Tab;

/// The transformation currently open in the editor. `index` is set when an
/// existing list entry is being edited.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTransformation {
    pub index: Option<usize>,
    pub xform: Transformation,
}

/// Latest ticket issued per request kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tickets {
    counter: u64,
    pub runs: Ticket,
    pub predictors: Ticket,
    pub poll: Ticket,
}

impl Tickets {
    fn issue(&mut self) -> Ticket {
        self.counter += 1;
        Ticket(self.counter)
    }

    pub fn issue_runs(&mut self) -> Ticket {
        self.runs = self.issue();
        self.runs
    }

    pub fn issue_predictors(&mut self) -> Ticket {
        self.predictors = self.issue();
        self.predictors
    }

    pub fn issue_poll(&mut self) -> Ticket {
        self.poll = self.issue();
        self.poll
    }
}

/// Everything a wizard session owns. Mutated only by
/// [`reduce`](super::reduce).
#[derive(Debug, Clone, PartialEq)]
pub struct WizardState {
    pub draft: AnalysisDraft,
    pub tab: Tab,
    pub editable: EditableStatuses,
    pub datasets: Vec<Dataset>,
    pub available_runs: Vec<Run>,
    pub available_predictors: Vec<Predictor>,
    pub runs_load: bool,
    pub predictors_load: bool,
    pub active_transformation: Option<ActiveTransformation>,
    /// Model shown on the review tab, rebuilt on every entry.
    pub model: Option<ModelDocument>,
    /// Validation messages from the last rejected user action.
    pub errors: Vec<String>,
    pub unsaved: bool,
    /// The session resumed an editable analysis past the contrasts tab.
    pub resumed_past_contrasts: bool,
    pub tickets: Tickets,
    /// `Convolve` inputs of a loaded analysis, resolved to ids once
    /// predictors arrive.
    pub(crate) pending_hrf_names: Option<Vec<String>>,
}

impl Default for WizardState {
    fn default() -> Self {
        WizardState::new(EditableStatuses::default())
    }
}

impl WizardState {
    pub fn new(editable: EditableStatuses) -> Self {
        WizardState {
            draft: AnalysisDraft::default(),
            tab: Tab::Overview,
            editable,
            datasets: Vec::new(),
            available_runs: Vec::new(),
            available_predictors: Vec::new(),
            runs_load: false,
            predictors_load: false,
            active_transformation: None,
            model: None,
            errors: Vec::new(),
            unsaved: false,
            resumed_past_contrasts: false,
            tickets: Tickets::default(),
            pending_hrf_names: None,
        }
    }

    pub fn is_editable(&self) -> bool {
        self.draft.is_editable(&self.editable)
    }

    pub fn build_model(&self) -> ModelDocument {
        build_model(
            &self.draft,
            &self.available_runs,
            &self.available_predictors,
            &self.datasets,
        )
    }

    pub fn selected_predictors(&self) -> Vec<&Predictor> {
        self.draft
            .predictor_ids
            .iter()
            .filter_map(|id| self.available_predictors.iter().find(|p| p.id == *id))
            .collect()
    }

    pub fn selected_names(&self) -> Vec<String> {
        names_for(&self.draft.predictor_ids, &self.available_predictors)
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.datasets.iter().find(|d| Some(d.id) == self.draft.dataset_id)
    }
}
