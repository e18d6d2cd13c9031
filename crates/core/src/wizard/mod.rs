//! The analysis wizard: a tabbed state machine over an [`AnalysisDraft`].
//!
//! [`reduce`] is the only way state changes. Network access is requested
//! through [`Effect`]s and answered with [`RuntimeEvent`]s, so the machine
//! runs the same under a terminal, a test, or any other front end.
//!
//! [`AnalysisDraft`]: crate::draft::AnalysisDraft

mod action;
mod reduce;
mod state;
mod tab;


pub use action::{
    Action, ContrastEdit, Effect, Navigation, Notice, NoticeLevel, OverviewEdit, PredictorEdit,
    Request, RuntimeEvent, Ticket, TransformationEdit,
};
pub use reduce::reduce;
pub use state::{ActiveTransformation, Tickets, WizardState};
pub use tab::Tab;

use neuroscout_interchange::{AnalysisStatus, PredictorId};

/// Why a user action was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WizardError {
    #[error("analysis is {0} and can no longer be edited")]
    NotEditable(AnalysisStatus),
    #[error("Analysis name is required")]
    NameRequired,
    #[error("Add at least one contrast before continuing")]
    ContrastRequired,
    #[error("invalid transformation: {}", .0.join("; "))]
    InvalidTransformation(Vec<String>),
    #[error("invalid contrast: {}", .0.join("; "))]
    InvalidContrast(Vec<String>),
    #[error("the Convolve step is derived from the HRF selection")]
    ManagedTransformation,
    #[error("tab '{0}' is not available for this analysis")]
    TabUnavailable(Tab),
    #[error("no entry at position {0}")]
    NoSuchItem(usize),
    #[error("predictor {0} is not selected")]
    PredictorNotSelected(PredictorId),
    #[error("finish or discard the open transformation first")]
    EditInProgress,
    #[error("predictors for the selected runs are not loaded")]
    PredictorsLoading,
    #[error("analysis has not been saved yet")]
    NotSaved,
    #[error("analysis is not ready to submit: {}", .0.join("; "))]
    NotReady(Vec<String>),
}

impl WizardError {
    /// Messages suitable for listing next to the offending control.
    pub fn messages(&self) -> Vec<String> {
        match self {
            WizardError::InvalidTransformation(errors)
            | WizardError::InvalidContrast(errors)
            | WizardError::NotReady(errors) => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}
