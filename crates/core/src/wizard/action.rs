//! Actions the wizard accepts and effects it asks its driver to perform.
//!
//! User actions are grouped by concern (overview, predictors,
//! transformations, contrasts, navigation); responses from the network
//! come back as [`RuntimeEvent`]s. The reducer never performs I/O itself.

use neuroscout_interchange::{
    ApiAnalysis, Contrast, Dataset, DatasetId, Predictor, PredictorConfig, PredictorId, Run, RunId,
    TaskId, Transformation,
};

use crate::list::Direction;

use super::tab::Tab;

/// Generation stamp attached to an asynchronous request.
///
/// Responses carrying a ticket other than the latest one issued for their
/// request kind are stale and get dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticket(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Overview(OverviewEdit),
    Predictors(PredictorEdit),
    Transformations(TransformationEdit),
    Contrasts(ContrastEdit),
    Navigate(Navigation),
    Submit { build: bool },
    CancelPolling,
    Runtime(RuntimeEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverviewEdit {
    Name(String),
    Description(String),
    Predictions(String),
    Private(bool),
    Dataset(DatasetId),
    Task(TaskId),
    Runs(Vec<RunId>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredictorEdit {
    /// Selection made in a view listing `filtered`.
    Select {
        filtered: Vec<PredictorId>,
        selected: Vec<PredictorId>,
    },
    SelectHrf {
        filtered: Vec<PredictorId>,
        selected: Vec<PredictorId>,
    },
    Configure {
        predictor_id: PredictorId,
        config: PredictorConfig,
    },
    /// Ask the backend to complete the model for the current selection.
    Fill,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransformationEdit {
    /// Open a new transformation in the editor.
    Begin(Transformation),
    /// Open the transformation at this index in the editor.
    Open(usize),
    /// Replace the editor contents.
    Update(Transformation),
    Commit,
    Discard,
    Remove(usize),
    Move(usize, Direction),
    Reorder { from: usize, to: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContrastEdit {
    Add(Contrast),
    Replace(usize, Contrast),
    Remove(usize),
    Move(usize, Direction),
    Reorder { from: usize, to: usize },
    GenerateDummy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Previous,
    Goto(Tab),
}

/// Which request a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Datasets,
    Analysis,
    Runs(Ticket),
    Predictors(Ticket),
    Save,
    Compile,
    Fill,
    Poll(Ticket),
}

impl Request {
    pub fn label(&self) -> &'static str {
        match self {
            Request::Datasets => "loading datasets",
            Request::Analysis => "loading analysis",
            Request::Runs(_) => "loading runs",
            Request::Predictors(_) => "loading predictors",
            Request::Save => "saving analysis",
            Request::Compile => "submitting analysis",
            Request::Fill => "filling model",
            Request::Poll(_) => "checking analysis status",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    DatasetsLoaded(Vec<Dataset>),
    AnalysisLoaded {
        analysis: ApiAnalysis,
        bookmark: Option<Tab>,
    },
    RunsLoaded {
        ticket: Ticket,
        runs: Vec<Run>,
    },
    PredictorsLoaded {
        ticket: Ticket,
        predictors: Vec<Predictor>,
    },
    Saved(ApiAnalysis),
    Compiled(ApiAnalysis),
    Filled(ApiAnalysis),
    StatusPolled {
        ticket: Ticket,
        analysis: ApiAnalysis,
    },
    Failed {
        request: Request,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Work the driver performs on the wizard's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchRuns {
        dataset_id: DatasetId,
        ticket: Ticket,
    },
    FetchPredictors {
        run_ids: Vec<RunId>,
        ticket: Ticket,
    },
    /// Create (no `hash_id`) or update the analysis.
    Save(ApiAnalysis),
    /// Compile the analysis the preceding save confirmed.
    Compile { build: bool },
    Fill {
        analysis_id: String,
        predictor_ids: Vec<PredictorId>,
    },
    StartPolling {
        analysis_id: String,
        ticket: Ticket,
    },
    StopPolling,
    StoreBookmark {
        analysis_id: String,
        tab: Tab,
    },
    Notify(Notice),
}
