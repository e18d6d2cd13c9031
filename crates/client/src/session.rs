//! Drives a [`WizardState`] against a live API.
//!
//! The session owns the state, feeds user actions to [`reduce`], performs
//! the requested effects in order and feeds their results back as runtime
//! events until nothing is left to do.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use neuroscout_core::draft::EditableStatuses;
use neuroscout_core::wizard::{
    reduce, Action, Effect, Notice, NoticeLevel, Request, RuntimeEvent, Ticket, WizardError,
    WizardState,
};
use neuroscout_interchange::ApiAnalysis;

use crate::api::NeuroscoutApi;
use crate::error::ClientError;
use crate::poll::{poll_status, PollHandle, PollOutcome, DEFAULT_POLL_INTERVAL};
use crate::store::KeyValueStore;

pub struct Session {
    api: Arc<dyn NeuroscoutApi>,
    store: Arc<dyn KeyValueStore>,
    state: WizardState,
    queue: VecDeque<Effect>,
    notices: Vec<Notice>,
    poll: PollHandle,
    poll_interval: Duration,
    /// Polling requested by the wizard but not yet run by [`Session::watch`].
    pending_poll: Option<(String, Ticket)>,
}

impl Session {
    pub fn new(api: Arc<dyn NeuroscoutApi>, store: Arc<dyn KeyValueStore>) -> Self {
        Session {
            api,
            store,
            state: WizardState::default(),
            queue: VecDeque::new(),
            notices: Vec::new(),
            poll: PollHandle::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            pending_poll: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_editable(mut self, editable: EditableStatuses) -> Self {
        self.state.editable = editable;
        self
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// Notices emitted since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// A handle that stops [`Session::watch`] from anywhere.
    pub fn poll_handle(&self) -> PollHandle {
        self.poll.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.pending_poll.is_some()
    }

    /// Load the dataset catalogue.
    pub async fn load_datasets(&mut self, active_only: bool) -> Result<(), ClientError> {
        match self.api.datasets(active_only).await {
            Ok(datasets) => {
                tracing::info!(count = datasets.len(), "loaded datasets");
                self.feed(RuntimeEvent::DatasetsLoaded(datasets)).await;
                Ok(())
            }
            Err(e) => {
                self.fail(Request::Datasets, &e).await;
                Err(e)
            }
        }
    }

    /// Resume a saved analysis at its bookmarked tab.
    pub async fn open(&mut self, analysis_id: &str) -> Result<(), ClientError> {
        let analysis = match self.api.get_analysis(analysis_id).await {
            Ok(analysis) => analysis,
            Err(e) => {
                self.fail(Request::Analysis, &e).await;
                return Err(e);
            }
        };
        let bookmark = self.store.bookmark(analysis_id).unwrap_or_else(|e| {
            tracing::warn!(analysis_id, error = %e, "cannot read bookmark");
            None
        });
        tracing::info!(analysis_id, status = %analysis.status, ?bookmark, "opened analysis");
        self.feed(RuntimeEvent::AnalysisLoaded { analysis, bookmark })
            .await;
        Ok(())
    }

    /// Apply a user action and run everything it sets off.
    pub async fn dispatch(&mut self, action: Action) -> Result<(), WizardError> {
        let effects = reduce(&mut self.state, action)?;
        self.queue.extend(effects);
        self.run_effects().await;
        Ok(())
    }

    /// Poll the analysis the wizard asked to watch until compilation
    /// finishes or the poll handle is cancelled. Returns `None` when no
    /// polling was pending.
    pub async fn watch(&mut self) -> Result<Option<PollOutcome>, ClientError> {
        let Some((analysis_id, ticket)) = self.pending_poll.take() else {
            return Ok(None);
        };
        let generation = self.poll.begin();
        let handle = self.poll.clone();
        let api = Arc::clone(&self.api);

        let state = &mut self.state;
        let queue = &mut self.queue;
        let outcome = poll_status(
            api.as_ref(),
            &analysis_id,
            &handle,
            generation,
            self.poll_interval,
            |analysis| {
                let event = RuntimeEvent::StatusPolled {
                    ticket,
                    analysis: analysis.clone(),
                };
                if let Ok(effects) = reduce(state, Action::Runtime(event)) {
                    queue.extend(effects);
                }
            },
        )
        .await;

        match outcome {
            Ok(outcome) => {
                if outcome == PollOutcome::Cancelled {
                    self.dispatch(Action::CancelPolling).await.ok();
                }
                self.run_effects().await;
                Ok(Some(outcome))
            }
            Err(e) => {
                self.fail(Request::Poll(ticket), &e).await;
                Err(e)
            }
        }
    }

    async fn fail(&mut self, request: Request, error: &ClientError) {
        self.feed(RuntimeEvent::Failed {
            request,
            message: error.to_string(),
        })
        .await;
    }

    async fn feed(&mut self, event: RuntimeEvent) {
        if self.is_stale(&event) {
            tracing::debug!(?event, "discarding stale response");
            return;
        }
        match reduce(&mut self.state, Action::Runtime(event)) {
            Ok(effects) => self.queue.extend(effects),
            Err(e) => tracing::warn!(error = %e, "runtime event rejected"),
        }
        self.run_effects().await;
    }

    fn is_stale(&self, event: &RuntimeEvent) -> bool {
        let tickets = &self.state.tickets;
        match event {
            RuntimeEvent::RunsLoaded { ticket, .. } => *ticket != tickets.runs,
            RuntimeEvent::PredictorsLoaded { ticket, .. } => *ticket != tickets.predictors,
            RuntimeEvent::StatusPolled { ticket, .. } => *ticket != tickets.poll,
            _ => false,
        }
    }

    async fn run_effects(&mut self) {
        while let Some(effect) = self.queue.pop_front() {
            if let Some(event) = self.perform(effect).await {
                if self.is_stale(&event) {
                    tracing::debug!(?event, "discarding stale response");
                    continue;
                }
                match reduce(&mut self.state, Action::Runtime(event)) {
                    Ok(effects) => self.queue.extend(effects),
                    Err(e) => tracing::warn!(error = %e, "runtime event rejected"),
                }
            }
        }
    }

    /// Run one effect. Returns the event reporting its result, if any.
    async fn perform(&mut self, effect: Effect) -> Option<RuntimeEvent> {
        match effect {
            Effect::FetchRuns { dataset_id, ticket } => {
                tracing::info!(dataset_id, "fetching runs");
                Some(match self.api.runs(dataset_id).await {
                    Ok(runs) => RuntimeEvent::RunsLoaded { ticket, runs },
                    Err(e) => failure(Request::Runs(ticket), e),
                })
            }
            Effect::FetchPredictors { run_ids, ticket } => {
                tracing::info!(runs = run_ids.len(), "fetching predictors");
                Some(match self.api.predictors(&run_ids).await {
                    Ok(predictors) => RuntimeEvent::PredictorsLoaded { ticket, predictors },
                    Err(e) => failure(Request::Predictors(ticket), e),
                })
            }
            Effect::Save(analysis) => {
                tracing::info!(analysis_id = ?analysis.hash_id, "saving analysis");
                Some(match self.api.save_analysis(&analysis).await {
                    Ok(saved) => RuntimeEvent::Saved(saved),
                    Err(e) => {
                        // Nothing unsaved gets compiled.
                        self.queue
                            .retain(|queued| !matches!(queued, Effect::Compile { .. }));
                        failure(Request::Save, e)
                    }
                })
            }
            Effect::Compile { build } => {
                let Some(analysis_id) = self.state.draft.analysis_id.clone() else {
                    return Some(RuntimeEvent::Failed {
                        request: Request::Compile,
                        message: "analysis has not been saved".to_string(),
                    });
                };
                tracing::info!(%analysis_id, build, "submitting analysis");
                Some(match self.api.compile(&analysis_id, build).await {
                    Ok(analysis) => RuntimeEvent::Compiled(analysis),
                    Err(e) => failure(Request::Compile, e),
                })
            }
            Effect::Fill {
                analysis_id,
                predictor_ids,
            } => {
                tracing::info!(%analysis_id, "filling model");
                Some(match self.api.fill(&analysis_id, &predictor_ids).await {
                    Ok(analysis) => RuntimeEvent::Filled(analysis),
                    Err(e) => failure(Request::Fill, e),
                })
            }
            Effect::StartPolling {
                analysis_id,
                ticket,
            } => {
                self.pending_poll = Some((analysis_id, ticket));
                None
            }
            Effect::StopPolling => {
                self.poll.cancel();
                self.pending_poll = None;
                None
            }
            Effect::StoreBookmark { analysis_id, tab } => {
                if let Err(e) = self.store.set_bookmark(&analysis_id, tab) {
                    tracing::warn!(%analysis_id, error = %e, "cannot store bookmark");
                }
                None
            }
            Effect::Notify(notice) => {
                match notice.level {
                    NoticeLevel::Info => tracing::info!("{}", notice.message),
                    NoticeLevel::Warning => tracing::warn!("{}", notice.message),
                    NoticeLevel::Error => tracing::error!("{}", notice.message),
                }
                self.notices.push(notice);
                None
            }
        }
    }
}

fn failure(request: Request, error: ClientError) -> RuntimeEvent {
    tracing::warn!(request = request.label(), error = %error, "request failed");
    RuntimeEvent::Failed {
        request,
        message: error.to_string(),
    }
}

/// The analysis as it would be saved right now, with its model.
pub fn snapshot(state: &WizardState) -> ApiAnalysis {
    state
        .draft
        .to_api(&state.available_predictors, Some(state.build_model()))
}
