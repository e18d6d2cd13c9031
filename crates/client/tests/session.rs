//! Session driver against an in-memory API.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use neuroscout_client::{
    ClientError, KeyValueStore, MemoryStore, NeuroscoutApi, PollOutcome, Session,
};
use neuroscout_core::wizard::{
    Action, ContrastEdit, Navigation, NoticeLevel, OverviewEdit, PredictorEdit, Tab,
};
use neuroscout_interchange::{
    AnalysisStatus, ApiAnalysis, Bibliography, Contrast, Dataset, DatasetId, Predictor,
    PredictorId, Report, Run, RunId, Task, Transformation,
};

#[derive(Default)]
struct FakeApi {
    calls: Mutex<Vec<String>>,
    statuses: Mutex<VecDeque<AnalysisStatus>>,
    stored: Mutex<Option<ApiAnalysis>>,
    fail_saves: bool,
}

impl FakeApi {
    fn with_statuses(statuses: &[AnalysisStatus]) -> Self {
        FakeApi {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            ..Default::default()
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

fn server_error() -> ClientError {
    ClientError::Status {
        code: 500,
        url: "fake".into(),
    }
}

fn predictor(id: u64, name: &str) -> Predictor {
    Predictor {
        id,
        name: name.into(),
        description: None,
        source: None,
    }
}

#[async_trait]
impl NeuroscoutApi for FakeApi {
    async fn datasets(&self, _active_only: bool) -> Result<Vec<Dataset>, ClientError> {
        self.record("datasets");
        Ok(vec![Dataset {
            id: 1,
            name: "Budapest".into(),
            description: None,
            tasks: vec![Task {
                id: 7,
                name: "movie".into(),
                summary: None,
            }],
            active: true,
        }])
    }

    async fn runs(&self, dataset_id: DatasetId) -> Result<Vec<Run>, ClientError> {
        self.record(format!("runs {dataset_id}"));
        Ok((1..=3)
            .map(|id| Run {
                id,
                number: Some(id as u32),
                session: None,
                subject: Some("01".into()),
                task: 7,
            })
            .collect())
    }

    async fn predictors(&self, run_ids: &[RunId]) -> Result<Vec<Predictor>, ClientError> {
        self.record(format!("predictors {run_ids:?}"));
        Ok(vec![predictor(10, "face"), predictor(11, "speech")])
    }

    async fn analyses(&self) -> Result<Vec<ApiAnalysis>, ClientError> {
        Ok(Vec::new())
    }

    async fn get_analysis(&self, id: &str) -> Result<ApiAnalysis, ClientError> {
        self.record(format!("get {id}"));
        let mut doc = self
            .stored
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| ApiAnalysis {
                hash_id: Some(id.into()),
                name: "Faces".into(),
                ..Default::default()
            });
        if let Some(status) = self.statuses.lock().unwrap().pop_front() {
            doc.status = status;
        } else {
            doc.status = AnalysisStatus::Pending;
        }
        Ok(doc)
    }

    async fn create_analysis(&self, analysis: &ApiAnalysis) -> Result<ApiAnalysis, ClientError> {
        self.record("create");
        if self.fail_saves {
            return Err(server_error());
        }
        Ok(ApiAnalysis {
            hash_id: Some("new1".into()),
            modified_at: Some("2024-01-01T00:00:00".into()),
            ..analysis.clone()
        })
    }

    async fn update_analysis(
        &self,
        id: &str,
        analysis: &ApiAnalysis,
    ) -> Result<ApiAnalysis, ClientError> {
        self.record(format!("update {id}"));
        if self.fail_saves {
            return Err(server_error());
        }
        Ok(analysis.clone())
    }

    async fn compile(&self, id: &str, build: bool) -> Result<ApiAnalysis, ClientError> {
        self.record(format!("compile {id} {build}"));
        Ok(ApiAnalysis {
            hash_id: Some(id.into()),
            status: AnalysisStatus::Pending,
            ..Default::default()
        })
    }

    async fn fill(
        &self,
        id: &str,
        predictor_ids: &[PredictorId],
    ) -> Result<ApiAnalysis, ClientError> {
        self.record(format!("fill {id}"));
        Ok(ApiAnalysis {
            predictors: predictor_ids.to_vec(),
            contrasts: vec![Contrast::identity("face")],
            ..Default::default()
        })
    }

    async fn clone_analysis(&self, _id: &str) -> Result<ApiAnalysis, ClientError> {
        Err(server_error())
    }

    async fn delete_analysis(&self, _id: &str) -> Result<(), ClientError> {
        Err(server_error())
    }

    async fn report(&self, _id: &str) -> Result<Report, ClientError> {
        Err(server_error())
    }

    async fn generate_report(&self, _id: &str) -> Result<Report, ClientError> {
        Err(server_error())
    }

    async fn bibliography(&self, _id: &str) -> Result<Bibliography, ClientError> {
        Err(server_error())
    }
}

fn session_with(api: Arc<FakeApi>, store: Arc<MemoryStore>) -> Session {
    Session::new(api, store).with_poll_interval(Duration::from_millis(2))
}

/// Walk a fresh session to a draft that can be submitted.
async fn build_draft(session: &mut Session) {
    session.load_datasets(true).await.unwrap();
    session
        .dispatch(Action::Overview(OverviewEdit::Name("Faces".into())))
        .await
        .unwrap();
    session
        .dispatch(Action::Overview(OverviewEdit::Dataset(1)))
        .await
        .unwrap();
    session
        .dispatch(Action::Overview(OverviewEdit::Runs(vec![1, 2])))
        .await
        .unwrap();
    session
        .dispatch(Action::Predictors(PredictorEdit::Select {
            filtered: vec![10, 11],
            selected: vec![10],
        }))
        .await
        .unwrap();
    session
        .dispatch(Action::Contrasts(ContrastEdit::Add(Contrast::identity(
            "face",
        ))))
        .await
        .unwrap();
}

// ──────────────────────────────────────
// Editing
// ──────────────────────────────────────

#[tokio::test]
async fn fetches_follow_selection() {
    let api = Arc::new(FakeApi::default());
    let mut session = session_with(api.clone(), Arc::new(MemoryStore::new()));
    build_draft(&mut session).await;

    assert_eq!(api.count("runs"), 1);
    assert_eq!(api.calls().iter().filter(|c| *c == "predictors [1, 2]").count(), 1);
    let state = session.state();
    assert_eq!(state.available_predictors.len(), 2);
    assert!(!state.runs_load);
    assert!(!state.predictors_load);
    assert_eq!(state.draft.predictor_ids, vec![10]);
}

#[tokio::test]
async fn navigation_autosaves_and_bookmarks() {
    let api = Arc::new(FakeApi::default());
    let store = Arc::new(MemoryStore::new());
    let mut session = session_with(api.clone(), store.clone());
    build_draft(&mut session).await;

    session
        .dispatch(Action::Navigate(Navigation::Next))
        .await
        .unwrap();
    assert_eq!(api.count("create"), 1);
    assert_eq!(session.state().draft.analysis_id.as_deref(), Some("new1"));
    assert_eq!(store.bookmark("new1").unwrap(), Some(Tab::Predictors));

    session
        .dispatch(Action::Navigate(Navigation::Next))
        .await
        .unwrap();
    assert_eq!(api.count("update new1"), 0);
    assert_eq!(store.bookmark("new1").unwrap(), Some(Tab::Transformations));
}

#[tokio::test]
async fn fill_merges_server_model() {
    let api = Arc::new(FakeApi::default());
    let mut session = session_with(api.clone(), Arc::new(MemoryStore::new()));
    build_draft(&mut session).await;
    session
        .dispatch(Action::Navigate(Navigation::Next))
        .await
        .unwrap();

    session
        .dispatch(Action::Predictors(PredictorEdit::Fill))
        .await
        .unwrap();
    assert_eq!(api.count("fill new1"), 1);
    assert!(session.state().unsaved);
    let notices = session.take_notices();
    assert!(notices.iter().any(|n| n.level == NoticeLevel::Info));
}

// ──────────────────────────────────────
// Submission & polling
// ──────────────────────────────────────

#[tokio::test]
async fn submit_then_watch_until_passed() {
    let api = Arc::new(FakeApi::with_statuses(&[
        AnalysisStatus::Pending,
        AnalysisStatus::Passed,
    ]));
    let mut session = session_with(api.clone(), Arc::new(MemoryStore::new()));
    build_draft(&mut session).await;

    session
        .dispatch(Action::Submit { build: false })
        .await
        .unwrap();
    let calls = api.calls();
    let create = calls.iter().position(|c| c == "create").unwrap();
    let compile = calls
        .iter()
        .position(|c| c == "compile new1 false")
        .unwrap();
    assert!(create < compile);
    assert!(session.is_polling());

    let outcome = session.watch().await.unwrap();
    match outcome {
        Some(PollOutcome::Finished(doc)) => assert_eq!(doc.status, AnalysisStatus::Passed),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(session.state().draft.status, AnalysisStatus::Passed);
    assert_eq!(session.state().tab, Tab::Summary);
    assert!(!session.is_polling());
}

#[tokio::test]
async fn watch_stops_when_cancelled() {
    let api = Arc::new(FakeApi::default());
    let mut session = session_with(api.clone(), Arc::new(MemoryStore::new()));
    build_draft(&mut session).await;
    session
        .dispatch(Action::Submit { build: true })
        .await
        .unwrap();

    let handle = session.poll_handle();
    let poll_before = session.state().tickets.poll;
    let (outcome, _) = tokio::join!(session.watch(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
    });
    assert_eq!(outcome.unwrap(), Some(PollOutcome::Cancelled));
    assert_ne!(session.state().tickets.poll, poll_before);
    assert_eq!(session.state().draft.status, AnalysisStatus::Pending);
}

#[tokio::test]
async fn failed_save_never_compiles() {
    let api = Arc::new(FakeApi {
        fail_saves: true,
        ..Default::default()
    });
    let mut session = session_with(api.clone(), Arc::new(MemoryStore::new()));
    build_draft(&mut session).await;

    session
        .dispatch(Action::Submit { build: true })
        .await
        .unwrap();
    assert_eq!(api.count("compile"), 0);
    assert_eq!(session.state().draft.status, AnalysisStatus::Draft);
    assert!(session.state().unsaved);
    assert!(session
        .take_notices()
        .iter()
        .any(|n| n.level == NoticeLevel::Error));
}

// ──────────────────────────────────────
// Resuming
// ──────────────────────────────────────

#[tokio::test]
async fn open_resumes_at_bookmark() {
    let api = Arc::new(FakeApi::with_statuses(&[AnalysisStatus::Draft]));
    *api.stored.lock().unwrap() = Some(ApiAnalysis {
        hash_id: Some("abc".into()),
        name: "Faces".into(),
        dataset_id: Some(1),
        runs: vec![1, 2, 3],
        predictors: vec![10, 11],
        transformations: vec![Transformation::new("Convolve", vec!["speech".into()])],
        ..Default::default()
    });
    let store = Arc::new(MemoryStore::new());
    store.set_bookmark("abc", Tab::Hrf).unwrap();

    let mut session = session_with(api.clone(), store);
    session.open("abc").await.unwrap();

    let state = session.state();
    assert_eq!(state.tab, Tab::Hrf);
    assert_eq!(state.draft.hrf_predictor_ids, vec![11]);
    assert!(state.draft.transformations.is_empty());
    assert_eq!(api.count("runs 1"), 1);
    assert_eq!(api.count("predictors"), 1);
}
