use async_trait::async_trait;
use neuroscout_interchange::{
    ApiAnalysis, Bibliography, Dataset, DatasetId, Predictor, PredictorId, Report, Run, RunId,
};

use crate::error::ClientError;

/// The Neuroscout backend as the wizard sees it.
///
/// Every response is validated at the boundary, so implementations hand back
/// typed documents or a [`ClientError`], never raw JSON.
///
/// Implementations must be `Send + Sync` so a [`Session`](crate::Session)
/// can share them with a background poller.
#[async_trait]
pub trait NeuroscoutApi: Send + Sync {
    // ── Catalogue ────────────────────────────────────────────────────────────

    /// `GET /api/datasets?active_only=<bool>`
    async fn datasets(&self, active_only: bool) -> Result<Vec<Dataset>, ClientError>;

    /// `GET /api/runs?dataset_id=<id>`
    async fn runs(&self, dataset_id: DatasetId) -> Result<Vec<Run>, ClientError>;

    /// `GET /api/predictors?run_id=<csv>`
    async fn predictors(&self, run_ids: &[RunId]) -> Result<Vec<Predictor>, ClientError>;

    // ── Analyses ─────────────────────────────────────────────────────────────

    /// `GET /api/analyses`
    async fn analyses(&self) -> Result<Vec<ApiAnalysis>, ClientError>;

    /// `GET /api/analyses/:id`
    async fn get_analysis(&self, id: &str) -> Result<ApiAnalysis, ClientError>;

    /// `POST /api/analyses`. The response carries the assigned `hash_id`.
    async fn create_analysis(&self, analysis: &ApiAnalysis) -> Result<ApiAnalysis, ClientError>;

    /// `PUT /api/analyses/:id`
    async fn update_analysis(
        &self,
        id: &str,
        analysis: &ApiAnalysis,
    ) -> Result<ApiAnalysis, ClientError>;

    /// `POST /api/analyses/:id/compile?build=<bool>`
    async fn compile(&self, id: &str, build: bool) -> Result<ApiAnalysis, ClientError>;

    /// `POST /api/analyses/:id/fill`
    async fn fill(&self, id: &str, predictor_ids: &[PredictorId])
        -> Result<ApiAnalysis, ClientError>;

    /// `POST /api/analyses/:id/clone`
    async fn clone_analysis(&self, id: &str) -> Result<ApiAnalysis, ClientError>;

    /// `DELETE /api/analyses/:id`
    async fn delete_analysis(&self, id: &str) -> Result<(), ClientError>;

    // ── Results ──────────────────────────────────────────────────────────────

    /// `GET /api/analyses/:id/report`
    async fn report(&self, id: &str) -> Result<Report, ClientError>;

    /// `POST /api/analyses/:id/report`
    async fn generate_report(&self, id: &str) -> Result<Report, ClientError>;

    /// `GET /api/analyses/:id/bibliography`
    async fn bibliography(&self, id: &str) -> Result<Bibliography, ClientError>;

    /// Create or update depending on whether `analysis` already has an id.
    async fn save_analysis(&self, analysis: &ApiAnalysis) -> Result<ApiAnalysis, ClientError> {
        match analysis.hash_id.as_deref() {
            Some(id) => self.update_analysis(id, analysis).await,
            None => self.create_analysis(analysis).await,
        }
    }
}
