//! HTTP implementation of [`NeuroscoutApi`].
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. Responses are decoded as JSON and passed
//! through the boundary parsers before they reach the caller.

use async_trait::async_trait;
use neuroscout_interchange::{
    from_api_analysis, parse_analyses, parse_bibliography, parse_datasets, parse_predictors,
    parse_report, parse_runs, ApiAnalysis, Bibliography, Dataset, DatasetId, Predictor,
    PredictorId, Report, Run, RunId,
};
use serde_json::{json, Value};

use crate::api::NeuroscoutApi;
use crate::error::ClientError;
use crate::store::{KeyValueStore, TOKEN_KEY};

pub const DEFAULT_BASE_URL: &str = "https://neuroscout.org";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// Client for the Neuroscout REST API.
///
/// - `base_url` without the `/api` suffix, e.g. `https://neuroscout.org`
/// - `token` sent as `Authorization: Bearer <token>`; without one, only
///   public endpoints succeed
#[derive(Debug, Clone)]
pub struct HttpApi {
    base_url: String,
    token: Option<String>,
}

impl HttpApi {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        HttpApi {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Build a client whose token is `override_token`, or else the one
    /// stored under `jwt`.
    pub fn from_store(
        base_url: &str,
        store: &dyn KeyValueStore,
        override_token: Option<String>,
    ) -> Result<Self, ClientError> {
        let token = match override_token {
            Some(token) => Some(token),
            None => store.get(TOKEN_KEY)?,
        };
        Ok(HttpApi::new(base_url, token))
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Absolute URL for an API path: `analyses/abc` → `{base}/api/analyses/abc`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Comma-separated id list as the `run_id` filter expects.
    pub fn id_list(ids: &[u64]) -> String {
        ids.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        query: Vec<(&'static str, String)>,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let url = self.endpoint(path);
        let token = self.token.clone();
        tracing::debug!(method = method.as_str(), %url, "request");

        let join_url = url.clone();
        let result = tokio::task::spawn_blocking(move || {
            let agent = ureq::Agent::new_with_defaults();
            let auth = token.map(|t| format!("Bearer {}", t));

            let response = match method {
                Method::Get | Method::Delete => {
                    let mut request = match method {
                        Method::Delete => agent.delete(&url),
                        _ => agent.get(&url),
                    };
                    for (key, value) in &query {
                        request = request.query(*key, value);
                    }
                    if let Some(ref auth) = auth {
                        request = request.header("Authorization", auth);
                    }
                    request.call()
                }
                Method::Post | Method::Put => {
                    let mut request = match method {
                        Method::Put => agent.put(&url),
                        _ => agent.post(&url),
                    };
                    for (key, value) in &query {
                        request = request.query(*key, value);
                    }
                    if let Some(ref auth) = auth {
                        request = request.header("Authorization", auth);
                    }
                    match &body {
                        Some(body) => request.send_json(body),
                        None => request.send_empty(),
                    }
                }
            };

            let response = response.map_err(|e| match e {
                ureq::Error::StatusCode(code) => ClientError::Status {
                    code,
                    url: url.clone(),
                },
                other => ClientError::Transport {
                    url: url.clone(),
                    message: other.to_string(),
                },
            })?;

            if method == Method::Delete {
                return Ok(Value::Null);
            }
            response
                .into_body()
                .read_json::<Value>()
                .map_err(|e| ClientError::Decode {
                    url,
                    message: e.to_string(),
                })
        })
        .await
        .map_err(|e| ClientError::Join(e.to_string()))?;

        if let Err(ref e) = result {
            tracing::warn!(method = method.as_str(), url = %join_url, error = %e, "request failed");
        }
        result
    }

    async fn get(&self, path: &str, query: Vec<(&'static str, String)>) -> Result<Value, ClientError> {
        self.call(Method::Get, path, query, None).await
    }

    async fn analysis_call(
        &self,
        method: Method,
        path: &str,
        query: Vec<(&'static str, String)>,
        body: Option<Value>,
    ) -> Result<ApiAnalysis, ClientError> {
        let doc = self.call(method, path, query, body).await?;
        Ok(from_api_analysis(&doc)?)
    }
}

fn to_body(analysis: &ApiAnalysis) -> Result<Value, ClientError> {
    serde_json::to_value(analysis).map_err(|e| ClientError::Decode {
        url: String::new(),
        message: format!("cannot encode analysis: {}", e),
    })
}

#[async_trait]
impl NeuroscoutApi for HttpApi {
    async fn datasets(&self, active_only: bool) -> Result<Vec<Dataset>, ClientError> {
        let doc = self
            .get("datasets", vec![("active_only", active_only.to_string())])
            .await?;
        Ok(parse_datasets(&doc)?)
    }

    async fn runs(&self, dataset_id: DatasetId) -> Result<Vec<Run>, ClientError> {
        let doc = self
            .get("runs", vec![("dataset_id", dataset_id.to_string())])
            .await?;
        Ok(parse_runs(&doc)?)
    }

    async fn predictors(&self, run_ids: &[RunId]) -> Result<Vec<Predictor>, ClientError> {
        let doc = self
            .get("predictors", vec![("run_id", HttpApi::id_list(run_ids))])
            .await?;
        Ok(parse_predictors(&doc)?)
    }

    async fn analyses(&self) -> Result<Vec<ApiAnalysis>, ClientError> {
        let doc = self.get("analyses", Vec::new()).await?;
        Ok(parse_analyses(&doc)?)
    }

    async fn get_analysis(&self, id: &str) -> Result<ApiAnalysis, ClientError> {
        self.analysis_call(Method::Get, &format!("analyses/{}", id), Vec::new(), None)
            .await
    }

    async fn create_analysis(&self, analysis: &ApiAnalysis) -> Result<ApiAnalysis, ClientError> {
        let body = to_body(analysis)?;
        self.analysis_call(Method::Post, "analyses", Vec::new(), Some(body))
            .await
    }

    async fn update_analysis(
        &self,
        id: &str,
        analysis: &ApiAnalysis,
    ) -> Result<ApiAnalysis, ClientError> {
        let body = to_body(analysis)?;
        self.analysis_call(Method::Put, &format!("analyses/{}", id), Vec::new(), Some(body))
            .await
    }

    async fn compile(&self, id: &str, build: bool) -> Result<ApiAnalysis, ClientError> {
        self.analysis_call(
            Method::Post,
            &format!("analyses/{}/compile", id),
            vec![("build", build.to_string())],
            None,
        )
        .await
    }

    async fn fill(
        &self,
        id: &str,
        predictor_ids: &[PredictorId],
    ) -> Result<ApiAnalysis, ClientError> {
        self.analysis_call(
            Method::Post,
            &format!("analyses/{}/fill", id),
            vec![("partial", "true".to_string())],
            Some(json!({ "predictors": predictor_ids })),
        )
        .await
    }

    async fn clone_analysis(&self, id: &str) -> Result<ApiAnalysis, ClientError> {
        self.analysis_call(Method::Post, &format!("analyses/{}/clone", id), Vec::new(), None)
            .await
    }

    async fn delete_analysis(&self, id: &str) -> Result<(), ClientError> {
        self.call(Method::Delete, &format!("analyses/{}", id), Vec::new(), None)
            .await
            .map(|_| ())
    }

    async fn report(&self, id: &str) -> Result<Report, ClientError> {
        let doc = self.get(&format!("analyses/{}/report", id), Vec::new()).await?;
        Ok(parse_report(&doc)?)
    }

    async fn generate_report(&self, id: &str) -> Result<Report, ClientError> {
        let doc = self
            .call(Method::Post, &format!("analyses/{}/report", id), Vec::new(), None)
            .await?;
        Ok(parse_report(&doc)?)
    }

    async fn bibliography(&self, id: &str) -> Result<Bibliography, ClientError> {
        let doc = self
            .get(&format!("analyses/{}/bibliography", id), Vec::new())
            .await?;
        Ok(parse_bibliography(&doc)?)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn endpoint_joins_api_prefix() {
        let api = HttpApi::new("https://neuroscout.org/", None);
        assert_eq!(
            api.endpoint("analyses/abc/compile"),
            "https://neuroscout.org/api/analyses/abc/compile"
        );
        assert_eq!(api.endpoint("/runs"), "https://neuroscout.org/api/runs");
    }

    #[test]
    fn run_ids_are_comma_separated() {
        assert_eq!(HttpApi::id_list(&[3, 1, 2]), "3,1,2");
        assert_eq!(HttpApi::id_list(&[]), "");
    }

    #[test]
    fn token_from_store() {
        let store = MemoryStore::new();
        store.set(TOKEN_KEY, "stored").unwrap();
        let api = HttpApi::from_store(DEFAULT_BASE_URL, &store, None).unwrap();
        assert_eq!(api.token.as_deref(), Some("stored"));
    }

    #[test]
    fn override_token_wins() {
        let store = MemoryStore::new();
        store.set(TOKEN_KEY, "stored").unwrap();
        let api = HttpApi::from_store(DEFAULT_BASE_URL, &store, Some("env".into())).unwrap();
        assert_eq!(api.token.as_deref(), Some("env"));
    }

    #[test]
    fn no_token_is_anonymous() {
        let api = HttpApi::from_store(DEFAULT_BASE_URL, &MemoryStore::new(), None).unwrap();
        assert!(!api.is_authenticated());
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let api = HttpApi::new("http://127.0.0.1:9", None);
        let err = api.datasets(true).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
    }
}
