//! Analysis status polling with explicit cancellation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use neuroscout_interchange::ApiAnalysis;

use crate::api::NeuroscoutApi;
use crate::error::ClientError;

/// Default delay between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shared cancellation handle for status polling.
///
/// Each polling loop runs under a generation number from [`begin`]; the
/// loop stops at its next check once the generation moves on, whether
/// through [`cancel`] or a newer [`begin`]. Clones share the counter, so a
/// signal handler holding a clone can stop a loop it never saw.
///
/// [`begin`]: PollHandle::begin
/// [`cancel`]: PollHandle::cancel
#[derive(Debug, Clone, Default)]
pub struct PollHandle {
    generation: Arc<AtomicU64>,
}

impl PollHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The analysis left the in-progress statuses.
    Finished(ApiAnalysis),
    Cancelled,
}

/// Fetch the analysis every `interval` until it is no longer in progress.
///
/// `on_update` sees every fetched document, including the final one. A
/// response that arrives after cancellation is dropped unseen.
pub async fn poll_status(
    api: &dyn NeuroscoutApi,
    analysis_id: &str,
    handle: &PollHandle,
    generation: u64,
    interval: Duration,
    mut on_update: impl FnMut(&ApiAnalysis) + Send,
) -> Result<PollOutcome, ClientError> {
    loop {
        if !handle.is_current(generation) {
            return Ok(PollOutcome::Cancelled);
        }
        let analysis = api.get_analysis(analysis_id).await?;
        if !handle.is_current(generation) {
            tracing::debug!(analysis_id, "discarding status after cancellation");
            return Ok(PollOutcome::Cancelled);
        }

        tracing::info!(analysis_id, status = %analysis.status, "polled status");
        on_update(&analysis);
        if !analysis.status.is_in_progress() {
            return Ok(PollOutcome::Finished(analysis));
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_supersedes_earlier_generation() {
        let handle = PollHandle::new();
        let first = handle.begin();
        assert!(handle.is_current(first));
        let second = handle.begin();
        assert!(!handle.is_current(first));
        assert!(handle.is_current(second));
    }

    #[test]
    fn cancel_reaches_clones() {
        let handle = PollHandle::new();
        let generation = handle.begin();
        let remote = handle.clone();
        remote.cancel();
        assert!(!handle.is_current(generation));
    }
}
