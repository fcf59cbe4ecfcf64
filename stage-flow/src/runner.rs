//! PipelineRunner – convenience wrapper that loads a session, executes exactly
//! **one** operator-triggered stage, and persists the updated session back to
//! storage.
//!
//! Interactive services usually want to run one stage per HTTP request, send
//! the reply back to the client, and have the session automatically saved for
//! the next roundtrip. `PipelineRunner` makes that a one-liner; callers that
//! need custom persistence can still use `Pipeline::run_stage` directly.

use std::sync::Arc;

use crate::{
    error::{FlowError, Result},
    pipeline::{Pipeline, StageRun},
    session::SessionStorage,
};

/// High-level helper that orchestrates the common _load → run → save_ pattern.
#[derive(Clone)]
pub struct PipelineRunner {
    pipeline: Arc<Pipeline>,
    storage: Arc<dyn SessionStorage>,
}

impl PipelineRunner {
    pub fn new(pipeline: Arc<Pipeline>, storage: Arc<dyn SessionStorage>) -> Self {
        Self { pipeline, storage }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Execute **exactly one** stage for the given `session_id` and persist
    /// the updated session. A closed gate or a failed stage propagates as an
    /// error and leaves the stored gate position untouched.
    pub async fn run(&self, session_id: &str, stage_id: &str) -> Result<StageRun> {
        let mut session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))?;

        let result = self.pipeline.run_stage(&mut session, stage_id).await?;

        self.storage.save(session).await?;

        Ok(result)
    }
}
