use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{context::Context, error::Result};

/// Result of a stage execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Text to surface to the operator
    pub response: Option<String>,
    /// What the pipeline should do next
    pub outcome: StageOutcome,
    /// Short progress note stored on the session
    pub status_message: Option<String>,
}

impl StageResult {
    pub fn new(response: Option<String>, outcome: StageOutcome) -> Self {
        Self {
            response,
            outcome,
            status_message: None,
        }
    }

    pub fn new_with_status(
        response: Option<String>,
        outcome: StageOutcome,
        status_message: Option<String>,
    ) -> Self {
        Self {
            response,
            outcome,
            status_message,
        }
    }

    /// Stage completed; open the gate to the next stage.
    pub fn advance(status_message: impl Into<String>) -> Self {
        Self::new_with_status(None, StageOutcome::Advance, Some(status_message.into()))
    }

    pub fn advance_with_response(
        response: impl Into<String>,
        status_message: impl Into<String>,
    ) -> Self {
        Self::new_with_status(
            Some(response.into()),
            StageOutcome::Advance,
            Some(status_message.into()),
        )
    }

    /// Stage cannot proceed yet; keep the gate where it is and tell the
    /// operator what is missing.
    pub fn await_input(response: impl Into<String>, status_message: impl Into<String>) -> Self {
        Self::new_with_status(
            Some(response.into()),
            StageOutcome::AwaitInput,
            Some(status_message.into()),
        )
    }

    /// Final stage completed.
    pub fn finish(response: Option<String>, status_message: impl Into<String>) -> Self {
        Self::new_with_status(response, StageOutcome::Finish, Some(status_message.into()))
    }
}

/// Defines what should happen after a stage runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageOutcome {
    /// Stay on this stage until the operator supplies what is missing
    AwaitInput,
    /// Mark this stage complete and open the gate to the next one
    Advance,
    /// Mark this stage complete and end the pipeline
    Finish,
}

/// A single operator-triggered step in a pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable identifier, used for gating and operator triggers
    fn id(&self) -> &str;

    /// Execute the stage with the given context
    async fn run(&self, context: Context) -> Result<StageResult>;
}
