use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    error::{FlowError, Result},
    session::Session,
    stage::{Stage, StageOutcome},
};

/// Outcome of one operator-triggered pipeline step
#[derive(Debug, Clone)]
pub struct StageRun {
    pub response: Option<String>,
    pub status: RunStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The stage still needs operator input; the gate did not move
    AwaitingInput,
    /// The stage completed; the next gate is open
    StageCompleted,
    /// The final stage completed
    PipelineCompleted,
}

/// A strictly linear, operator-gated sequence of stages.
///
/// A stage may run only once every stage before it has completed. Re-running
/// an earlier stage overwrites that stage's own result and leaves later
/// results untouched.
pub struct Pipeline {
    pub id: String,
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stages: Vec::new(),
        }
    }

    fn position(&self, stage_id: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.id() == stage_id)
    }

    pub fn stage_ids(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.id().to_string()).collect()
    }

    pub fn first_stage_id(&self) -> Option<String> {
        self.stages.first().map(|s| s.id().to_string())
    }

    /// Whether the gate for `stage_id` is open: every predecessor completed.
    pub fn is_enabled(&self, stage_id: &str, session: &Session) -> Result<bool> {
        let pos = self
            .position(stage_id)
            .ok_or_else(|| FlowError::StageNotFound(stage_id.to_string()))?;
        Ok(self.stages[..pos]
            .iter()
            .all(|s| session.is_completed(s.id())))
    }

    /// Run one stage for this session, enforcing the linear gate.
    pub async fn run_stage(&self, session: &mut Session, stage_id: &str) -> Result<StageRun> {
        let pos = self
            .position(stage_id)
            .ok_or_else(|| FlowError::StageNotFound(stage_id.to_string()))?;

        if let Some(blocking) = self.stages[..pos]
            .iter()
            .find(|s| !session.is_completed(s.id()))
        {
            warn!(
                session_id = %session.id,
                stage = stage_id,
                missing = blocking.id(),
                "gate closed, stage refused"
            );
            return Err(FlowError::GateClosed {
                stage: stage_id.to_string(),
                missing: blocking.id().to_string(),
            });
        }

        debug!(session_id = %session.id, stage = stage_id, "running stage");
        let result = self.stages[pos].run(session.context.clone()).await?;
        session.status_message = result.status_message.clone();

        match result.outcome {
            StageOutcome::AwaitInput => {
                session.current_stage_id = stage_id.to_string();
                Ok(StageRun {
                    response: result.response,
                    status: RunStatus::AwaitingInput,
                })
            }
            StageOutcome::Advance => {
                session.mark_completed(stage_id);
                match self.stages.get(pos + 1) {
                    Some(next) => {
                        // Only move the gate forward; a re-run of an earlier
                        // stage leaves the operator's position alone.
                        let cursor = self.position(&session.current_stage_id).unwrap_or(0);
                        if pos + 1 > cursor {
                            session.current_stage_id = next.id().to_string();
                        }
                        Ok(StageRun {
                            response: result.response,
                            status: RunStatus::StageCompleted,
                        })
                    }
                    None => Ok(StageRun {
                        response: result.response,
                        status: RunStatus::PipelineCompleted,
                    }),
                }
            }
            StageOutcome::Finish => {
                session.mark_completed(stage_id);
                Ok(StageRun {
                    response: result.response,
                    status: RunStatus::PipelineCompleted,
                })
            }
        }
    }
}

/// Builder for pipelines; stages run in insertion order
pub struct PipelineBuilder {
    pipeline: Pipeline,
}

impl PipelineBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            pipeline: Pipeline::new(id),
        }
    }

    pub fn add_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.pipeline.stages.push(stage);
        self
    }

    pub fn build(self) -> Pipeline {
        self.pipeline
    }
}
