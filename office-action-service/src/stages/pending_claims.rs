use std::sync::Arc;

use async_trait::async_trait;
use stage_flow::{Context, FlowError, Result, Stage, StageResult};
use tracing::info;

use super::stage_ids;
use crate::{
    llm::LlmClient,
    models::{CaseFile, session_keys},
    parse, prompts,
};

/// Optional final stage: the same rebuttal report over the currently pending
/// claims instead of the application as filed.
pub struct PendingClaimsStage {
    llm: Arc<LlmClient>,
}

impl PendingClaimsStage {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for PendingClaimsStage {
    fn id(&self) -> &str {
        stage_ids::PENDING_CLAIMS_ANALYSIS
    }

    async fn run(&self, context: Context) -> Result<StageResult> {
        info!("running stage: {}", self.id());

        let mut case: CaseFile = context.require(session_keys::CASE_FILE).await?;

        let Some(findings) = case.conflict_findings.clone() else {
            return Ok(StageResult::await_input(
                "Run conflict extraction before analyzing the pending claims.",
                "Waiting for conflict findings",
            ));
        };
        let Some(figure_analysis) = case.figure_analysis.clone() else {
            return Ok(StageResult::await_input(
                "Run figure analysis before analyzing the pending claims.",
                "Waiting for figure analysis",
            ));
        };
        let Some(pending) = case.pending_claims.clone() else {
            return Ok(StageResult::await_input(
                "Upload the pending claims document to run this optional stage.",
                "Waiting for the pending claims document",
            ));
        };

        let pair = prompts::pending_claims_analysis(
            &findings.foundational_claim,
            &figure_analysis.display_text(),
            &pending.full_text(),
            case.domain_expertise.as_deref(),
        );
        let reply = self
            .llm
            .submit(&pair.system, &pair.user)
            .await
            .map_err(|e| FlowError::StageExecutionFailed(e.to_string()))?;

        case.last_raw_reply = Some(reply.clone());

        let analysis = parse::parse_application_analysis(&parse::label_statutes(&reply));
        case.pending_claims_analysis = Some(analysis);
        context.set(session_keys::CASE_FILE, case).await;

        Ok(StageResult::finish(
            Some("Pending claims analysis completed.".to_string()),
            "Pending claims analysis completed",
        ))
    }
}
