use std::sync::Arc;

use async_trait::async_trait;
use stage_flow::{Context, FlowError, Result, Stage, StageResult};
use tracing::info;

use super::stage_ids;
use crate::{
    llm::LlmClient,
    models::{CaseFile, session_keys},
    parse::{self, ParseStrategy},
    prompts,
};

/// Extracts the foundational claim, the cited references, the figures, and
/// the supporting technical text from the office action.
pub struct ConflictExtractionStage {
    llm: Arc<LlmClient>,
    strategy: ParseStrategy,
}

impl ConflictExtractionStage {
    pub fn new(llm: Arc<LlmClient>, strategy: ParseStrategy) -> Self {
        Self { llm, strategy }
    }
}

#[async_trait]
impl Stage for ConflictExtractionStage {
    fn id(&self) -> &str {
        stage_ids::CONFLICT_EXTRACTION
    }

    async fn run(&self, context: Context) -> Result<StageResult> {
        info!("running stage: {}", self.id());

        let mut case: CaseFile = context.require(session_keys::CASE_FILE).await?;

        let Some(action) = case.action_document.clone() else {
            return Ok(StageResult::await_input(
                "Upload the office action document before running this stage.",
                "Waiting for the office action document",
            ));
        };

        let persona = case.domain_expertise.clone();
        let pair =
            prompts::conflict_extraction(&action.full_text(), persona.as_deref(), self.strategy);
        let reply = self
            .llm
            .submit(&pair.system, &pair.user)
            .await
            .map_err(|e| FlowError::StageExecutionFailed(e.to_string()))?;

        case.last_raw_reply = Some(reply.clone());

        let findings = match parse::parse_conflict_reply(&reply, self.strategy) {
            Ok(findings) => findings,
            Err(e) => {
                // Keep the raw reply in the case file for diagnostics.
                context.set(session_keys::CASE_FILE, case).await;
                return Err(FlowError::StageExecutionFailed(e.to_string()));
            }
        };

        let response = format!(
            "Foundational claim: {}\nDocuments referenced: {}",
            findings.foundational_claim,
            findings.documents_referenced.join(", ")
        );
        case.conflict_findings = Some(findings);
        context.set(session_keys::CASE_FILE, case).await;

        Ok(StageResult::advance_with_response(
            response,
            "Conflict findings extracted",
        ))
    }
}
