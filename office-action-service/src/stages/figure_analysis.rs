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

/// Analyzes the figures and cited paragraphs of the referenced documents in
/// relation to the foundational claim.
pub struct FigureAnalysisStage {
    llm: Arc<LlmClient>,
}

impl FigureAnalysisStage {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for FigureAnalysisStage {
    fn id(&self) -> &str {
        stage_ids::FIGURE_ANALYSIS
    }

    async fn run(&self, context: Context) -> Result<StageResult> {
        info!("running stage: {}", self.id());

        let mut case: CaseFile = context.require(session_keys::CASE_FILE).await?;

        let Some(findings) = case.conflict_findings.clone() else {
            return Ok(StageResult::await_input(
                "Run conflict extraction before analyzing figures.",
                "Waiting for conflict findings",
            ));
        };

        if case.reference_documents.is_empty() {
            return Ok(StageResult::await_input(
                "Upload at least one referenced document before running this stage.",
                "Waiting for referenced documents",
            ));
        }

        let reference_text = case.combined_reference_text();
        let pair = prompts::figure_analysis(&findings.figures, &findings.text, &reference_text);
        let reply = self
            .llm
            .submit(&pair.system, &pair.user)
            .await
            .map_err(|e| FlowError::StageExecutionFailed(e.to_string()))?;

        case.last_raw_reply = Some(reply.clone());

        let analysis = match parse::parse_figure_analysis(&reply) {
            Ok(analysis) => analysis,
            Err(e) => {
                context.set(session_keys::CASE_FILE, case).await;
                return Err(FlowError::StageExecutionFailed(e.to_string()));
            }
        };

        let response = if analysis.figures.is_empty() {
            "No figure entries; extracted paragraph analysis only.".to_string()
        } else {
            format!("Analyzed {} figures.", analysis.figures.len())
        };
        case.figure_analysis = Some(analysis);
        context.set(session_keys::CASE_FILE, case).await;

        Ok(StageResult::advance_with_response(
            response,
            "Figure analysis completed",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{DEFAULT_DEPLOYMENT, LlmConfig};
    use crate::models::ConflictFindings;
    use stage_flow::StageOutcome;

    fn stage() -> FigureAnalysisStage {
        FigureAnalysisStage::new(Arc::new(LlmClient::with_config(LlmConfig {
            endpoint: "https://example.invalid".to_string(),
            api_key: "key".to_string(),
            api_version: "2024-02-01".to_string(),
            deployment: DEFAULT_DEPLOYMENT.to_string(),
        })))
    }

    #[tokio::test]
    async fn missing_reference_documents_awaits_input() {
        let context = Context::new();
        let case = CaseFile {
            conflict_findings: Some(ConflictFindings {
                foundational_claim: "Claim 1".to_string(),
                documents_referenced: vec!["Reference B".to_string()],
                figures: vec![],
                text: "cited text".to_string(),
            }),
            ..Default::default()
        };
        context.set(session_keys::CASE_FILE, case).await;

        let result = stage().run(context).await.unwrap();

        assert_eq!(result.outcome, StageOutcome::AwaitInput);
        assert!(result.response.unwrap().contains("referenced document"));
    }

    #[tokio::test]
    async fn missing_conflict_findings_awaits_input() {
        let context = Context::new();
        context.set(session_keys::CASE_FILE, CaseFile::default()).await;

        let result = stage().run(context).await.unwrap();

        assert_eq!(result.outcome, StageOutcome::AwaitInput);
    }
}
