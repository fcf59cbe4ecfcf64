use std::sync::Arc;

use async_trait::async_trait;
use stage_flow::{Context, FlowError, Result, Stage, StageResult};
use tracing::info;

use super::stage_ids;
use crate::{
    llm::LlmClient,
    models::{ApplicationAnalysis, CaseFile, session_keys},
    parse, prompts,
};

/// Judges the examiner's rejection against the application as filed and
/// drafts the rebuttal-or-concurrence report.
pub struct FiledApplicationStage {
    llm: Arc<LlmClient>,
}

impl FiledApplicationStage {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for FiledApplicationStage {
    fn id(&self) -> &str {
        stage_ids::FILED_APPLICATION_ANALYSIS
    }

    async fn run(&self, context: Context) -> Result<StageResult> {
        info!("running stage: {}", self.id());

        let mut case: CaseFile = context.require(session_keys::CASE_FILE).await?;

        let Some(findings) = case.conflict_findings.clone() else {
            return Ok(StageResult::await_input(
                "Run conflict extraction before analyzing the filed application.",
                "Waiting for conflict findings",
            ));
        };
        let Some(figure_analysis) = case.figure_analysis.clone() else {
            return Ok(StageResult::await_input(
                "Run figure analysis before analyzing the filed application.",
                "Waiting for figure analysis",
            ));
        };
        let Some(filed) = case.filed_application.clone() else {
            return Ok(StageResult::await_input(
                "Upload the application as filed before running this stage.",
                "Waiting for the application as filed",
            ));
        };

        let pair = prompts::filed_application_analysis(
            &findings.foundational_claim,
            &figure_analysis.display_text(),
            &filed.full_text(),
            case.domain_expertise.as_deref(),
        );
        let reply = self
            .llm
            .submit(&pair.system, &pair.user)
            .await
            .map_err(|e| FlowError::StageExecutionFailed(e.to_string()))?;

        case.last_raw_reply = Some(reply.clone());

        // Enforce the statute labels before parsing so both the structured
        // and the narrative result carry them.
        let analysis = parse::parse_application_analysis(&parse::label_statutes(&reply));
        let response = summary_line(&analysis);
        case.filed_application_analysis = Some(analysis);
        context.set(session_keys::CASE_FILE, case).await;

        Ok(StageResult::advance_with_response(
            response,
            "Filed application analysis completed",
        ))
    }
}

fn summary_line(analysis: &ApplicationAnalysis) -> String {
    match analysis {
        ApplicationAnalysis::Structured(report) if !report.conclusion.is_empty() => {
            format!("Conclusion: {}", report.conclusion)
        }
        ApplicationAnalysis::Structured(_) => "Structured analysis report ready.".to_string(),
        ApplicationAnalysis::Narrative { .. } => "Narrative analysis report ready.".to_string(),
    }
}
