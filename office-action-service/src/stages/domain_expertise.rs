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

/// Detects the technical field of the office action and phrases the attorney
/// persona the later stages adopt.
pub struct DomainExpertiseStage {
    llm: Arc<LlmClient>,
}

impl DomainExpertiseStage {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for DomainExpertiseStage {
    fn id(&self) -> &str {
        stage_ids::DOMAIN_EXPERTISE
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

        let pair = prompts::domain_expertise(&action.full_text());
        let reply = self
            .llm
            .submit(&pair.system, &pair.user)
            .await
            .map_err(|e| FlowError::StageExecutionFailed(e.to_string()))?;

        case.last_raw_reply = Some(reply.clone());
        let persona = parse::parse_domain_expertise(&reply);
        case.domain_expertise = Some(persona.clone());
        context.set(session_keys::CASE_FILE, case).await;

        info!(persona = %persona, "domain expertise detected");
        Ok(StageResult::advance_with_response(
            persona,
            "Domain expertise detected",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{DEFAULT_DEPLOYMENT, LlmConfig};
    use stage_flow::StageOutcome;

    fn stage() -> DomainExpertiseStage {
        DomainExpertiseStage::new(Arc::new(LlmClient::with_config(LlmConfig {
            endpoint: "https://example.invalid".to_string(),
            api_key: "key".to_string(),
            api_version: "2024-02-01".to_string(),
            deployment: DEFAULT_DEPLOYMENT.to_string(),
        })))
    }

    #[tokio::test]
    async fn missing_action_document_awaits_input_without_calling_the_model() {
        let context = Context::new();
        context.set(session_keys::CASE_FILE, CaseFile::default()).await;

        let result = stage().run(context).await.unwrap();

        assert_eq!(result.outcome, StageOutcome::AwaitInput);
        assert!(result.response.unwrap().contains("office action"));
    }

    #[tokio::test]
    async fn missing_case_file_is_a_context_error() {
        let err = stage().run(Context::new()).await.unwrap_err();
        assert!(matches!(err, FlowError::ContextError(_)));
    }
}
