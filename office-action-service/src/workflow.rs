use std::sync::Arc;

use stage_flow::{Pipeline, PipelineBuilder, PipelineRunner, Session, SessionStorage};

use crate::{
    llm::LlmClient,
    models::{CaseFile, session_keys},
    parse::ParseStrategy,
    stages::{
        ConflictExtractionStage, DomainExpertiseStage, FigureAnalysisStage, FiledApplicationStage,
        PendingClaimsStage, stage_ids,
    },
};

pub fn build_rebuttal_pipeline(llm: Arc<LlmClient>, strategy: ParseStrategy) -> Pipeline {
    PipelineBuilder::new("office_action_rebuttal")
        .add_stage(Arc::new(DomainExpertiseStage::new(llm.clone())))
        .add_stage(Arc::new(ConflictExtractionStage::new(llm.clone(), strategy)))
        .add_stage(Arc::new(FigureAnalysisStage::new(llm.clone())))
        .add_stage(Arc::new(FiledApplicationStage::new(llm.clone())))
        .add_stage(Arc::new(PendingClaimsStage::new(llm)))
        .build()
}

pub async fn create_case_session(session_id: String) -> Session {
    let session = Session::new_from_stage(session_id, stage_ids::DOMAIN_EXPERTISE);
    session
        .context
        .set(session_keys::CASE_FILE, CaseFile::default())
        .await;
    session
}

pub fn create_runner(
    llm: Arc<LlmClient>,
    strategy: ParseStrategy,
    session_storage: Arc<dyn SessionStorage>,
) -> PipelineRunner {
    let pipeline = Arc::new(build_rebuttal_pipeline(llm, strategy));
    PipelineRunner::new(pipeline, session_storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{DEFAULT_DEPLOYMENT, LlmConfig};
    use stage_flow::{FlowError, InMemorySessionStorage};

    fn test_llm() -> Arc<LlmClient> {
        Arc::new(LlmClient::with_config(LlmConfig {
            endpoint: "https://example.invalid".to_string(),
            api_key: "key".to_string(),
            api_version: "2024-02-01".to_string(),
            deployment: DEFAULT_DEPLOYMENT.to_string(),
        }))
    }

    #[test]
    fn pipeline_stages_are_in_rejection_analysis_order() {
        let pipeline = build_rebuttal_pipeline(test_llm(), ParseStrategy::Json);
        assert_eq!(
            pipeline.stage_ids(),
            vec![
                stage_ids::DOMAIN_EXPERTISE,
                stage_ids::CONFLICT_EXTRACTION,
                stage_ids::FIGURE_ANALYSIS,
                stage_ids::FILED_APPLICATION_ANALYSIS,
                stage_ids::PENDING_CLAIMS_ANALYSIS,
            ]
        );
    }

    #[tokio::test]
    async fn new_session_starts_at_domain_expertise_with_an_empty_case() {
        let session = create_case_session("s1".to_string()).await;
        assert_eq!(session.current_stage_id, stage_ids::DOMAIN_EXPERTISE);
        assert!(session.completed.is_empty());

        let case: CaseFile = session.context.require(session_keys::CASE_FILE).await.unwrap();
        assert!(case.action_document.is_none());
        assert!(case.conflict_findings.is_none());
    }

    #[tokio::test]
    async fn later_stages_are_gated_until_predecessors_complete() {
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
        let runner = create_runner(test_llm(), ParseStrategy::Json, storage.clone());

        let session = create_case_session("s1".to_string()).await;
        storage.save(session).await.unwrap();

        // No stage has completed, so everything past the first is refused
        // before any model call happens.
        let err = runner.run("s1", stage_ids::FIGURE_ANALYSIS).await.unwrap_err();
        assert!(matches!(err, FlowError::GateClosed { .. }));

        let stored = storage.get("s1").await.unwrap().unwrap();
        assert!(stored.completed.is_empty());
        assert_eq!(stored.current_stage_id, stage_ids::DOMAIN_EXPERTISE);
    }
}
