pub mod context;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod session;
pub mod stage;

// Re-export commonly used types
pub use context::Context;
pub use error::{FlowError, Result};
pub use pipeline::{Pipeline, PipelineBuilder, RunStatus, StageRun};
pub use runner::PipelineRunner;
pub use session::{InMemorySessionStorage, Session, SessionStorage};
pub use stage::{Stage, StageOutcome, StageResult};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct RecordingStage {
        id: &'static str,
    }

    #[async_trait]
    impl Stage for RecordingStage {
        fn id(&self) -> &str {
            self.id
        }

        async fn run(&self, context: Context) -> Result<StageResult> {
            let input: String = context.get("input").await.unwrap_or_default();
            context.set(self.id, format!("ran: {input}")).await;

            Ok(StageResult::advance(format!("{} completed", self.id)))
        }
    }

    struct WaitingStage {
        id: &'static str,
    }

    #[async_trait]
    impl Stage for WaitingStage {
        fn id(&self) -> &str {
            self.id
        }

        async fn run(&self, _context: Context) -> Result<StageResult> {
            Ok(StageResult::await_input(
                "missing input",
                "waiting for input",
            ))
        }
    }

    fn two_stage_pipeline() -> Pipeline {
        PipelineBuilder::new("test_pipeline")
            .add_stage(Arc::new(RecordingStage { id: "first" }))
            .add_stage(Arc::new(RecordingStage { id: "second" }))
            .build()
    }

    #[tokio::test]
    async fn stage_completion_opens_next_gate() {
        let pipeline = two_stage_pipeline();
        let mut session = Session::new_from_stage("s1".to_string(), "first");
        session.context.set("input", "hello").await;

        let run = pipeline.run_stage(&mut session, "first").await.unwrap();

        assert_eq!(run.status, RunStatus::StageCompleted);
        assert!(session.is_completed("first"));
        assert_eq!(session.current_stage_id, "second");

        let output: String = session.context.get("first").await.unwrap();
        assert_eq!(output, "ran: hello");
    }

    #[tokio::test]
    async fn gate_stays_closed_until_predecessors_complete() {
        let pipeline = two_stage_pipeline();
        let mut session = Session::new_from_stage("s1".to_string(), "first");

        assert!(!pipeline.is_enabled("second", &session).unwrap());

        let err = pipeline.run_stage(&mut session, "second").await.unwrap_err();
        assert!(matches!(err, FlowError::GateClosed { .. }));

        // Refusal leaves the session untouched.
        assert!(session.completed.is_empty());
        assert_eq!(session.current_stage_id, "first");

        pipeline.run_stage(&mut session, "first").await.unwrap();
        assert!(pipeline.is_enabled("second", &session).unwrap());
    }

    #[tokio::test]
    async fn awaiting_stage_does_not_complete() {
        let pipeline = PipelineBuilder::new("test_pipeline")
            .add_stage(Arc::new(WaitingStage { id: "first" }))
            .build();
        let mut session = Session::new_from_stage("s1".to_string(), "first");

        let run = pipeline.run_stage(&mut session, "first").await.unwrap();

        assert_eq!(run.status, RunStatus::AwaitingInput);
        assert_eq!(run.response.as_deref(), Some("missing input"));
        assert!(!session.is_completed("first"));
        assert_eq!(session.current_stage_id, "first");
    }

    #[tokio::test]
    async fn rerunning_earlier_stage_keeps_later_results() {
        let pipeline = two_stage_pipeline();
        let mut session = Session::new_from_stage("s1".to_string(), "first");

        pipeline.run_stage(&mut session, "first").await.unwrap();
        let run = pipeline.run_stage(&mut session, "second").await.unwrap();
        assert_eq!(run.status, RunStatus::PipelineCompleted);

        // Re-run the first stage: the second stage's completion survives and
        // the operator's position does not move backwards.
        pipeline.run_stage(&mut session, "first").await.unwrap();
        assert!(session.is_completed("second"));
        assert_eq!(session.current_stage_id, "second");
    }

    #[tokio::test]
    async fn runner_persists_sessions_across_steps() {
        let pipeline = Arc::new(two_stage_pipeline());
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
        let runner = PipelineRunner::new(pipeline, storage.clone());

        let session = Session::new_from_stage("s1".to_string(), "first");
        storage.save(session).await.unwrap();

        runner.run("s1", "first").await.unwrap();

        let stored = storage.get("s1").await.unwrap().unwrap();
        assert!(stored.is_completed("first"));
        assert_eq!(stored.current_stage_id, "second");

        let missing = runner.run("unknown", "first").await.unwrap_err();
        assert!(matches!(missing, FlowError::SessionNotFound(_)));
    }
}
