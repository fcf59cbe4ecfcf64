pub mod export;
pub mod extract;
pub mod llm;
pub mod models;
pub mod parse;
pub mod prompts;
pub mod service;
pub mod stages;
pub mod workflow;

pub use models::*;
pub use service::{AppState, build_app, create_app};
pub use workflow::{build_rebuttal_pipeline, create_case_session, create_runner};
