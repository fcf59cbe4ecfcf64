use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use stage_flow::{
    FlowError, InMemorySessionStorage, PipelineRunner, RunStatus, Session, SessionStorage,
};

use crate::{
    export::{DOCX_MIME, export_docx},
    extract::extract_document,
    llm::LlmClient,
    models::{
        CaseCreatedResponse, CaseFile, CaseStatusResponse, DocumentKind, DocumentSummary,
        DocumentText, StageRunResponse, UploadResponse, session_keys,
    },
    parse::ParseStrategy,
    stages::stage_ids,
    workflow::{create_case_session, create_runner},
};

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

/// A closed gate is a warning to the operator, not a server fault.
fn gate_closed_error(message: &str) -> ApiError {
    (StatusCode::CONFLICT, Json(json!({ "warning": message })))
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub session_storage: Arc<dyn SessionStorage>,
    pub runner: PipelineRunner,
}

pub async fn create_app() -> Router {
    let llm = Arc::new(LlmClient::from_env());
    if let Some(var) = llm.missing_setting() {
        warn!("{var} is not set; analysis stages will fail until it is provided");
    }
    build_app(llm, ParseStrategy::from_env())
}

pub fn build_app(llm: Arc<LlmClient>, strategy: ParseStrategy) -> Router {
    let session_storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
    let runner = create_runner(llm, strategy, session_storage.clone());

    build_router(AppState {
        session_storage,
        runner,
    })
}

fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/cases", post(create_case))
        .route("/cases/{id}", get(get_case))
        .route(
            "/cases/{id}/documents/{kind}",
            post(upload_document).get(get_documents),
        )
        .route("/cases/{id}/stages/{stage}/run", post(run_stage))
        .route("/cases/{id}/report/{stage}", get(download_report))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Office Action Rebuttal Analysis Service",
        "version": "0.1.0",
        "description": "LLM-assisted comparison of an office action against prior art and the filed application",
        "endpoints": {
            "POST /cases": "Create a new analysis session",
            "POST /cases/{id}/documents/{kind}": "Upload a PDF (action, reference, filed-application, pending-claims)",
            "POST /cases/{id}/stages/{stage}/run": "Run one analysis stage",
            "GET /cases/{id}": "Get session status and results",
            "GET /cases/{id}/report/{stage}": "Download the .docx report for a finished stage",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn create_case(State(state): State<AppState>) -> ApiResult<CaseCreatedResponse> {
    let session = create_case_session(Uuid::new_v4().to_string()).await;
    let session_id = session.id.clone();

    state.session_storage.save(session).await.map_err(|e| {
        error!("Failed to create session: {}", e);
        internal_error("Failed to create analysis session", &e.to_string())
    })?;

    info!(session_id = %session_id, "created analysis session");

    Ok(Json(CaseCreatedResponse {
        session_id,
        current_stage: stage_ids::DOMAIN_EXPERTISE.to_string(),
        stages: state.runner.pipeline().stage_ids(),
    }))
}

async fn load_session(state: &AppState, session_id: &str) -> Result<Session, ApiError> {
    match state.session_storage.get(session_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found_error("Session not found", session_id)),
        Err(e) => {
            error!(session_id = %session_id, "Failed to load session: {}", e);
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}

async fn upload_document(
    State(state): State<AppState>,
    Path((session_id, kind)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<UploadResponse> {
    let Some(kind) = DocumentKind::parse(&kind) else {
        return Err(bad_request_error(
            "Unknown document kind; expected action, reference, filed-application or pending-claims",
        ));
    };

    if body.is_empty() {
        return Err(bad_request_error("Request body must contain the PDF bytes"));
    }

    let session = load_session(&state, &session_id).await?;

    let file_name = headers
        .get("x-file-name")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("{}.pdf", kind.as_str()));

    let document = extract_document(&file_name, body.to_vec())
        .await
        .map_err(|e| {
            warn!(session_id = %session_id, "extraction failed: {}", e);
            bad_request_error(&e.to_string())
        })?;

    let pages = document.page_count();
    let chars = document.char_count();
    let file_name = document.file_name.clone();

    let mut case: CaseFile = session
        .context
        .get(session_keys::CASE_FILE)
        .await
        .unwrap_or_default();
    store_document(&mut case, kind, document);
    session.context.set(session_keys::CASE_FILE, case).await;

    state.session_storage.save(session).await.map_err(|e| {
        error!(session_id = %session_id, "Failed to save session: {}", e);
        internal_error("Failed to save session", &e.to_string())
    })?;

    info!(session_id = %session_id, kind = kind.as_str(), pages, chars, "document extracted");

    Ok(Json(UploadResponse {
        session_id,
        kind,
        file_name,
        pages,
        chars,
    }))
}

/// Re-uploading replaces the previous document; references are keyed by file
/// name so several prior-art documents can coexist.
fn store_document(case: &mut CaseFile, kind: DocumentKind, document: DocumentText) {
    match kind {
        DocumentKind::Action => case.action_document = Some(document),
        DocumentKind::Reference => {
            if let Some(existing) = case
                .reference_documents
                .iter_mut()
                .find(|d| d.file_name == document.file_name)
            {
                *existing = document;
            } else {
                case.reference_documents.push(document);
            }
        }
        DocumentKind::FiledApplication => case.filed_application = Some(document),
        DocumentKind::PendingClaims => case.pending_claims = Some(document),
    }
}

/// Extracted text of the uploaded documents of one kind, for the display
/// panels. References come back as a list; the other kinds hold one entry.
async fn get_documents(
    State(state): State<AppState>,
    Path((session_id, kind)): Path<(String, String)>,
) -> ApiResult<Value> {
    let Some(kind) = DocumentKind::parse(&kind) else {
        return Err(bad_request_error(
            "Unknown document kind; expected action, reference, filed-application or pending-claims",
        ));
    };

    let session = load_session(&state, &session_id).await?;
    let case: CaseFile = session
        .context
        .get(session_keys::CASE_FILE)
        .await
        .unwrap_or_default();

    let documents: Vec<&DocumentText> = match kind {
        DocumentKind::Action => case.action_document.iter().collect(),
        DocumentKind::Reference => case.reference_documents.iter().collect(),
        DocumentKind::FiledApplication => case.filed_application.iter().collect(),
        DocumentKind::PendingClaims => case.pending_claims.iter().collect(),
    };

    Ok(Json(json!({
        "session_id": session_id,
        "kind": kind.as_str(),
        "documents": documents,
    })))
}

async fn run_stage(
    State(state): State<AppState>,
    Path((session_id, stage)): Path<(String, String)>,
) -> ApiResult<StageRunResponse> {
    info!(session_id = %session_id, stage = %stage, "operator triggered stage");

    match state.runner.run(&session_id, &stage).await {
        Ok(run) => {
            let session = load_session(&state, &session_id).await?;
            Ok(Json(StageRunResponse {
                session_id,
                stage,
                status: run_status_label(&run.status).to_string(),
                response: run.response,
                status_message: session.status_message,
            }))
        }
        Err(FlowError::SessionNotFound(id)) => Err(not_found_error("Session not found", &id)),
        Err(FlowError::StageNotFound(id)) => Err(not_found_error("Unknown stage", &id)),
        Err(e @ FlowError::GateClosed { .. }) => {
            warn!(session_id = %session_id, stage = %stage, "{}", e);
            Err(gate_closed_error(&e.to_string()))
        }
        Err(e) => {
            error!(session_id = %session_id, stage = %stage, "stage execution failed: {}", e);
            Err(internal_error("Stage execution failed", &e.to_string()))
        }
    }
}

fn run_status_label(status: &RunStatus) -> &'static str {
    match status {
        RunStatus::AwaitingInput => "awaiting_input",
        RunStatus::StageCompleted => "stage_completed",
        RunStatus::PipelineCompleted => "pipeline_completed",
    }
}

async fn get_case(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<CaseStatusResponse> {
    let session = load_session(&state, &session_id).await?;
    let case: CaseFile = session
        .context
        .get(session_keys::CASE_FILE)
        .await
        .unwrap_or_default();

    Ok(Json(CaseStatusResponse {
        session_id: session.id.clone(),
        current_stage: session.current_stage_id.clone(),
        completed_stages: session.completed.clone(),
        status_message: session.status_message.clone(),
        action_document: case.action_document.as_ref().map(summarize),
        reference_documents: case.reference_documents.iter().map(summarize).collect(),
        filed_application: case.filed_application.as_ref().map(summarize),
        pending_claims: case.pending_claims.as_ref().map(summarize),
        domain_expertise: case.domain_expertise,
        conflict_findings: case.conflict_findings,
        figure_analysis: case.figure_analysis,
        filed_application_analysis: case.filed_application_analysis,
        pending_claims_analysis: case.pending_claims_analysis,
    }))
}

fn summarize(document: &DocumentText) -> DocumentSummary {
    DocumentSummary {
        file_name: document.file_name.clone(),
        pages: document.page_count(),
        chars: document.char_count(),
    }
}

async fn download_report(
    State(state): State<AppState>,
    Path((session_id, stage)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let session = load_session(&state, &session_id).await?;
    let case: CaseFile = session
        .context
        .get(session_keys::CASE_FILE)
        .await
        .unwrap_or_default();

    let (analysis, title, file_name) = match stage.as_str() {
        stage_ids::FILED_APPLICATION_ANALYSIS => (
            case.filed_application_analysis,
            "Filed Application Analysis Results",
            "filed_application_analysis.docx",
        ),
        stage_ids::PENDING_CLAIMS_ANALYSIS => (
            case.pending_claims_analysis,
            "Pending Claims Analysis Results",
            "pending_claims_analysis.docx",
        ),
        _ => return Err(bad_request_error("No report is exported for this stage")),
    };

    let Some(analysis) = analysis else {
        return Err(not_found_error(
            "Analysis is not available yet; run the stage first",
            &session_id,
        ));
    };

    let buffer = export_docx(title, &analysis.report_text()).map_err(|e| {
        error!(session_id = %session_id, stage = %stage, "export failed: {}", e);
        internal_error("Failed to export report", &e.to_string())
    })?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, DOCX_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        buffer,
    )
        .into_response())
}
