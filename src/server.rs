//! HTTP API over the analysis pipeline.
//!
//! Thin wiring: handlers validate input, touch storage, and enqueue work;
//! all sequencing lives in the pipeline itself. The caller that starts an
//! analysis immediately receives the job in PENDING state and polls for
//! progress.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/repos` | Register a repository by URL |
//! | `GET`  | `/repos` | List registered repositories |
//! | `POST` | `/analyses` | Create an analysis job for a repository |
//! | `GET`  | `/analyses/{id}` | Poll job status |
//! | `GET`  | `/analyses/{id}/evidence` | Retrieve the persisted evidence package |
//! | `GET`  | `/analyses/{id}/document` | Retrieve the generated markdown |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "job abc not found" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `queue_full`
//! (503), `internal` (500).

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::{AnalysisJob, JobStatus, Repository};
use crate::worker::{self, JobQueue};
use crate::{db, fetch, store};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pool: SqlitePool,
    queue: JobQueue,
}

/// Start the worker pool and the HTTP server. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());

    let pool = db::connect(&config).await?;

    let queue = worker::start(Arc::clone(&config), pool.clone());
    println!(
        "{} workers consuming the job queue (capacity {})",
        config.queue.workers, config.queue.capacity
    );

    let state = AppState { pool, queue };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/repos", post(handle_create_repo).get(handle_list_repos))
        .route("/analyses", post(handle_create_analysis))
        .route("/analyses/{id}", get(handle_get_analysis))
        .route("/analyses/{id}/evidence", get(handle_get_evidence))
        .route("/analyses/{id}/document", get(handle_get_document))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("API server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn queue_full() -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "queue_full".to_string(),
        message: "job queue is at capacity, retry later".to_string(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

// ============ Response shapes ============

#[derive(Serialize)]
struct RepositoryView {
    id: String,
    full_name: String,
    url: String,
    created_at: i64,
}

impl From<&Repository> for RepositoryView {
    fn from(repo: &Repository) -> Self {
        Self {
            id: repo.id.clone(),
            full_name: repo.full_name.clone(),
            url: repo.url.clone(),
            created_at: repo.created_at,
        }
    }
}

/// Job record as seen by pollers. Evidence is exposed on its own route,
/// not inlined here.
#[derive(Serialize)]
struct JobView {
    id: String,
    repository_id: String,
    status: JobStatus,
    error_message: Option<String>,
    created_at: i64,
    finished_at: Option<i64>,
}

impl From<&AnalysisJob> for JobView {
    fn from(job: &AnalysisJob) -> Self {
        Self {
            id: job.id.clone(),
            repository_id: job.repository_id.clone(),
            status: job.status,
            error_message: job.error_message.clone(),
            created_at: job.created_at,
            finished_at: job.finished_at,
        }
    }
}

// ============ POST /repos ============

#[derive(Deserialize)]
struct CreateRepoRequest {
    url: String,
}

async fn handle_create_repo(
    State(state): State<AppState>,
    Json(req): Json<CreateRepoRequest>,
) -> Result<Json<RepositoryView>, AppError> {
    let full_name = fetch::repo_full_name(&req.url).map_err(|e| bad_request(e.to_string()))?;

    let repo = store::create_repository(&state.pool, &full_name, &req.url)
        .await
        .map_err(internal)?;

    Ok(Json(RepositoryView::from(&repo)))
}

// ============ GET /repos ============

async fn handle_list_repos(
    State(state): State<AppState>,
) -> Result<Json<Vec<RepositoryView>>, AppError> {
    let repos = store::list_repositories(&state.pool)
        .await
        .map_err(internal)?;

    Ok(Json(repos.iter().map(RepositoryView::from).collect()))
}

// ============ POST /analyses ============

#[derive(Deserialize)]
struct CreateAnalysisRequest {
    repository_id: String,
}

/// Create a job in PENDING state and hand it to the worker pool. The
/// queue slot is reserved before the row is written, so a full queue is
/// a clean 503 with no orphaned job.
async fn handle_create_analysis(
    State(state): State<AppState>,
    Json(req): Json<CreateAnalysisRequest>,
) -> Result<Json<JobView>, AppError> {
    let repo = store::get_repository(&state.pool, &req.repository_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("repository {} not found", req.repository_id)))?;

    let slot = state.queue.try_reserve().map_err(|_| queue_full())?;

    let job = store::create_job(&state.pool, &repo.id)
        .await
        .map_err(internal)?;
    slot.send(job.id.clone());

    Ok(Json(JobView::from(&job)))
}

// ============ GET /analyses/{id} ============

async fn handle_get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobView>, AppError> {
    let job = store::get_job(&state.pool, &id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("job {} not found", id)))?;

    Ok(Json(JobView::from(&job)))
}

// ============ GET /analyses/{id}/evidence ============

/// The persisted evidence package, verbatim. Available as soon as
/// composition succeeded, including for jobs that later failed: partial
/// evidence is the diagnosis surface.
async fn handle_get_evidence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let job = store::get_job(&state.pool, &id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("job {} not found", id)))?;

    let evidence = job
        .evidence_json
        .ok_or_else(|| not_found(format!("no evidence composed for job {}", id)))?;

    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        evidence,
    )
        .into_response())
}

// ============ GET /analyses/{id}/document ============

#[derive(Serialize)]
struct DocumentResponse {
    markdown: String,
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, AppError> {
    let job = store::get_job(&state.pool, &id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("job {} not found", id)))?;

    let doc = store::get_document_for_job(&state.pool, &job.id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("no document generated for job {}", id)))?;

    Ok(Json(DocumentResponse {
        markdown: doc.content_md,
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
