//! cpipe-server: surface HTTP du pipeline simulé
//!
//! Routes :
//! - `POST /api/compile`   `{source_code}` → document de session
//! - `GET  /api/step`      `?session_id&step&action&to` → vue d'étape
//! - `GET  /api/visualize` `?session_id&stage` → scène 3D
//! - `GET  /api/download`  `?session_id&type&format` → fichier (`type=source` : le C soumis)
//! - `GET  /api/health`    → `{status, version}`
//!
//! Faits saillants :
//! - erreurs JSON `{error, success: false}` ; 400 (requête), 404 (session), 500 (stockage) ;
//! - CORS permissif, frontal statique optionnel servi en repli ;
//! - le stockage est synchrone : chaque accès passe par `spawn_blocking`.

#![deny(missing_docs)]

pub mod config;

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cpipe_compiler::Session;
use cpipe_core::{PipelineError, PipelineResult};
use cpipe_session::Sessions;
use cpipe_step::{StepAction, StepView};
use cpipe_tools::{Artifact, Format, Scene, View};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;

/* ─────────────────────────── État ─────────────────────────── */

/// État partagé entre les handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Façade de sessions.
    pub sessions: Arc<Sessions>,
}

impl AppState {
    /// État autour d'une façade.
    pub fn new(sessions: Sessions) -> Self {
        Self { sessions: Arc::new(sessions) }
    }
}

/// Routeur complet (API, CORS, traces, frontal statique éventuel).
pub fn router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let mut app = Router::new()
        .route("/api/compile", post(compile_handler))
        .route("/api/step", get(step_handler))
        .route("/api/visualize", get(visualize_handler))
        .route("/api/download", get(download_handler))
        .route("/api/health", get(health_handler));
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }
    app.layer(CorsLayer::permissive()).layer(TraceLayer::new_for_http()).with_state(state)
}

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Corps d'erreur JSON.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    success: bool,
}

/// Erreur prête à être renvoyée au client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Requête incomplète (400).
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    /// Code HTTP.
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::EmptyInput | PipelineError::InvalidStep(_) | PipelineError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::StorageFailure(detail) => {
                tracing::error!(%detail, "storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message, success: false })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Exécute un accès au stockage hors du runtime async.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> PipelineResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(res) => res.map_err(ApiError::from),
        Err(err) => {
            tracing::error!(error = %err, "blocking task failed");
            Err(PipelineError::storage(err).into())
        }
    }
}

fn require_session(id: Option<String>) -> ApiResult<String> {
    id.filter(|s| !s.is_empty()).ok_or_else(|| ApiError::bad_request("No session ID provided"))
}

async fn load(state: &AppState, id: String) -> ApiResult<Session> {
    let sessions = Arc::clone(&state.sessions);
    blocking(move || sessions.load(&id)).await
}

/* ─────────────────────────── Handlers ─────────────────────────── */

#[derive(Debug, Default, Deserialize)]
struct CompileRequest {
    #[serde(default)]
    source_code: String,
}

/// Un corps illisible vaut un source absent.
async fn compile_handler(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Session>> {
    let req: CompileRequest = serde_json::from_slice(&body).unwrap_or_default();
    let sessions = Arc::clone(&state.sessions);
    let session = blocking(move || sessions.create(&req.source_code)).await?;
    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
struct StepQuery {
    session_id: Option<String>,
    step: Option<String>,
    action: Option<String>,
    to: Option<String>,
}

fn int_param(name: &str, raw: Option<&str>) -> ApiResult<Option<i64>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s.parse().map(Some).map_err(|_| ApiError::bad_request(format!("Invalid {name}: {s}"))),
    }
}

async fn step_handler(State(state): State<AppState>, Query(q): Query<StepQuery>) -> ApiResult<Json<StepView>> {
    let id = require_session(q.session_id)?;
    let current = int_param("step", q.step.as_deref())?.unwrap_or(0);
    let to = int_param("to", q.to.as_deref())?;
    let action = StepAction::parse(q.action.as_deref(), to)?;
    let session = load(&state, id).await?;
    Ok(Json(cpipe_step::navigate(&session, current, action)?))
}

#[derive(Debug, Deserialize)]
struct VisualizeQuery {
    session_id: Option<String>,
    stage: Option<String>,
}

async fn visualize_handler(
    State(state): State<AppState>,
    Query(q): Query<VisualizeQuery>,
) -> ApiResult<Json<Scene>> {
    let id = require_session(q.session_id)?;
    let view: View = q.stage.as_deref().map_or(Ok(View::All), str::parse)?;
    let session = load(&state, id).await?;
    Ok(Json(cpipe_tools::visualize(&session, view)))
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    session_id: Option<String>,
    #[serde(rename = "type")]
    artifact: Option<String>,
    format: Option<String>,
}

async fn download_handler(State(state): State<AppState>, Query(q): Query<DownloadQuery>) -> ApiResult<Response> {
    let (Some(id), Some(kind)) = (q.session_id.filter(|s| !s.is_empty()), q.artifact.filter(|s| !s.is_empty()))
    else {
        return Err(ApiError::bad_request("Missing parameters"));
    };
    let session = load(&state, id).await?;
    let artifact: Artifact = kind.parse()?;
    // l'archive et le source ignorent le format, même inconnu
    let format = match (artifact, q.format.as_deref()) {
        (_, None) => Format::default(),
        (Artifact::All | Artifact::Source, Some(f)) => f.parse().unwrap_or_default(),
        (_, Some(f)) => f.parse()?,
    };
    let download = if artifact == Artifact::Source {
        let sessions = Arc::clone(&state.sessions);
        let id = session.session_id.clone();
        let source = blocking(move || sessions.source(&id)).await?;
        cpipe_tools::export_source(&source)
    } else {
        cpipe_tools::export(&session, artifact, format)?
    };

    if artifact == Artifact::All {
        let sessions = Arc::clone(&state.sessions);
        let (id, bytes, name) = (session.session_id.clone(), download.bytes.clone(), download.filename.clone());
        blocking(move || sessions.store().put_artifact(&id, &name, &bytes)).await?;
    }
    tracing::info!(session = %session.session_id, %artifact, %format, bytes = download.bytes.len(), "download");

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", download.filename))
        .map_err(|e| ApiError::from(PipelineError::storage(e)))?;
    Ok((
        [(header::CONTENT_TYPE, HeaderValue::from_static(download.mime)), (header::CONTENT_DISPOSITION, disposition)],
        download.bytes,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<Health> {
    Json(Health { status: "ok", version: env!("CARGO_PKG_VERSION") })
}
