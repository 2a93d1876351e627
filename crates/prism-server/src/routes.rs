//! HTTP API and UI routes.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use prism_config::{LlmSettings, update_env_file};
use prism_core::responses::{QueryRequest, QueryResponse, SessionStateResponse};
use prism_lake::download::download_indexes;
use prism_lake::list_output_folders;
use prism_search::{SearchError, send_message};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::assets;
use crate::state::AppState;

/// Errors returned by the settings and download routes as
/// `500 {"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Config(#[from] prism_config::ConfigError),

    #[error(transparent)]
    Lake(#[from] prism_lake::LakeError),

    #[error("{0}")]
    Invalid(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/assets/main.js", get(script))
        .route("/assets/main.css", get(stylesheet))
        .route("/health", get(health))
        .route("/api/state", get(session_state))
        .route("/api/folders", get(folders))
        .route("/api/query", post(query))
        .route("/api/settings", get(get_settings).post(save_settings))
        .route("/api/index/download", post(download))
        .route("/api/schema/query-response", get(query_response_schema))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(assets::INDEX_HTML)
}

async fn script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], assets::MAIN_JS)
}

async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], assets::MAIN_CSS)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let session = state.session.lock().await;
    Json(json!({ "status": "ok", "timestamp": session.timestamp() }))
}

async fn session_state(State(state): State<AppState>) -> Json<SessionStateResponse> {
    Json(state.session.lock().await.state_response())
}

async fn folders(State(state): State<AppState>) -> Json<Vec<String>> {
    let root = state.session.lock().await.root_dir().to_path_buf();
    Json(list_output_folders(&root))
}

async fn query(State(state): State<AppState>, Json(request): Json<QueryRequest>) -> Json<QueryResponse> {
    Json(send_message(&state.session, request).await)
}

async fn get_settings(State(state): State<AppState>) -> Json<LlmSettings> {
    Json(LlmSettings::from_config(state.session.lock().await.config()))
}

/// Write the endpoint settings to `<root>/.env` and reload the configuration.
async fn save_settings(
    State(state): State<AppState>,
    Json(mut settings): Json<LlmSettings>,
) -> Result<Json<LlmSettings>, ApiError> {
    let mut session = state.session.lock().await;
    settings.unmask(session.config());
    let env_path = session.root_dir().join(".env");
    update_env_file(&env_path, &settings.env_pairs())?;
    session.reload_config()?;
    tracing::info!(path = %env_path.display(), "saved endpoint settings");
    Ok(Json(LlmSettings::from_config(session.config())))
}

#[derive(Debug, Default, Deserialize)]
struct DownloadRequest {
    #[serde(default)]
    connection_string: Option<String>,
    #[serde(default)]
    container: Option<String>,
}

#[derive(Debug, Serialize)]
struct DownloadResponse {
    folders: Vec<String>,
    timestamp: Option<String>,
}

/// Download index runs from Azure Blob Storage into the index root. Values
/// missing from the body come from the storage configuration.
async fn download(
    State(state): State<AppState>,
    body: Option<Json<DownloadRequest>>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let (root, storage) = {
        let session = state.session.lock().await;
        (session.root_dir().to_path_buf(), session.config().storage.clone())
    };
    let connection_string = request
        .connection_string
        .filter(|s| !s.is_empty())
        .unwrap_or(storage.connection_string);
    let container = request
        .container
        .filter(|s| !s.is_empty())
        .unwrap_or(storage.container_name);
    if connection_string.is_empty() || container.is_empty() {
        return Err(ApiError::Invalid(
            "storage connection string and container name are required".to_string(),
        ));
    }

    let folders = download_indexes(&connection_string, &container, &root).await?;
    tracing::info!(count = folders.len(), %container, "downloaded index runs");

    let mut session = state.session.lock().await;
    if session.timestamp().is_none() {
        session.load_latest().await;
    }
    Ok(Json(DownloadResponse {
        folders,
        timestamp: session.timestamp().map(str::to_string),
    }))
}

async fn query_response_schema() -> Json<schemars::Schema> {
    Json(schemars::schema_for!(QueryResponse))
}
