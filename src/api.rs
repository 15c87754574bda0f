//! HTTP endpoints for the collaborators around the session: the question
//! builder, the lobby page, and the results exporter.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;

use crate::session::{
    BankError, ExportSnapshot, LobbyInfo, QuestionInput, SessionClosed, SessionHandle,
};
use crate::types::Question;
use crate::ws;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Bank(#[from] BankError),

    #[error(transparent)]
    Closed(#[from] SessionClosed),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Bank(_) => StatusCode::BAD_REQUEST,
            ApiError::Closed(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        tracing::warn!("API request failed: {}", self);
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub count: usize,
}

/// Routes for the WebSocket channel and the JSON API
pub fn router(session: SessionHandle) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/questions", get(list_questions).post(upload_questions))
        .route("/api/lobby", get(lobby))
        .route("/api/export", get(export))
        .with_state(session)
}

/// GET /api/questions
pub async fn list_questions(
    State(session): State<SessionHandle>,
) -> Result<Json<Vec<Question>>, ApiError> {
    Ok(Json(session.questions().await?))
}

/// POST /api/questions
///
/// Replaces the whole bank and resets the session.
pub async fn upload_questions(
    State(session): State<SessionHandle>,
    Json(questions): Json<Vec<QuestionInput>>,
) -> Result<Json<UploadResponse>, ApiError> {
    let count = session.replace_bank(questions).await??;
    Ok(Json(UploadResponse { ok: true, count }))
}

/// GET /api/lobby
pub async fn lobby(State(session): State<SessionHandle>) -> Result<Json<LobbyInfo>, ApiError> {
    Ok(Json(session.lobby().await?))
}

/// GET /api/export
pub async fn export(
    State(session): State<SessionHandle>,
) -> Result<Json<ExportSnapshot>, ApiError> {
    Ok(Json(session.export().await?))
}
