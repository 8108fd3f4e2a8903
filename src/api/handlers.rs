//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ConfirmRequest, ErrorResponse, QueuedResponse, SelectRequest, SessionView, SuccessResponse,
    TurnRequest,
};
use super::AppState;
use crate::directory::{DirectoryError, Visitor, VisitorUpdate};
use crate::runtime::{SessionError, SessionHandle};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session creation
        .route("/api/sessions", post(create_session))
        // Session snapshot and teardown
        .route("/api/sessions/:id", get(get_session).delete(close_session))
        // SSE streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        // Visitor actions
        .route("/api/sessions/:id/turns", post(submit_turn))
        .route("/api/sessions/:id/confirm", post(submit_confirmation))
        .route("/api/sessions/:id/select", post(select_option))
        .route("/api/sessions/:id/reset", post(reset_session))
        // Visitor directory proxy
        .route("/api/visitors", get(list_visitors).post(create_visitor))
        .route(
            "/api/visitors/:cnic",
            get(get_visitor).put(update_visitor).delete(delete_visitor),
        )
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Sessions
// ============================================================

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let session = state.sessions.create().await;
    (
        StatusCode::CREATED,
        Json(SessionView::new(session.session_id(), &session.snapshot())),
    )
}

/// Only `POST /api/sessions` starts a runtime; every other route needs a live one
async fn lookup(state: &AppState, id: &str) -> Result<SessionHandle, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let session = lookup(&state, &id).await?;
    Ok(Json(SessionView::new(session.session_id(), &session.snapshot())))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.sessions.close(&id).await {
        return Err(AppError::NotFound(format!("Session not found: {id}")));
    }
    Ok(Json(SuccessResponse { success: true }))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = lookup(&state, &id).await?;

    // Subscribe before taking the snapshot so nothing falls in between
    let broadcast_rx = session.subscribe();
    let init = SessionView::new(session.session_id(), &session.snapshot());

    Ok(sse_stream(init, broadcast_rx))
}

async fn submit_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TurnRequest>,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    let session = lookup(&state, &id).await?;
    session.submit_turn(req.text).await?;
    Ok((StatusCode::ACCEPTED, Json(QueuedResponse { queued: true })))
}

async fn submit_confirmation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    let session = lookup(&state, &id).await?;
    session.submit_confirmation(req.accepted).await?;
    Ok((StatusCode::ACCEPTED, Json(QueuedResponse { queued: true })))
}

async fn select_option(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SelectRequest>,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    let session = lookup(&state, &id).await?;
    session.select(req.value).await?;
    Ok((StatusCode::ACCEPTED, Json(QueuedResponse { queued: true })))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let session = lookup(&state, &id).await?;
    session.reset().await?;
    Ok(Json(SessionView::new(session.session_id(), &session.snapshot())))
}

// ============================================================
// Visitor Directory
// ============================================================

async fn list_visitors(State(state): State<AppState>) -> Result<Json<Vec<Visitor>>, AppError> {
    Ok(Json(state.directory.list().await?))
}

async fn create_visitor(
    State(state): State<AppState>,
    Json(visitor): Json<Visitor>,
) -> Result<(StatusCode, Json<Visitor>), AppError> {
    let created = state.directory.create(&visitor).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_visitor(
    State(state): State<AppState>,
    Path(cnic): Path<String>,
) -> Result<Json<Visitor>, AppError> {
    Ok(Json(state.directory.get(&cnic).await?))
}

async fn update_visitor(
    State(state): State<AppState>,
    Path(cnic): Path<String>,
    Json(update): Json<VisitorUpdate>,
) -> Result<Json<Visitor>, AppError> {
    Ok(Json(state.directory.update(&cnic, &update).await?))
}

async fn delete_visitor(
    State(state): State<AppState>,
    Path(cnic): Path<String>,
) -> Result<StatusCode, AppError> {
    state.directory.delete(&cnic).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("frontdesk ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    BadGateway(String),
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Rejected(_) | SessionError::InvalidSelection(_) => {
                AppError::BadRequest(err.to_string())
            }
            SessionError::Closed(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(_) => AppError::NotFound(err.to_string()),
            DirectoryError::Status { status, .. } if (400..500).contains(&status) => {
                AppError::BadRequest(err.to_string())
            }
            DirectoryError::Status { .. } | DirectoryError::Transport(_) | DirectoryError::Decode(_) => {
                tracing::warn!(error = %err, "Visitor directory request failed");
                AppError::BadGateway(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
