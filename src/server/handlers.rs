use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::session::TurnOutcome;

use super::error::ApiError;
use super::page;
use super::session::{expired_session_cookie, session_cookie, session_id_from_headers};
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// 새 세션이면 쿠키를 붙여 응답
fn respond_with_session(id: uuid::Uuid, created: bool, body: Value) -> Response {
    with_session_cookie(id, created, Json(body))
}

fn with_session_cookie(id: uuid::Uuid, created: bool, response: impl IntoResponse) -> Response {
    if created {
        ([(header::SET_COOKIE, session_cookie(&id))], response).into_response()
    } else {
        response.into_response()
    }
}

pub async fn index_page(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(page::render(&state.ui))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let index = state.index.state().await;
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "index": index,
        "strategy": state.config.strategy,
        "hyde": state.config.hyde,
        "ui": state.ui,
        "sessions": state.sessions.len(),
    }))
}

pub async fn messages(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (id, session, created) = state.sessions.get_or_create(session_id_from_headers(&headers));
    let session = session.lock().await;

    respond_with_session(
        id,
        created,
        json!({
            "messages": session.messages(),
            "error": session.last_error(),
        }),
    )
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let engine = state.engine().await?;
    let (id, session, created) = state.sessions.get_or_create(session_id_from_headers(&headers));
    let mut session = session.lock().await;

    // 에러 응답에도 쿠키를 붙여 방금 만든 세션을 이어 쓰게 함
    let outcome = match session.handle_user_message(&engine, &request.message).await {
        Ok(outcome) => outcome,
        Err(e) => return Ok(with_session_cookie(id, created, ApiError::from(e))),
    };
    let (error, sources) = match outcome {
        TurnOutcome::Answered(response) => (None, response.sources),
        TurnOutcome::Failed(message) => (Some(message), vec![]),
        TurnOutcome::Idle => (None, vec![]),
    };

    Ok(respond_with_session(
        id,
        created,
        json!({
            "messages": session.messages(),
            "error": error,
            "sources": sources,
        }),
    ))
}

pub async fn reset(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (id, session, created) = state.sessions.get_or_create(session_id_from_headers(&headers));
    let mut session = session.lock().await;
    session.reset();

    respond_with_session(id, created, json!({ "messages": session.messages() }))
}

pub async fn end_session(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let deleted = session_id_from_headers(&headers)
        .map(|id| state.sessions.remove(&id))
        .unwrap_or(false);

    (
        [(header::SET_COOKIE, expired_session_cookie())],
        Json(json!({ "deleted": deleted })),
    )
        .into_response()
}
