//! Session lifecycle + streaming endpoints.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;

use collab_core::types::{MessageKind, SessionId};
use collab_sessions::CreateSessionRequest;

use crate::app::AppState;

#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

#[derive(Serialize)]
struct ApiError {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { error: message.into() }))
}

/// POST /api/sessions/create (alias /api/chat/sessions/create).
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, (StatusCode, Json<ApiError>)> {
    state
        .sessions
        .create_session(request)
        .await
        .map(|id| Json(CreateSessionResponse { session_id: id.to_string() }))
        .map_err(|error| error_response(StatusCode::BAD_REQUEST, error.to_string()))
}

#[derive(Deserialize)]
pub struct StreamQuery {
    pub message: String,
}

/// GET /api/chat/{sid}/stream?message=... — SSE event stream.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Path(sid): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<ApiError>)> {
    let session_id = SessionId::from(sid.clone());
    let live = state
        .sessions
        .get_session(&session_id)
        .await
        .map_err(|error| error_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "session not found"))?;

    let model_by_panelist: HashMap<String, String> = {
        let session = live.session.read().await;
        session
            .panelists
            .iter()
            .map(|p| (p.id.to_string(), p.model_id.clone()))
            .collect()
    };

    let cancel = tokio_util::sync::CancellationToken::new();
    let chunks = live
        .orchestrator
        .clone()
        .orchestrate(query.message, MessageKind::Mission, cancel);
    let memory = live.memory.clone();

    let connected = futures_util::stream::once(async move {
        Ok(Event::default()
            .event("connected")
            .data(json!({ "session_id": sid, "message": "connected" }).to_string()))
    });

    // `error` is reserved for failures the gateway itself raises around the
    // generator; a participant's own provider failure is a system-authored
    // message like any other and is delivered as a `response` + `model_complete`
    // pair, never as `error`.
    let body = chunks.flat_map(move |chunk| {
        let model = chunk
            .participant_id
            .as_ref()
            .and_then(|id| model_by_panelist.get(&id.to_string()))
            .cloned();

        let events: Vec<Result<Event, Infallible>> = if chunk.kind == MessageKind::System {
            let notice_model = model.unwrap_or_else(|| "system".to_string());
            vec![
                Ok(Event::default().event("response").data(
                    json!({
                        "model": notice_model,
                        "content": chunk.content,
                        "type": "system",
                        "complete": true,
                        "metadata": chunk.metadata,
                    })
                    .to_string(),
                )),
                Ok(Event::default().event("model_complete").data(
                    json!({ "model": "system", "timestamp": chrono::Utc::now().to_rfc3339() }).to_string(),
                )),
            ]
        } else if !chunk.complete {
            vec![Ok(Event::default().event("response").data(
                json!({
                    "model": model,
                    "content": chunk.content,
                    "type": "response",
                    "complete": false,
                    "synapse": chunk.anchor_message_id.as_ref().map(|anchor| json!({
                        "detected": true,
                        "building_on": anchor.to_string(),
                    })),
                    "metadata": chunk.metadata,
                })
                .to_string(),
            ))]
        } else {
            vec![Ok(Event::default().event("model_complete").data(
                json!({ "model": model, "timestamp": chrono::Utc::now().to_rfc3339() }).to_string(),
            ))]
        };

        futures_util::stream::iter(events)
    });

    let sid_for_final = session_id.to_string();
    let tail = futures_util::stream::once(async move {
        let stats = memory.stats().await;
        Ok(Event::default()
            .event("all_complete")
            .data(json!({ "session_id": sid_for_final, "stats": stats }).to_string()))
    });

    Ok(Sse::new(connected.chain(body).chain(tail)).keep_alive(KeepAlive::default()))
}

/// GET /api/chat/{sid}/status — active models, provider states, stats.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(sid): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ApiError>)> {
    let session_id = SessionId::from(sid);
    let live = state
        .sessions
        .get_session(&session_id)
        .await
        .map_err(|error| error_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "session not found"))?;

    let session = live.session.read().await;
    let stats = live.memory.stats().await;
    Ok(Json(json!({
        "session_id": session.id.to_string(),
        "active": session.active,
        "panelists": session.panelists,
        "stats": stats,
    })))
}

/// GET /api/chat/{sid}/synapse-events — synapses + collaboration events.
pub async fn synapse_events(
    State(state): State<Arc<AppState>>,
    Path(sid): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ApiError>)> {
    let session_id = SessionId::from(sid);
    let live = state
        .sessions
        .get_session(&session_id)
        .await
        .map_err(|error| error_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "session not found"))?;

    let snapshot = live.memory.snapshot().await;
    Ok(Json(json!({
        "synapses": snapshot.synapses,
        "events": snapshot.events,
    })))
}

/// GET /api/sessions/ — list sessions.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<collab_sessions::Session>> {
    Json(state.sessions.list_sessions().await)
}

/// GET /api/sessions/{sid} — detail (last 50 messages).
pub async fn session_detail(
    State(state): State<Arc<AppState>>,
    Path(sid): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ApiError>)> {
    let session_id = SessionId::from(sid);
    let live = state
        .sessions
        .get_session(&session_id)
        .await
        .map_err(|error| error_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "session not found"))?;

    let session = live.session.read().await.clone();
    let messages = live.memory.recent(50).await;
    Ok(Json(json!({ "session": session, "messages": messages })))
}

/// PUT /api/sessions/{sid}/end — end session.
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(sid): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let session_id = SessionId::from(sid);
    state
        .sessions
        .end_session(&session_id)
        .await
        .map_err(|error| error_response(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}
