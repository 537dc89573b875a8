use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use shared::{
    gemini::{build_contents, has_user_content},
    models::{ChatErrorResponse, ChatReply, ChatRequest},
};
use tracing::{debug, info, instrument, warn};

use crate::app_state::AppState;

pub const MISSING_API_KEY: &str = "Missing GEMINI_API_KEY. Set it in your .env.local file.";
pub const INVALID_JSON: &str = "Request body must be JSON.";
pub const NO_USER_MESSAGE: &str = "No user message provided.";
pub const UPSTREAM_FAILED: &str = "Gemini API request failed.";

fn respond(status: StatusCode, body: impl IntoResponse) -> Response {
    metrics::counter!("chat_requests_total", "status" => status.as_u16().to_string()).increment(1);
    (status, body).into_response()
}

fn reject(status: StatusCode, error: &str) -> Response {
    respond(status, Json(ChatErrorResponse::new(error)))
}

// Handler for one chat turn: forwards the history to Gemini and returns the reply
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatReply),
        (status = 400, description = "Body is not JSON or has no user message", body = ChatErrorResponse),
        (status = 429, description = "Gemini quota exceeded", body = ChatErrorResponse),
        (status = 500, description = "Gemini API key missing", body = ChatErrorResponse),
        (status = 502, description = "No Gemini model could answer", body = ChatErrorResponse)
    ),
    tag = "Chat"
)]
#[instrument(skip_all, fields(body_bytes = body.len()))]
pub async fn chat(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let Some(selector) = state.selector.as_deref() else {
        warn!("chat request rejected: no Gemini API key configured");
        return reject(StatusCode::INTERNAL_SERVER_ERROR, MISSING_API_KEY);
    };

    let request = match ChatRequest::from_json_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            debug!(error = %err, "chat request body is not JSON");
            return reject(StatusCode::BAD_REQUEST, INVALID_JSON);
        }
    };

    let contents = build_contents(&request.messages);
    if !has_user_content(&contents) {
        return reject(StatusCode::BAD_REQUEST, NO_USER_MESSAGE);
    }

    match selector.choose_working_model(&contents).await {
        Ok(selection) => {
            info!(
                version = %selection.version,
                model = %selection.model,
                source = selection.source.as_str(),
                "chat reply generated"
            );
            respond(StatusCode::OK, Json(ChatReply { reply: selection.reply }))
        }
        Err(err) => {
            warn!(error = %err, "chat request failed upstream");
            let mut body = ChatErrorResponse::new(UPSTREAM_FAILED).with_details(err.to_string());
            if state.config.expose_diagnostics() {
                match serde_json::to_value(err.diagnostics()) {
                    Ok(debug) => body = body.with_debug(debug),
                    Err(serialize_err) => {
                        warn!(error = %serialize_err, "failed to serialize selection diagnostics");
                    }
                }
            }
            respond(err.status(), Json(body))
        }
    }
}
