//! HTTP request handlers.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};

use super::server::AppState;
use super::stream::{sse_body, PseudoStream};
use super::types::{zero_usage, ChatCompletionRequest, ChatCompletionResponse, ModelList};
use crate::error::Error;

/// Correlation id used for every object emitted for one chat request.
fn new_request_id() -> String {
    format!("req-{}", uuid::Uuid::new_v4())
}

/// Handle POST /v1/chat/completions
///
/// The body is parsed by hand so malformed JSON surfaces as an
/// `internal_error` rather than an extractor rejection.
pub async fn chat_completions(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = new_request_id();

    match execute_request(&state, &request_id, &body).await {
        Ok(response) => response,
        Err(e) => {
            let (status, code) = e.status_and_code();
            tracing::error!(
                request_id = %request_id,
                status = status.as_u16(),
                code = code,
                error = %e,
                "Chat completion failed"
            );
            e.into_response()
        }
    }
}

async fn execute_request(
    state: &AppState,
    request_id: &str,
    body: &[u8],
) -> Result<Response, Error> {
    let request: ChatCompletionRequest = serde_json::from_slice(body)?;
    let is_streaming = request.is_streaming();

    tracing::info!(
        request_id = %request_id,
        model = ?request.model,
        stream = is_streaming,
        messages = request.messages.len(),
        "Received chat completion request"
    );

    let result = state.upstream.complete(&request).await?;
    let content = result.display_content();

    if is_streaming {
        let frames = PseudoStream::new(
            request_id,
            request.model,
            content,
            state.config.streaming.chunk_size,
        );
        let body = Body::from_stream(sse_body(frames, state.pacer.clone()));

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::CONNECTION, "keep-alive")
            .body(body)
            .map_err(|e| Error::Internal(e.to_string()))
    } else {
        let usage = result.usage.unwrap_or_else(zero_usage);
        let response =
            ChatCompletionResponse::new(request_id, request.model.as_deref(), content, usage);
        Ok(Json(response).into_response())
    }
}

/// Handle /v1/models - list configured model identifiers
pub async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    Json(ModelList::from_ids(&state.config.models))
}

/// Fallback for unknown paths and unsupported methods.
pub async fn not_found(uri: Uri) -> Error {
    Error::NotFound {
        path: uri.path().to_string(),
    }
}
