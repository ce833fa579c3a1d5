//! HTTP endpoint handlers.
//!
//! Every response body is JSON. Failures from the chat pipeline are mapped
//! onto a status code and a fixed user-facing sentence; the underlying
//! description only goes to the log.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use toolchat::api::error::GenerationError;
use toolchat::chatbot::{ChatError, ChatStatus, ToolChatbot};
use tracing::warn;

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub chatbot: Arc<ToolChatbot>,
}

/// Form body for POST /chat.
#[derive(Debug, Deserialize)]
pub struct ChatForm {
    /// A missing field is treated like an empty one.
    #[serde(default)]
    pub message: String,
}

/// Success body for POST /chat.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Failure body for every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A failed request: status, user-facing text and an optional retry hint.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
    retry_after: Option<Duration>,
}

impl ApiError {
    fn new(status: StatusCode, message: &'static str) -> Self {
        Self {
            status,
            message,
            retry_after: None,
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage => Self::new(StatusCode::BAD_REQUEST, "Empty message"),
            ChatError::Throttled(throttled) => Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: "Too many requests. Please try again later.",
                retry_after: Some(throttled.retry_after),
            },
            ChatError::Generation(GenerationError::QuotaExceeded(_)) => Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                "API quota exceeded. Please try again later.",
            ),
            ChatError::Generation(GenerationError::ModelUnavailable(_)) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Model unavailable. Contact support.",
            ),
            ChatError::Generation(GenerationError::Timeout(_)) => Self::new(
                StatusCode::GATEWAY_TIMEOUT,
                "The model took too long to respond. Please try again.",
            ),
            ChatError::Generation(GenerationError::Internal(_)) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message.to_string(),
        });
        let mut response = (self.status, body).into_response();
        if let Some(retry_after) = self.retry_after {
            // Whole seconds, rounded up so a client never retries early.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// POST /chat: answer one form-encoded `message`.
///
/// Returns 200 with `{"response": ...}`, or an [`ApiError`]: 400 for an
/// empty or unparseable body, 429 for quota or throttling, 503 when the
/// model is unavailable, 504 on timeout and 500 otherwise.
pub async fn post_chat(
    State(app): State<AppState>,
    form: Result<Form<ChatForm>, FormRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Form(form) = form.map_err(|rejection| {
        warn!("Rejected chat request body: {rejection}");
        ApiError::new(StatusCode::BAD_REQUEST, "Invalid request body")
    })?;

    let response = app.chatbot.answer(&form.message).await?;
    Ok(Json(ChatResponse { response }))
}

/// GET /api/status: catalog and rate-window snapshot.
pub async fn get_status(State(app): State<AppState>) -> Json<ChatStatus> {
    Json(app.chatbot.status().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolchat::api::rate_limit::Throttled;

    #[test]
    fn chat_form_defaults_missing_message() {
        let form: ChatForm = serde_json::from_str("{}").unwrap();
        assert_eq!(form.message, "");
    }

    #[test]
    fn generation_errors_map_to_statuses() {
        let cases = [
            (GenerationError::QuotaExceeded("q".into()), 429),
            (GenerationError::ModelUnavailable("m".into()), 503),
            (GenerationError::Timeout("t".into()), 504),
            (GenerationError::Internal("i".into()), 500),
        ];
        for (err, status) in cases {
            let api: ApiError = ChatError::Generation(err).into();
            assert_eq!(api.status.as_u16(), status);
            assert!(api.retry_after.is_none());
        }
    }

    #[test]
    fn retry_after_rounds_up() {
        let api: ApiError = ChatError::Throttled(Throttled {
            retry_after: Duration::from_millis(12_300),
        })
        .into();
        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "13");
    }
}
