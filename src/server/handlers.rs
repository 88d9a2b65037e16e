// HTTP request handlers

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::AppState;

/// Body of `POST /generate`
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub requirements: Option<String>,
    /// Signed so that negative budgets reach validation instead of failing
    /// deserialization
    #[serde(default)]
    pub max_iterations: Option<i64>,
}

/// `{"error": "..."}` with a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Service description
pub async fn index() -> Json<Value> {
    Json(json!({
        "message": "AI Developer & Debugger System API",
        "endpoints": {
            "health": "GET /health",
            "generate": "POST /generate"
        }
    }))
}

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Start a development run and stream its progress as server-sent events.
///
/// The run is cancelled when the client goes away.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let request: GenerateRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?;

    let requirements = match request.requirements {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Err(ApiError::bad_request("No requirements provided")),
    };

    let requested = match request.max_iterations {
        Some(n) if n < 1 => {
            return Err(ApiError::bad_request("max_iterations must be at least 1"))
        }
        Some(n) => Some(u32::try_from(n).unwrap_or(u32::MAX)),
        None => None,
    };
    let max_iterations = state.config.effective_max_iterations(requested);

    tracing::info!(
        max_iterations,
        requirements_chars = requirements.len(),
        "Accepted generate request"
    );

    let cancel = CancellationToken::new();
    let events = state
        .runner
        .spawn(requirements, max_iterations, cancel.clone());

    // The guard lives inside the stream state; dropping the response
    // cancels the run.
    let stream = stream::unfold(
        (events, cancel.drop_guard()),
        |(mut events, guard)| async move {
            let event = events.recv().await?;
            let frame = match serde_json::to_string(&event) {
                Ok(json) => Event::default().data(json),
                Err(e) => {
                    tracing::error!("Failed to serialize progress event: {}", e);
                    Event::default().comment("serialization error")
                }
            };
            Some((Ok::<_, Infallible>(frame), (events, guard)))
        },
    );

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
