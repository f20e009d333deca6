/// Axum handlers for the gateway
use crate::client::HttpClient;
use crate::errors::GatewayError;
use crate::models::ListModelResponse;
use crate::schemas::{ChatRequest, ChatResponse};
use crate::translate::{to_backend_request, to_chat_response};
use crate::{AppState, CHAT_COMPLETIONS_PATH};
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::Uri,
    response::IntoResponse,
};
use serde_json::json;
use tracing::{error, info, instrument, warn};

/// Liveness probe at `/`
pub async fn root() -> impl IntoResponse {
    Json(json!({ "status": "ok", "message": "NIM Proxy Running" }))
}

/// Health probe at `/health`
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "OpenAI → NIM Proxy" }))
}

#[instrument(skip(state))]
pub async fn models<T>(State(state): State<AppState<T>>) -> impl IntoResponse
where
    T: HttpClient + Clone + Send + Sync + 'static,
{
    Json(ListModelResponse::from_mapping(&state.models))
}

/// The canonical chat completions handler. The alias routes are registered against this same
/// function, so a request on any of them is handled exactly like one on `/v1/chat/completions`.
///
/// The body is decoded by hand rather than with the `Json` extractor so that malformed requests
/// get the same `{"error": ...}` shape as every other failure.
#[instrument(skip(state, body), fields(path = %uri.path()))]
pub async fn chat_completions<T>(
    State(state): State<AppState<T>>,
    uri: Uri,
    body: Bytes,
) -> Result<Json<ChatResponse>, GatewayError>
where
    T: HttpClient + Clone + Send + Sync + 'static,
{
    // Held until the response is built
    let _permit = match &state.limiter {
        Some(limiter) => match limiter.clone().try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                warn!("Concurrency limit reached, rejecting request");
                return Err(GatewayError::Overloaded);
            }
        },
        None => None,
    };

    if uri.path() != CHAT_COMPLETIONS_PATH {
        info!("Redirecting {} → {}", uri.path(), CHAT_COMPLETIONS_PATH);
    }

    let request: ChatRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!("Rejecting malformed chat request: {}", e);
        GatewayError::InvalidRequest(e.to_string())
    })?;

    let requested_model = request.model.clone();
    let backend_request = to_backend_request(request, &state.models);
    info!(
        model = %requested_model,
        backend_model = %backend_request.model,
        messages = backend_request.messages.len(),
        "Forwarding chat completion"
    );

    let response = state
        .backend
        .send(&state.http_client, &backend_request)
        .await
        .inspect_err(|e| error!(status = %e.status, payload = %e.payload, "Proxy error"))?;

    Ok(Json(to_chat_response(response, &requested_model)))
}

/// Catch-all for unknown paths, and for known paths hit with the wrong method.
pub async fn not_found(uri: Uri) -> GatewayError {
    warn!("Unknown route: {}", uri.path());
    GatewayError::RouteNotFound(uri.path().to_owned())
}
