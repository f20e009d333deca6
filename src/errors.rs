use crate::schemas::ErrorEnvelope;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::time::Duration;

/// A failed call to the backend.
///
/// `status` is the backend's own status when it answered, or a locally chosen one when it
/// didn't. `payload` is the backend's error body when there was one, otherwise a message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Backend request failed with status {status}: {payload}")]
pub struct UpstreamError {
    pub status: StatusCode,
    pub payload: Value,
}

impl UpstreamError {
    /// A failure on our side of the connection: nothing usable came back.
    pub fn local(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            payload: Value::String(message.into()),
        }
    }

    pub fn timed_out(after: Duration) -> Self {
        Self {
            status: StatusCode::GATEWAY_TIMEOUT,
            payload: Value::String(format!("Backend did not respond within {}s", after.as_secs())),
        }
    }

    /// Build from a non-2xx backend response, keeping its body if it has one.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let payload = match serde_json::from_slice::<Value>(body) {
            Ok(json) => json,
            Err(_) => match std::str::from_utf8(body).map(str::trim) {
                Ok(text) if !text.is_empty() => Value::String(text.to_owned()),
                _ => Value::String(format!(
                    "Request failed with status code {}",
                    status.as_u16()
                )),
            },
        };
        Self { status, payload }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Route {0} not found")]
    RouteNotFound(String),

    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    #[error("Too many concurrent requests")]
    Overloaded,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Upstream(e) => e.status,
            Self::RouteNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = match self {
            // Backend payloads are passed through verbatim
            Self::Upstream(e) => e.payload,
            other => Value::String(other.to_string()),
        };
        (status, Json(ErrorEnvelope { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_from_response_keeps_json_body() {
        let err = UpstreamError::from_response(
            StatusCode::TOO_MANY_REQUESTS,
            br#"{"error":"rate limited"}"#,
        );
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.payload, json!({"error": "rate limited"}));
    }

    #[test]
    fn test_from_response_keeps_text_body() {
        let err = UpstreamError::from_response(StatusCode::BAD_GATEWAY, b"upstream connect error\n");
        assert_eq!(err.payload, json!("upstream connect error"));
    }

    #[test]
    fn test_from_response_without_body() {
        let err = UpstreamError::from_response(StatusCode::UNAUTHORIZED, b"");
        assert_eq!(err.payload, json!("Request failed with status code 401"));
    }

    #[tokio::test]
    async fn test_upstream_payload_is_wrapped_not_reshaped() {
        let err = GatewayError::from(UpstreamError {
            status: StatusCode::TOO_MANY_REQUESTS,
            payload: json!({"error": "rate limited"}),
        });

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body_json(response).await,
            json!({"error": {"error": "rate limited"}})
        );
    }

    #[tokio::test]
    async fn test_route_not_found_names_path() {
        let response = GatewayError::RouteNotFound("/v1/unknown".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Route /v1/unknown not found"})
        );
    }

    #[tokio::test]
    async fn test_local_failure_is_500_with_message() {
        let response = GatewayError::from(UpstreamError::local("connection refused")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({"error": "connection refused"}));
    }
}
