/// The backend is the single inference service every chat completion is forwarded to. It's an
/// OpenAI-style API: requests go to `{url}/chat/completions` with the key in an
/// `Authorization: Bearer {}` header.
///
/// Each call is a single attempt. There's no retry; a failure is reported straight back.
use crate::client::HttpClient;
use crate::errors::UpstreamError;
use crate::schemas::{BackendRequest, BackendResponse};
use axum::body::Body;
use axum::http::{Method, Request, Uri};
use bon::Builder;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, error, instrument};
use url::Url;

pub const DEFAULT_BACKEND_URL: &str = "https://integrate.api.nvidia.com/v1";

const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

#[derive(Clone, Builder)]
pub struct Backend {
    /// Base URL of the backend API, e.g. `https://integrate.api.nvidia.com/v1`
    pub url: Url,
    /// Bearer key sent with every request
    pub key: Option<String>,
    /// Deadline for a single backend call. Unbounded when unset.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("url", &self.url.as_str())
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Backend {
    pub fn chat_completions_url(&self) -> String {
        format!(
            "{}/{}",
            self.url.as_str().trim_end_matches('/'),
            CHAT_COMPLETIONS_PATH
        )
    }

    /// Send `request` to the backend and decode its completion.
    #[instrument(skip_all, fields(model = %request.model))]
    pub async fn send<T>(
        &self,
        http_client: &T,
        request: &BackendRequest,
    ) -> Result<BackendResponse, UpstreamError>
    where
        T: HttpClient + Sync,
    {
        let body = serde_json::to_vec(request)
            .map_err(|e| UpstreamError::local(format!("Failed to encode request: {e}")))?;

        let upstream_url = self.chat_completions_url();
        let uri = Uri::try_from(&upstream_url).map_err(|_| {
            error!("Invalid URI: {}", upstream_url);
            UpstreamError::local(format!("Invalid backend URL: {upstream_url}"))
        })?;

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(key) = &self.key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {key}"));
        } else {
            debug!("No key configured for backend {}", self.url);
        }
        let req = builder
            .body(Body::from(body))
            .map_err(|e| UpstreamError::local(format!("Failed to build request: {e}")))?;

        debug!("Sending to backend: {}", upstream_url);
        let call = http_client.request(req);
        let result = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| UpstreamError::timed_out(timeout))?,
            None => call.await,
        };
        let response = result.map_err(|e| {
            error!("Error forwarding request to {}: {}", upstream_url, e);
            UpstreamError::local(e.to_string())
        })?;

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| UpstreamError::local(format!("Failed to read backend response: {e}")))?;

        if !status.is_success() {
            return Err(UpstreamError::from_response(status, &bytes));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| UpstreamError::local(format!("Invalid response from backend: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::ChatMessage;
    use crate::test_utils::MockHttpClient;
    use axum::http::StatusCode;
    use serde_json::json;

    fn backend(url: &str) -> Backend {
        Backend::builder()
            .url(url.parse().unwrap())
            .key("nvapi-test".to_string())
            .build()
    }

    fn backend_request() -> BackendRequest {
        BackendRequest {
            model: "deepseek-ai/deepseek-r1-0528".into(),
            messages: vec![ChatMessage::new("user", "Hello")],
            temperature: 0.7,
            max_tokens: serde_json::Number::from(2048),
            stream: false,
        }
    }

    #[test]
    fn test_chat_completions_url_with_and_without_trailing_slash() {
        assert_eq!(
            backend("https://integrate.api.nvidia.com/v1").chat_completions_url(),
            "https://integrate.api.nvidia.com/v1/chat/completions"
        );
        assert_eq!(
            backend("https://integrate.api.nvidia.com/v1/").chat_completions_url(),
            "https://integrate.api.nvidia.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", backend(DEFAULT_BACKEND_URL));
        assert!(!rendered.contains("nvapi-test"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_send_posts_json_with_bearer_key() {
        let client = MockHttpClient::new(
            StatusCode::OK,
            r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi"}, "finish_reason": "stop"}]}"#,
        );

        let response = backend(DEFAULT_BACKEND_URL)
            .send(&client, &backend_request())
            .await
            .unwrap();
        assert_eq!(response.choices.len(), 1);

        let requests = client.get_requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, "POST");
        assert_eq!(
            request.uri,
            "https://integrate.api.nvidia.com/v1/chat/completions"
        );
        assert_eq!(request.header("authorization"), Some("Bearer nvapi-test"));
        assert_eq!(request.header("content-type"), Some("application/json"));

        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["model"], "deepseek-ai/deepseek-r1-0528");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"], json!([{"role": "user", "content": "Hello"}]));
    }

    #[tokio::test]
    async fn test_send_without_key_omits_authorization() {
        let client = MockHttpClient::new(StatusCode::OK, r#"{"choices": []}"#);
        let backend = Backend::builder()
            .url(DEFAULT_BACKEND_URL.parse().unwrap())
            .build();

        backend.send(&client, &backend_request()).await.unwrap();

        let requests = client.get_requests();
        assert_eq!(requests[0].header("authorization"), None);
    }

    #[tokio::test]
    async fn test_send_reports_backend_status_and_body() {
        let client = MockHttpClient::new(StatusCode::TOO_MANY_REQUESTS, r#"{"error":"rate limited"}"#);

        let err = backend(DEFAULT_BACKEND_URL)
            .send(&client, &backend_request())
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.payload, json!({"error": "rate limited"}));
        // No retry
        assert_eq!(client.get_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_send_transport_failure_is_500() {
        let client = MockHttpClient::failing("connection refused");

        let err = backend(DEFAULT_BACKEND_URL)
            .send(&client, &backend_request())
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.payload, json!("connection refused"));
    }

    #[tokio::test]
    async fn test_send_rejects_malformed_success_body() {
        let client = MockHttpClient::new(StatusCode::OK, r#"{"object": "chat.completion"}"#);

        let err = backend(DEFAULT_BACKEND_URL)
            .send(&client, &backend_request())
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            err.payload
                .as_str()
                .unwrap()
                .starts_with("Invalid response from backend")
        );
    }

    #[tokio::test]
    async fn test_send_times_out() {
        let client = MockHttpClient::new(StatusCode::OK, r#"{"choices": []}"#)
            .with_delay(Duration::from_millis(200));
        let backend = Backend::builder()
            .url(DEFAULT_BACKEND_URL.parse().unwrap())
            .timeout(Duration::from_millis(20))
            .build();

        let err = backend.send(&client, &backend_request()).await.unwrap_err();
        assert_eq!(err.status, StatusCode::GATEWAY_TIMEOUT);
    }
}
