//! HTTP client abstraction for calling the inference backend
//!
//! The backend is reached through the [`HttpClient`] trait so the pooled hyper client used in
//! production can be swapped for a recording mock in tests.
use async_trait::async_trait;
use axum::response::IntoResponse;
use hyper_util::{client::legacy::Client, rt::TokioExecutor};
use std::time::Duration;
use tracing::debug;

pub type HyperClient = Client<
    hyper_tls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>,
    axum::body::Body,
>;

#[async_trait]
pub trait HttpClient: std::fmt::Debug {
    async fn request(
        &self,
        req: axum::extract::Request,
    ) -> Result<axum::response::Response, Box<dyn std::error::Error + Send + Sync>>;
}

#[async_trait]
impl HttpClient for HyperClient {
    async fn request(
        &self,
        req: axum::extract::Request,
    ) -> Result<axum::response::Response, Box<dyn std::error::Error + Send + Sync>> {
        self.request(req)
            .await
            .map(|res| res.into_response())
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }
}

/// Connection pool settings for the backend client.
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    /// Maximum number of idle connections kept alive to the backend.
    pub pool_max_idle_per_host: usize,
    /// How long an idle connection is kept before being closed.
    pub pool_idle_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: 100,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

pub fn create_hyper_client(options: ClientOptions) -> HyperClient {
    let https = hyper_tls::HttpsConnector::new();

    debug!(
        "HTTP client pool config: idle_timeout={}s, max_idle_per_host={}",
        options.pool_idle_timeout.as_secs(),
        options.pool_max_idle_per_host
    );

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(options.pool_idle_timeout)
        .pool_max_idle_per_host(options.pool_max_idle_per_host)
        .pool_timer(hyper_util::rt::TokioTimer::new())
        .build(https)
}
