//! Chatbridge - an OpenAI-compatible chat completions gateway
//!
//! This library accepts requests shaped like the OpenAI chat completions API, resolves the
//! requested model through a static mapping, forwards a reshaped request to a single
//! OpenAI-style inference backend, and reshapes the backend's answer for the caller.

use axum::Router;
use axum::routing::{get, post};
use axum_prometheus::{
    GenericMetricLayer, Handle, PrometheusMetricLayerBuilder,
    metrics_exporter_prometheus::PrometheusHandle,
};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument};

pub mod backend;
pub mod client;
pub mod errors;
pub mod handlers;
pub mod mapping;
pub mod models;
pub mod schemas;
pub mod translate;

use backend::Backend;
use client::{ClientOptions, HttpClient, HyperClient};
use mapping::ModelMapping;

/// The canonical chat completions route.
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Routes handled exactly like [`CHAT_COMPLETIONS_PATH`]: the legacy completions route, the
/// Anthropic-style messages route, and the legacy chat route. Bodies are not reshaped.
pub const CHAT_COMPLETIONS_ALIASES: [&str; 3] = ["/v1/completions", "/v1/messages", "/v1/chat"];

/// The main application state: the HTTP client, the backend it talks to and the model mapping.
/// Nothing in here is written to while serving requests.
#[derive(Clone, Debug)]
pub struct AppState<T: HttpClient> {
    pub http_client: T,
    pub backend: Backend,
    pub models: Arc<ModelMapping>,
    /// Caps the number of chat completions in flight, when set
    pub limiter: Option<Arc<Semaphore>>,
}

impl AppState<HyperClient> {
    /// Create a new AppState with the default Hyper client
    pub fn new(backend: Backend, models: ModelMapping, options: ClientOptions) -> Self {
        let http_client = client::create_hyper_client(options);
        Self::with_client(backend, models, http_client)
    }
}

impl<T: HttpClient> AppState<T> {
    /// Create a new AppState with a custom HTTP client (useful for testing)
    pub fn with_client(backend: Backend, models: ModelMapping, http_client: T) -> Self {
        Self {
            http_client,
            backend,
            models: Arc::new(models),
            limiter: None,
        }
    }

    /// Reject chat completions with 503 while `limit` of them are already in flight.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.limiter = Some(Arc::new(Semaphore::new(limit)));
        self
    }
}

/// Build the main router for the gateway
/// This creates routes for:
/// - `/` and `/health` - Static status payloads
/// - `/v1/models` - Lists the mapped models
/// - `/v1/chat/completions` and its aliases - Forwards to the backend
///
/// Everything else, including a known path with the wrong method, is a 404.
#[instrument(skip(state))]
pub fn build_router<T: HttpClient + Clone + Send + Sync + 'static>(state: AppState<T>) -> Router {
    info!("Building router");
    let mut router = Router::new()
        .route("/", get(handlers::root).fallback(handlers::not_found))
        .route("/health", get(handlers::health).fallback(handlers::not_found))
        .route(
            "/v1/models",
            get(handlers::models::<T>).fallback(handlers::not_found),
        )
        .route(
            CHAT_COMPLETIONS_PATH,
            post(handlers::chat_completions::<T>).fallback(handlers::not_found),
        );

    for alias in CHAT_COMPLETIONS_ALIASES {
        router = router.route(
            alias,
            post(handlers::chat_completions::<T>).fallback(handlers::not_found),
        );
    }

    router
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Builds a router for the metrics endpoint.
#[instrument(skip(handle))]
pub fn build_metrics_router(handle: PrometheusHandle) -> Router {
    info!("Building metrics router");
    Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    )
}

type MetricsLayerAndHandle = (
    GenericMetricLayer<'static, PrometheusHandle, Handle>,
    PrometheusHandle,
);

/// Builds a layer and handle for prometheus metrics collection.
///
/// The recorder is process-global, so this can only be called once per process.
pub fn build_metrics_layer_and_handle(
    prefix: impl Into<Cow<'static, str>>,
) -> MetricsLayerAndHandle {
    info!("Building metrics layer");
    PrometheusMetricLayerBuilder::new()
        .with_prefix(prefix)
        .enable_response_body_size(true)
        .with_endpoint_label_type(axum_prometheus::EndpointLabel::Exact)
        .with_default_metrics()
        .build_pair()
}
