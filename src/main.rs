mod config;

use chatbridge::{
    AppState, build_metrics_layer_and_handle, build_metrics_router, build_router,
    mapping::ModelMapping,
};
use clap::Parser as _;
use config::Config;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

#[tokio::main]
#[instrument]
pub async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse().validate()?;
    let backend = config.backend();
    info!("Starting gateway on port {} for backend {:?}", config.port, backend);

    if backend.key.is_none() {
        warn!("No backend key configured, the backend will likely reject requests");
    }

    let models = match &config.models {
        Some(path) => ModelMapping::from_file(path).await?,
        None => ModelMapping::default(),
    };
    info!("Serving {} mapped models", models.len());

    let mut app_state = AppState::new(backend, models, config.client_options());
    if let Some(limit) = config.max_concurrent_requests {
        info!("Limiting chat completions to {} in flight", limit);
        app_state = app_state.with_concurrency_limit(limit);
    }

    let mut router = build_router(app_state);

    if config.metrics {
        let (prometheus_layer, handle) = build_metrics_layer_and_handle(config.metrics_prefix);
        router = router.layer(prometheus_layer);

        let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
        let metrics_listener = TcpListener::bind(&metrics_addr).await?;
        info!("Metrics listening on {}", metrics_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(metrics_listener, build_metrics_router(handle)).await {
                warn!("Metrics server stopped: {}", e);
            }
        });
    }

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Gateway listening on {}", bind_addr);

    axum::serve(listener, router).await?;

    Ok(())
}
