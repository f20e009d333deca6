//! Configuration parsing and validation for the gateway
//!
//! This module handles command-line and environment parsing using clap. It's read once at
//! startup and then turned into the library's `Backend`, `ModelMapping` and `ClientOptions`.
use anyhow::anyhow;
use chatbridge::backend::{Backend, DEFAULT_BACKEND_URL};
use chatbridge::client::ClientOptions;
use clap::{ArgAction, Parser};
use std::{path::PathBuf, time::Duration};
use url::Url;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The port on which the gateway will listen.
    #[arg(short = 'p', long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Base URL of the inference backend. Requests go to `{backend_url}/chat/completions`.
    #[arg(long, env = "NIM_API_BASE", default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: Url,

    /// Bearer key sent to the backend with every request.
    #[arg(long, env = "NIM_API_KEY", hide_env_values = true)]
    pub backend_key: Option<String>,

    /// JSON file mapping caller-facing model names to backend model names. Replaces the
    /// built-in mapping when given.
    #[arg(short = 'f', long, env = "MODEL_MAPPING_FILE")]
    pub models: Option<PathBuf>,

    /// Maximum number of chat completions in flight. Unbounded when unset.
    #[arg(long, env = "MAX_CONCURRENT_REQUESTS")]
    pub max_concurrent_requests: Option<usize>,

    /// Give up on a backend call after this many seconds. Unbounded when unset.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// The port on which the metrics server will listen.
    #[arg(long, default_value_t = 9090)]
    pub metrics_port: u16,

    /// Whether to enable the metrics endpoint.
    #[arg(short = 'm', long, default_value_t = true, action = ArgAction::Set)]
    pub metrics: bool,

    /// The prefix to use for metrics.
    #[arg(long, default_value = "chatbridge")]
    pub metrics_prefix: String,

    /// Maximum number of idle HTTP connections to keep alive to the backend.
    #[arg(long, default_value_t = 100)]
    pub pool_max_idle_per_host: usize,

    /// How long (in seconds) to keep idle HTTP connections alive.
    /// 90s balances connection reuse with avoiding stale connections.
    #[arg(long, default_value_t = 90)]
    pub pool_idle_timeout_secs: u64,
}

impl Config {
    pub fn validate(self) -> Result<Self, anyhow::Error> {
        if let Some(models) = &self.models
            && !models.exists()
        {
            return Err(anyhow!(
                "Model mapping file '{}' does not exist",
                models.display()
            ));
        }
        if self.max_concurrent_requests == Some(0) {
            return Err(anyhow!("--max-concurrent-requests must be at least 1"));
        }
        Ok(self)
    }

    pub fn backend(&self) -> Backend {
        Backend {
            url: self.backend_url.clone(),
            key: self.backend_key.clone(),
            timeout: self.request_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            pool_max_idle_per_host: self.pool_max_idle_per_host,
            pool_idle_timeout: Duration::from_secs(self.pool_idle_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec![
            "chatbridge",
            "--backend-url",
            "https://backend.example.com/v1",
            "--backend-key",
            "nvapi-test",
        ];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_backend_built_from_flags() {
        let config = parse(&["--request-timeout-secs", "30"]);
        let backend = config.backend();

        assert_eq!(
            backend.chat_completions_url(),
            "https://backend.example.com/v1/chat/completions"
        );
        assert_eq!(backend.key.as_deref(), Some("nvapi-test"));
        assert_eq!(backend.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_pool_options() {
        let options = parse(&["--pool-max-idle-per-host", "8", "--pool-idle-timeout-secs", "5"])
            .client_options();
        assert_eq!(options.pool_max_idle_per_host, 8);
        assert_eq!(options.pool_idle_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_metrics_can_be_disabled() {
        assert!(!parse(&["--metrics", "false"]).metrics);
    }

    #[test]
    fn test_invalid_backend_url_rejected() {
        let result = Config::try_parse_from(["chatbridge", "--backend-url", "not a url"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_missing_mapping_file() {
        let err = parse(&["--models", "/nonexistent/mapping.json"])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        assert!(
            parse(&["--max-concurrent-requests", "0"])
                .validate()
                .is_err()
        );
        assert!(
            parse(&["--max-concurrent-requests", "4"])
                .validate()
                .is_ok()
        );
    }
}
