//! Telemetry setup for the entropy relayer.
//!
//! This module centralizes configuration and initialization of observability:
//!
//! * Reading the metrics exporter settings from environment variables into
//!   [`ServiceConfig`] and [`MetricsConfig`].
//! * Setting up a `tracing-subscriber` registry with human-readable formatting
//!   and an environment-based filter.
//! * Installing the Prometheus exporter if configured.
//!
//! Call [`initialize_tracing`] once at startup to configure tracing and metrics.

use std::net::SocketAddr;

use eyre::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Configuration for telemetry (tracing + metrics) of the service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Metrics
    pub metrics: Option<MetricsConfig>,
}

impl ServiceConfig {
    /// Build a [`ServiceConfig`] from environment variables.
    ///
    /// See [`MetricsConfig::try_from_env`] for the variables.
    pub fn try_from_env() -> eyre::Result<Self> {
        Ok(Self {
            metrics: MetricsConfig::try_from_env()?,
        })
    }
}

/// Metrics exporter configuration.
#[derive(Debug, Clone)]
pub enum MetricsConfig {
    /// Prometheus scrape endpoint (the service exposes metrics over HTTP).
    Prometheus(PrometheusMetricsConfig),
}

impl MetricsConfig {
    /// Build a [`MetricsConfig`] from environment variables.
    ///
    /// Reads `METRICS_EXPORTER` to decide the backend. Without it no exporter is
    /// installed and all metrics are no-ops.
    pub fn try_from_env() -> eyre::Result<Option<Self>> {
        match std::env::var("METRICS_EXPORTER") {
            Ok(choice) => match choice.trim().to_lowercase().as_str() {
                "prometheus" => Ok(Some(Self::Prometheus(
                    PrometheusMetricsConfig::try_from_env().context(
                        "during constructing Prometheus metrics exporter from environment",
                    )?,
                ))),
                _ => eyre::bail!(
                    "environment: METRICS_EXPORTER must be \"prometheus\", not \"{}\"",
                    choice
                ),
            },
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => {
                eyre::bail!("Failed to read METRICS_EXPORTER from environment: {}", e);
            }
        }
    }
}

/// Prometheus scrape configuration.
#[derive(Debug, Clone)]
pub struct PrometheusMetricsConfig {
    pub(crate) bind_addr: Option<SocketAddr>,
}

impl PrometheusMetricsConfig {
    /// Build a [`PrometheusMetricsConfig`] from environment variable
    /// `METRICS_PROMETHEUS_BIND_ADDR` (optional).
    pub fn try_from_env() -> eyre::Result<Self> {
        match std::env::var("METRICS_PROMETHEUS_BIND_ADDR") {
            Ok(bind_addr) => Ok(Self {
                bind_addr: Some(
                    bind_addr
                        .parse()
                        .context("during reading METRICS_PROMETHEUS_BIND_ADDR from environment")?,
                ),
            }),
            Err(std::env::VarError::NotPresent) => Ok(Self { bind_addr: None }),
            Err(e) => {
                eyre::bail!(
                    "Failed to read METRICS_PROMETHEUS_BIND_ADDR from environment: {}",
                    e
                );
            }
        }
    }
}

/// Initialize metrics exporter according to [`MetricsConfig`].
pub fn initialize_metrics(config: &MetricsConfig) -> eyre::Result<()> {
    match config {
        MetricsConfig::Prometheus(prometheus_conf) => {
            tracing::debug!("Setting up Prometheus scrape metrics exporter ..");
            let builder = if let Some(bind_addr) = prometheus_conf.bind_addr {
                metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(bind_addr)
            } else {
                metrics_exporter_prometheus::PrometheusBuilder::new()
            };
            builder
                .install()
                .context("during installing Prometheus scrape metrics exporter as global recorder")?;
        }
    }
    Ok(())
}

/// Initializes structured logging for the service.
///
/// Installs a `tracing-subscriber` registry with an `EnvFilter` read from
/// `RUST_LOG` and calls [`initialize_metrics`] if the configuration carries
/// metrics settings.
///
/// This is intended as a one-time setup call during service startup.
pub fn initialize_tracing(config: &ServiceConfig) -> eyre::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_line_number(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "entropy_relayer=debug,warn".into()),
        )
        .try_init()
        .context("while installing tracing subscriber")?;

    if let Some(metrics_conf) = &config.metrics {
        initialize_metrics(metrics_conf)?;
    }
    Ok(())
}
