//! Defines helpers for configuring logging and metrics for prover processes

pub use tracing_subscriber::{filter::LevelFilter, fmt::format::Format};
use thiserror::Error;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::err_str;

pub mod metrics;

/// Possible errors that occur when setting up telemetry
#[derive(Debug, Error)]
pub enum TelemetrySetupError {
    /// Error emitted when setting up the statsd metrics recorder
    #[error("error building statsd recorder: {0}")]
    Metrics(String),
    /// Error emitted when a global subscriber or recorder is already installed
    #[error("telemetry already installed: {0}")]
    AlreadyInstalled(String),
}

/// Initialize a pretty printed logger at the given log level
pub fn setup_system_logger(level: LevelFilter) -> Result<(), TelemetrySetupError> {
    tracing_subscriber::fmt()
        .event_format(Format::default().pretty())
        .with_max_level(level)
        .try_init()
        .map_err(err_str!(TelemetrySetupError::AlreadyInstalled))
}

/// A builder for configuring telemetry for a prover process
#[derive(Default)]
pub struct TelemetryBuilder {
    /// The subscriber layers to add to the telemetry stack
    layers: Vec<Box<dyn Layer<Registry> + Send + Sync + 'static>>,
}

impl TelemetryBuilder {
    /// Add a subscriber layer to the telemetry builder
    fn with_layer<L: Layer<Registry> + Send + Sync>(mut self, layer: L) -> Self {
        self.layers.push(layer.boxed());
        self
    }

    /// Configure logging, either as structured JSON lines or pretty printed
    pub fn with_logging(self, json: bool) -> Self {
        if json {
            self.with_layer(fmt::layer().json().flatten_event(true))
        } else {
            self.with_layer(fmt::layer().pretty())
        }
    }

    /// Configure StatsD metrics
    pub fn with_metrics(
        self,
        statsd_host: &str,
        statsd_port: u16,
    ) -> Result<Self, TelemetrySetupError> {
        metrics::configure_metrics_statsd_recorder(statsd_host, statsd_port)?;
        Ok(self.with_layer(metrics_tracing_context::MetricsLayer::new()))
    }

    /// Initialize the global subscriber with the configured telemetry layers
    pub fn build(self) -> Result<(), TelemetrySetupError> {
        let layers = self.layers.with_filter(
            EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy(),
        );
        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .map_err(err_str!(TelemetrySetupError::AlreadyInstalled))
    }
}

/// Configures logging and, if enabled, statsd metrics for a prover process
pub fn configure_telemetry(
    json_logs: bool,
    metrics_enabled: bool,
    statsd_host: &str,
    statsd_port: u16,
) -> Result<(), TelemetrySetupError> {
    let mut telemetry = TelemetryBuilder::default().with_logging(json_logs);
    if metrics_enabled {
        telemetry = telemetry.with_metrics(statsd_host, statsd_port)?;
    }

    telemetry.build()
}

#[cfg(test)]
mod test {
    use super::{
        LevelFilter, TelemetryBuilder, TelemetrySetupError, configure_telemetry,
        setup_system_logger,
    };

    /// Tests that telemetry installs once and that every later attempt to
    /// replace the global subscriber or recorder is refused
    ///
    /// The subscriber and recorder are process globals, so this is one test
    #[test]
    fn test_configure_telemetry_once() {
        configure_telemetry(true /* json_logs */, true /* metrics */, "127.0.0.1", 8125)
            .unwrap();
        tracing::info!(answer = 42, "telemetry installed");

        let res = TelemetryBuilder::default().with_logging(false).build();
        assert!(matches!(res, Err(TelemetrySetupError::AlreadyInstalled(_))));

        let res = TelemetryBuilder::default().with_metrics("127.0.0.1", 8125);
        assert!(matches!(res, Err(TelemetrySetupError::AlreadyInstalled(_))));

        let res = setup_system_logger(LevelFilter::DEBUG);
        assert!(matches!(res, Err(TelemetrySetupError::AlreadyInstalled(_))));
    }
}
