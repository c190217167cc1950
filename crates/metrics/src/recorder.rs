//! Metrics recorder initialization.

use {crate::Result, tracing::info};

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Whether metrics collection is enabled
    pub enabled: bool,
    /// Address of the Prometheus scrape listener
    pub listen: String,
}

/// Install the global metrics recorder.
///
/// Call once at startup. Without the `prometheus` feature, or when disabled,
/// the facade stays on its no-op recorder and every `counter!` is discarded.
///
/// # Errors
///
/// Returns an error if the listen address is invalid or the exporter cannot
/// be installed.
pub fn init_metrics(config: &MetricsRecorderConfig) -> Result<()> {
    if !config.enabled {
        info!("metrics collection is disabled");
        return Ok(());
    }

    #[cfg(feature = "prometheus")]
    {
        let addr: std::net::SocketAddr =
            config
                .listen
                .parse()
                .map_err(|e: std::net::AddrParseError| crate::Error::InvalidListen {
                    address: config.listen.clone(),
                    source: Box::new(e),
                })?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(listen = %addr, "prometheus exporter listening");
    }

    #[cfg(not(feature = "prometheus"))]
    info!(
        listen = %config.listen,
        "metrics enabled in config but the prometheus feature was not compiled in"
    );

    Ok(())
}
