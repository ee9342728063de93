//! Observability wiring for the control plane.
//!
//! # Purpose
//! Installs the `tracing` subscriber: an `EnvFilter` (default `info`, overridable
//! through `RUST_LOG`) and a fmt layer writing to stderr so JSON results on stdout
//! stay machine-readable. Also installs the Prometheus recorder that backs the
//! `metrics::counter!` calls in the saga runner.
//!
//! # Notes
//! Initialization is guarded by `OnceLock` to keep startup idempotent in tests.
//! There is no scrape endpoint; callers render the handle themselves.
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static OBS_INIT: OnceLock<()> = OnceLock::new();

pub fn init_observability() -> PrometheusHandle {
    OBS_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
    });
    install_metrics_recorder()
}

fn install_metrics_recorder() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("metrics recorder already installed");
            }
            handle
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_observability_is_idempotent() {
        let handle1 = init_observability();
        let handle2 = init_observability();
        tracing::info!("observability initialized");
        let _ = (handle1.render(), handle2.render());
    }

    #[test]
    fn saga_counters_reach_the_recorder() {
        let handle = init_observability();
        metrics::counter!("courier_saga_total", "saga" => "observability_test", "outcome" => "completed")
            .increment(1);
        let rendered = handle.render();
        assert!(rendered.contains("courier_saga_total"));
        assert!(rendered.contains("observability_test"));
    }
}
