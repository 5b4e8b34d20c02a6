use anyhow::Result;
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Histogram bucket boundaries for probe cycle duration (seconds).
const CYCLE_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Thin handle around the global metrics recorder.
///
/// After `Metrics::install()` the `metrics` crate macros used by the pool
/// are recorded. The `PrometheusHandle` is retained solely for rendering the
/// `/metrics` endpoint.
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and register metric descriptions.
    ///
    /// Must be called **once** at startup.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("_duration_seconds".to_string()),
                CYCLE_BUCKETS,
            )?
            .install_recorder()?;

        describe_counter!(
            "addrpool_probe_total",
            Unit::Count,
            "Endpoint probes by result"
        );
        describe_histogram!(
            "addrpool_probe_cycle_duration_seconds",
            Unit::Seconds,
            "Time to probe every tracked endpoint once"
        );
        describe_gauge!(
            "addrpool_available_endpoints",
            Unit::Count,
            "Endpoints marked available by the last committed cycle"
        );
        describe_gauge!(
            "addrpool_tier_endpoints",
            Unit::Count,
            "Endpoints per tier"
        );
        describe_counter!(
            "addrpool_resync_total",
            Unit::Count,
            "Directory resync attempts by result"
        );

        Ok(Self { handle })
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
