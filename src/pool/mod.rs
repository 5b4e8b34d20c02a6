pub mod monitor;
pub mod prober;
pub mod readiness;
pub mod resync;
pub mod selector;
pub mod store;

pub use monitor::{
    check_interval_from_env, sanitize_interval, HealthMonitor, CHECK_INTERVAL_ENV,
    DEFAULT_CHECK_INTERVAL, MAX_CHECK_INTERVAL,
};
pub use prober::{HttpProbeOptions, ProbeMethod, Prober};
pub use readiness::Readiness;
pub use resync::{DataCenterInfo, Instance};
pub use selector::RoundRobin;
pub use store::{AddressStore, EndpointStatus, Lifecycle, StatusMap, Tier, Tiers};

use crate::error::PoolError;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Construction options for [`AddressPool`].
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Probe over HTTP instead of a bare TCP connect.
    pub http_probe: Option<HttpProbeOptions>,
    /// Pre-seeds the DiffAz tier.
    pub diff_az_addresses: Vec<String>,
    /// `None` reads `ADDRPOOL_HEALTH_CHECK_INTERVAL`, falling back to 15s.
    pub check_interval: Option<Duration>,
    /// Probes in flight at once during a cycle. 1 probes sequentially.
    pub probe_concurrency: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            http_probe: None,
            diff_az_addresses: Vec::new(),
            check_interval: None,
            probe_concurrency: 1,
        }
    }
}

struct PoolInner {
    store: Arc<AddressStore>,
    monitor: HealthMonitor,
    round_robin: RoundRobin,
}

/// Health-aware pool of peer addresses for one upstream target.
///
/// Cheap to clone: all clones share the same tiers, status and background
/// monitor. The monitor stops on `close`/`shutdown`, or once the last clone
/// is dropped.
#[derive(Clone)]
pub struct AddressPool {
    inner: Arc<PoolInner>,
}

impl AddressPool {
    /// Seed the Default tier from `addresses`, run one probe cycle and start
    /// the periodic monitor. Must be called within a tokio runtime.
    pub async fn new<S: AsRef<str>>(addresses: &[S], options: PoolOptions) -> Result<Self, PoolError> {
        let prober = Arc::new(Prober::new(options.http_probe)?);
        let store = Arc::new(AddressStore::new(
            &store::dedup(addresses),
            &options.diff_az_addresses,
        ));
        let interval = options
            .check_interval
            .filter(|d| !d.is_zero())
            .map(sanitize_interval)
            .unwrap_or_else(check_interval_from_env);
        let monitor = HealthMonitor::new(store.clone(), prober, interval, options.probe_concurrency);

        let pool = Self {
            inner: Arc::new(PoolInner {
                store,
                monitor,
                round_robin: RoundRobin::new(),
            }),
        };
        pool.record_tier_sizes();
        pool.start().await;
        Ok(pool)
    }

    /// Start the background monitor. Only the first call has any effect;
    /// returns whether this call started it.
    pub async fn start(&self) -> bool {
        self.inner.monitor.start().await
    }

    /// Replace the Default tier and forget the zone tiers, statuses and history.
    pub fn reset_addresses<S: AsRef<str>>(&self, addresses: &[S]) {
        self.inner.store.reset_addresses(addresses);
        info!(
            "pool: reset addresses, default={:?}",
            self.inner.store.tiers().default
        );
        self.record_tier_sizes();
    }

    /// Reconcile the SameAz / DiffAz tiers with a directory instance list.
    ///
    /// Fails without touching any tier if no instance offers a `rest` endpoint.
    pub fn apply_resync(&self, instances: &[Instance]) -> Result<(), PoolError> {
        let zones = resync::group_by_zone(instances);
        if zones.is_empty() {
            metrics::counter!("addrpool_resync_total", "result" => "error").increment(1);
            return Err(PoolError::NoUsableEndpoints);
        }

        self.inner
            .store
            .apply_zone_assignment(|default| resync::classify(&zones, default));
        metrics::counter!("addrpool_resync_total", "result" => "success").increment(1);
        self.record_tier_sizes();
        Ok(())
    }

    /// Pick one address round-robin from the most preferred tier that has
    /// available members. Falls back to the raw Default tier when nothing is
    /// available; returns an empty string when Default is empty too.
    pub fn get_available_address(&self) -> String {
        let state = self.inner.store.read();
        let candidates = selector::candidates(&state.tiers, &state.status);
        self.inner
            .round_robin
            .pick(&candidates)
            .map(str::to_string)
            .unwrap_or_default()
    }

    pub fn check_readiness(&self) -> Readiness {
        let state = self.inner.store.read();
        readiness::evaluate(state.history.iter().map(|s| &**s))
    }

    /// Signal the monitor to stop. Idempotent and non-blocking.
    pub fn close(&self) {
        self.inner.monitor.stop();
    }

    /// `close`, then wait for the monitor loop to exit.
    pub async fn shutdown(&self) {
        self.close();
        self.inner.monitor.join().await;
    }

    pub fn tiers(&self) -> Tiers {
        self.inner.store.tiers()
    }

    pub fn status(&self) -> Arc<StatusMap> {
        self.inner.store.status()
    }

    pub fn status_of(&self, endpoint: &str) -> Option<EndpointStatus> {
        self.inner.store.status_of(endpoint)
    }

    pub fn history_len(&self) -> usize {
        self.inner.store.history_len()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.store.lifecycle()
    }

    pub fn check_interval(&self) -> Duration {
        self.inner.monitor.interval()
    }

    fn record_tier_sizes(&self) {
        let tiers = self.inner.store.tiers();
        for tier in Tier::PRIORITY {
            metrics::gauge!("addrpool_tier_endpoints", "tier" => tier.as_str())
                .set(tiers.get(tier).len() as f64);
        }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &AddressStore {
        &self.inner.store
    }
}
