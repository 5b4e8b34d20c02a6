use super::prober::Prober;
use super::store::{AddressStore, EndpointStatus};
use futures_util::stream::{self, StreamExt};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(15);

/// Longest accepted probe interval. Anything above falls back to the default.
pub const MAX_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Probe interval in whole seconds.
pub const CHECK_INTERVAL_ENV: &str = "ADDRPOOL_HEALTH_CHECK_INTERVAL";

/// Interval from `ADDRPOOL_HEALTH_CHECK_INTERVAL`, or the default when unset or invalid.
pub fn check_interval_from_env() -> Duration {
    parse_interval(std::env::var(CHECK_INTERVAL_ENV).ok().as_deref())
}

pub fn parse_interval(value: Option<&str>) -> Duration {
    match value.map(str::trim).and_then(|v| v.parse::<u64>().ok()) {
        Some(secs) => sanitize_interval(Duration::from_secs(secs)),
        None => DEFAULT_CHECK_INTERVAL,
    }
}

/// Zero or anything above `MAX_CHECK_INTERVAL` becomes the default.
pub fn sanitize_interval(interval: Duration) -> Duration {
    if interval.is_zero() || interval > MAX_CHECK_INTERVAL {
        DEFAULT_CHECK_INTERVAL
    } else {
        interval
    }
}

/// Probe every endpoint in one snapshot of the tiers and commit the results
/// as a single status map. Returns whether the map was installed.
pub async fn run_probe_cycle(store: &AddressStore, prober: &Prober, concurrency: usize) -> bool {
    let endpoints = store.snapshot_for_probe();
    let start = Instant::now();

    let results: Vec<(String, EndpointStatus)> = stream::iter(endpoints)
        .map(|endpoint| async move {
            let status = prober.probe(&endpoint).await;
            (endpoint, status)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let total = results.len();
    let available = results.iter().filter(|(_, s)| s.is_available()).count();
    for (_, status) in &results {
        metrics::counter!("addrpool_probe_total", "result" => status.as_str()).increment(1);
    }
    let duration = start.elapsed();
    metrics::histogram!("addrpool_probe_cycle_duration_seconds").record(duration.as_secs_f64());

    let committed = store.commit_status(results.into_iter().collect());
    if committed {
        metrics::gauge!("addrpool_available_endpoints").set(available as f64);
        debug!(
            "pool: monitor: cycle committed, endpoints={}, available={}, duration={:.3}s",
            total,
            available,
            duration.as_secs_f64()
        );
    } else {
        debug!("pool: monitor: cycle discarded, pool stopped");
    }
    committed
}

/// Background connectivity monitor for one pool.
///
/// `start` runs a first cycle inline and then spawns the periodic loop; only
/// the first call does anything. `stop` is a one-shot signal: a cycle already
/// in flight finishes its probes, but its results are no longer installed.
pub struct HealthMonitor {
    store: Arc<AddressStore>,
    prober: Arc<Prober>,
    interval: Duration,
    concurrency: usize,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(
        store: Arc<AddressStore>,
        prober: Arc<Prober>,
        interval: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            prober,
            interval: sanitize_interval(interval),
            concurrency: concurrency.max(1),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn run_cycle(&self) -> bool {
        run_probe_cycle(&self.store, &self.prober, self.concurrency).await
    }

    /// Returns `true` only for the call that moved the pool to Running.
    pub async fn start(&self) -> bool {
        if !self.store.try_start() {
            return false;
        }
        info!(
            "pool: monitor: starting, interval={}s, endpoints={}",
            self.interval.as_secs_f64(),
            self.store.snapshot_for_probe().len()
        );

        self.run_cycle().await;
        if self.cancel.is_cancelled() {
            return true;
        }

        let handle = tokio::spawn(run_loop(
            self.store.clone(),
            self.prober.clone(),
            self.interval,
            self.concurrency,
            self.cancel.clone(),
        ));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        true
    }

    /// Idempotent and non-blocking.
    pub fn stop(&self) -> bool {
        let first = self.store.stop();
        self.cancel.cancel();
        if first {
            info!("pool: monitor: stop requested");
        }
        first
    }

    /// Wait for the loop task to exit. Call after `stop`.
    pub async fn join(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("pool: monitor: loop task failed: {}", e);
            }
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_loop(
    store: Arc<AddressStore>,
    prober: Arc<Prober>,
    interval: Duration,
    concurrency: usize,
    cancel: CancellationToken,
) {
    // The inline first cycle already covered t=0.
    let start = Instant::now()
        .checked_add(interval)
        .unwrap_or_else(Instant::now);
    let mut ticker = tokio::time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        run_probe_cycle(&store, &prober, concurrency).await;
    }
    info!("pool: monitor: stopped");
}
