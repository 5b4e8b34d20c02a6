use crate::config::{DirectoryConfig, PoolConfig};
use crate::discovery::DirectoryClient;
use crate::metrics::Metrics;
use crate::pool::AddressPool;
use crate::server::{self, AdminState};
use anyhow::Result;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// CLI arguments forwarded from `main()`.
pub struct BootstrapArgs {
    pub config_path: std::path::PathBuf,
    /// Overrides `admin_listen` from the config file.
    pub admin_listen: Option<String>,
}

/// Lifecycle: init → probe → resync → serve → shutdown.
pub async fn run(args: BootstrapArgs) -> Result<()> {
    init_tracing();

    // Phase 1: configuration and metrics recorder.
    let mut cfg = PoolConfig::load(&args.config_path)?;
    if let Some(listen) = args.admin_listen {
        cfg.admin_listen = listen;
    }
    let metrics = Metrics::install()?;

    // Phase 2: the pool runs its initial probe cycle before returning.
    let pool = AddressPool::new(&cfg.addresses, cfg.pool_options()).await?;
    tracing::info!(
        "pool: initial probe completed, available={}, interval={}s",
        pool.status().values().filter(|s| s.is_available()).count(),
        pool.check_interval().as_secs(),
    );

    // Phase 3: background loops, all owned here.
    let shutdown = CancellationToken::new();
    let resync_handle = match cfg.directory {
        Some(ref dir) => Some(start_resync_loop(&pool, dir, &shutdown)?),
        None => {
            tracing::info!("discovery: resync skipped, no directory configured");
            None
        }
    };

    // Phase 4: admin server.
    let listener = server::bind_admin(&cfg.admin_listen).await?;
    let admin_handle = tokio::spawn({
        let state = AdminState::new(pool.clone(), Some(metrics));
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = server::serve_admin(listener, state, shutdown).await {
                tracing::error!("server: admin failed, error={}", e);
            }
        }
    });

    // Phase 5: block until signal, then clean up.
    wait_for_shutdown(&shutdown).await;

    if let Some(handle) = resync_handle {
        if let Err(e) = handle.await {
            tracing::error!("discovery: resync task error: {}", e);
        }
    }
    pool.shutdown().await;
    if let Err(e) = admin_handle.await {
        tracing::error!("server: admin task error: {}", e);
    }

    tracing::info!("server: shutdown complete");
    Ok(())
}

fn init_tracing() {
    let (non_blocking, guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .buffered_lines_limit(128_000)
        .lossy(true)
        .finish(std::io::stdout());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .json(),
        )
        .init();

    // The writer thread must outlive every log call.
    std::mem::forget(guard);
}

/// Sleep for `duration`, but return `true` immediately if shutdown is signalled.
/// Returns `false` if the full duration elapsed normally.
async fn sleep_or_shutdown(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.cancelled() => true,
    }
}

/// Single round of directory resync.
pub async fn resync_once(pool: &AddressPool, client: &DirectoryClient) -> Result<()> {
    let start = Instant::now();
    let instances = match client.fetch_instances().await {
        Ok(instances) => instances,
        Err(e) => {
            metrics::counter!("addrpool_resync_total", "result" => "fetch_error").increment(1);
            return Err(e.into());
        }
    };
    tracing::info!(
        "discovery: fetched instances, url={}, count={}, duration={:.3}s",
        client.url(),
        instances.len(),
        start.elapsed().as_secs_f64(),
    );

    pool.apply_resync(&instances)?;
    let tiers = pool.tiers();
    tracing::info!(
        "discovery: resync applied, same_az={}, diff_az={}",
        tiers.same_az.len(),
        tiers.diff_az.len(),
    );
    Ok(())
}

fn start_resync_loop(
    pool: &AddressPool,
    dir: &DirectoryConfig,
    shutdown: &CancellationToken,
) -> Result<JoinHandle<()>> {
    let client = DirectoryClient::new(&dir.url, Duration::from_secs(dir.timeout_secs))?;
    let interval = Duration::from_secs(dir.poll_interval_secs);
    let pool = pool.clone();
    let shutdown = shutdown.clone();

    Ok(tokio::spawn(async move {
        loop {
            if let Err(e) = resync_once(&pool, &client).await {
                tracing::error!("discovery: resync failed, url={}, error={}", client.url(), e);
            }
            if sleep_or_shutdown(interval, &shutdown).await {
                return;
            }
        }
    }))
}

async fn wait_for_shutdown(shutdown: &CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("server: SIGTERM handler install failed, error={}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("server: received SIGINT, shutting down"),
        _ = terminate => tracing::info!("server: received SIGTERM, shutting down"),
    }

    // Signal all background loops to stop.
    shutdown.cancel();
}
