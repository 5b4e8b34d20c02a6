#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use addrpool::server;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "addrpool", about = "Health-aware, zone-tiered peer address pool")]
struct Cli {
    /// Path to pool config file (.toml or .json)
    #[arg(short, long, default_value = "addrpool.toml")]
    config: PathBuf,

    /// Admin API listen address (health/readiness/metrics); overrides the config file
    #[arg(long)]
    admin_listen: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(server::bootstrap::run(server::bootstrap::BootstrapArgs {
        config_path: cli.config,
        admin_listen: cli.admin_listen,
    }))
}
