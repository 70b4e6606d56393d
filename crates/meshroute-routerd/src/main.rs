//! routerd - serves advertised mesh routes from this peer
//!
//! Polls the desired route set and converges NAT/forwarding rules to it
//! until interrupted, then removes everything it installed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use meshroute_common::shell::{CommandRunner, DryRunRunner, ShellRunner};
use meshroute_routerd::{
    load_routes, IptablesFirewall, LocalPeerStatus, RouterdConfig, ServerRouter,
    StaticTunnelIface, TunnelIface, DEFAULT_CONFIG_PATH,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "routerd")]
#[command(about = "Converges NAT/forwarding rules to the routes this peer serves")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Desired route set (overrides the configuration file)
    #[arg(short, long)]
    routes: Option<PathBuf>,

    /// Tunnel interface name (overrides the configuration file)
    #[arg(short, long)]
    interface: Option<String>,

    /// Log firewall commands instead of executing them
    #[arg(long)]
    dry_run: bool,

    /// Run a single reconciliation cycle and exit, leaving the installed
    /// rules in place
    #[arg(long)]
    once: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    info!("--- Starting routerd v{} ---", env!("CARGO_PKG_VERSION"));

    let mut config = RouterdConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(routes) = cli.routes {
        config.routes_file = routes;
    }
    if let Some(interface) = cli.interface {
        config.interface.name = interface;
    }
    config.dry_run |= cli.dry_run;
    config.validate()?;

    run(config, cli.once).await
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();
}

async fn run(config: RouterdConfig, once: bool) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let iface: Arc<dyn TunnelIface> = Arc::new(StaticTunnelIface::new(
        config.interface.name.clone(),
        config.interface.address,
    ));
    let runner: Arc<dyn CommandRunner> = if config.dry_run {
        warn!("Dry-run mode: firewall commands are only logged");
        Arc::new(DryRunRunner::new())
    } else {
        Arc::new(ShellRunner)
    };
    let firewall = Arc::new(IptablesFirewall::new(iface.name(), runner));
    let status = Arc::new(LocalPeerStatus::new());
    let router = Arc::new(ServerRouter::new(
        cancel.clone(),
        iface,
        firewall,
        status.clone(),
    ));

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received SIGINT, shutting down");
            shutdown.cancel();
        }
    });

    let mut ticker = tokio::time::interval(Duration::from_secs(config.poll_interval_secs));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                reconcile_once(&router, &config).await;
                if once {
                    break;
                }
            }
        }
    }

    if !should_clean_up(once, cancel.is_cancelled()) {
        info!(
            served_routes = status.route_count(),
            "routerd: Single cycle complete, rules left installed"
        );
        return Ok(());
    }

    cancel.cancel();
    router.clean_up().await;
    info!(
        served_routes = status.route_count(),
        "routerd: Graceful shutdown complete"
    );
    Ok(())
}

/// A single-cycle run keeps what it installed unless it was interrupted.
fn should_clean_up(once: bool, interrupted: bool) -> bool {
    !once || interrupted
}

async fn reconcile_once(router: &ServerRouter, config: &RouterdConfig) {
    let desired = match load_routes(&config.routes_file).await {
        Ok(routes) => routes,
        Err(e) => {
            warn!(error = %e, "Keeping current routes, desired set unreadable");
            return;
        }
    };

    if let Err(e) = router.update_routes(&desired).await {
        error!(error = %e, "Route reconciliation failed");
    }
}
