#![forbid(unsafe_code)]

use clap::Parser;
use scion_hsr_lib::config::{load_from_path, Config};
use scion_hsr_lib::framework::InProcessHost;
use scion_hsr_lib::telemetry::start_metrics_server;
use scion_hsr_lib::ScionContext;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "SCION border-router fast path")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "config/hsr.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            // tracing is not up yet; load errors go straight to stderr
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };
    init_tracing(&cfg);

    info!(
        local_isd_as = %cfg.local_isd_as,
        interfaces = cfg.interfaces.len(),
        keys = cfg.keys.len(),
        "configuration loaded"
    );

    if let Err(err) = run(cfg).await {
        error!(%err, "scion-hsr exited with error");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> scion_hsr_lib::Result<()> {
    let context = ScionContext::new(Box::new(InProcessHost::new()))?;
    context.apply_config(&cfg)?;

    info!("scion interfaces:\n{}", context.format_interfaces());

    if let Some(port) = cfg.telemetry.metrics_port {
        let registry = context.metrics().registry().clone();
        if let Err(err) = start_metrics_server(port, registry).await {
            error!(%err, "metrics server exited with error");
        }
    } else {
        // No metrics endpoint configured; wait for shutdown.
        tokio::signal::ctrl_c().await?;
        info!("received ctrl-c, shutting down");
    }

    Ok(())
}

fn init_tracing(cfg: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.logging.level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(cfg.logging.show_target)
        .init();
}
