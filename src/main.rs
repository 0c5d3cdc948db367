//! listings-notifier daemon entrypoint.
//! Loads configuration, wires the watcher and runs check cycles until
//! SIGINT/SIGTERM.

use listings_notifier::config::{Config, LogFormat};
use listings_notifier::{build_watcher, logging, metrics, scheduler};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            logging::init_tracing("info", LogFormat::Compact);
            error!("configuration error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    logging::init_tracing(&cfg.log_level, cfg.log_format);
    info!("configuration validation passed");

    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("startup failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config) -> anyhow::Result<()> {
    if let Some(addr) = cfg.metrics_addr {
        metrics::install_exporter(addr)?;
    } else {
        metrics::ensure_metrics_described();
    }

    let mut watcher = build_watcher(&cfg)?;

    let cancel = CancellationToken::new();
    let _signals = scheduler::spawn_signal_listener(cancel.clone());

    info!(
        channels = cfg.channel_ids.len(),
        every_min = cfg.check_interval.as_secs() / 60,
        "monitoring listings"
    );
    scheduler::run(&mut watcher, cfg.check_interval, cancel).await;
    info!("shut down cleanly");
    Ok(())
}
