//! gbs-daemon entry point.
//!
//! Loads config, sets up tracing, builds the cycle and hands it to the
//! scheduler. Runs until the process is terminated.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context;
use gbs_daemon::{cycle::ReconcileCycle, scheduler};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    let cfg = gbs_config::load_from_env().context("config load failed")?;
    let settings = cfg.settings;

    init_tracing(settings.log_file.as_deref())?;

    info!(
        config_hash = %cfg.config_hash,
        roster_url = %settings.roster_url,
        banlist_url = %settings.banlist_url,
        store_path = %settings.store_path,
        timeout_secs = settings.request_timeout_secs,
        interval_secs = settings.cycle_interval_secs,
        "gbs-daemon starting"
    );

    let cycle = ReconcileCycle::from_settings(&settings)?;
    scheduler::run_loop(&cycle, settings.cycle_interval(), None).await;
    Ok(())
}

fn init_tracing(log_file: Option<&str>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {path}"))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}
