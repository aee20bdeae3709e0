//! Lottery wheel binary entrypoint wiring the file store, the selection engine and the console host.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lottery_wheel::{
    config::AppConfig, dao::group_store::file::FileGroupStore,
    presentation::console::ConsoleSurface, routes::console, state::AppState,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let backend = FileGroupStore::new(config.data_path());
    info!(path = %backend.path().display(), "using data file");

    let surface = Arc::new(ConsoleSurface::stdout());
    let mut state = AppState::bootstrap(&config, Arc::new(backend), surface).await;

    let input = BufReader::new(tokio::io::stdin());
    let result = console::run(&mut state, input, std::io::stdout(), shutdown_signal()).await;
    state.shutdown().await;

    result.context("console host failed")
}

/// Configure tracing subscribers; logs go to stderr so they do not mix with the console.
fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
