//! Signal handling for graceful shutdown.

use anyhow::Context;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancel `cancel` on SIGINT (Ctrl+C) or SIGTERM.
///
/// Both signals are registered before this returns, so a signal arriving
/// right after startup already stops the relay gracefully. The watcher task
/// ends on its own once `cancel` is raised by anyone else.
#[cfg(unix)]
pub fn install_shutdown_handler(cancel: CancellationToken) -> anyhow::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;

    Ok(tokio::spawn(async move {
        let signal = tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        stop(&cancel, signal);
    }))
}

/// Cancel `cancel` on Ctrl+C.
#[cfg(windows)]
pub fn install_shutdown_handler(cancel: CancellationToken) -> anyhow::Result<JoinHandle<()>> {
    let mut ctrl_c =
        tokio::signal::windows::ctrl_c().context("Failed to register Ctrl+C handler")?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = ctrl_c.recv() => stop(&cancel, "Ctrl+C"),
        }
    }))
}

fn stop(cancel: &CancellationToken, signal: &'static str) {
    info!(signal, "Received shutdown signal, stopping relay");
    cancel.cancel();
}
