//! # Termination signals.
//!
//! [`wait_for_shutdown_signal`] resolves on the first signal that should stop
//! the service:
//! - unix: `SIGINT`, `SIGTERM` (systemd stop), `SIGQUIT`
//! - elsewhere: Ctrl-C

/// Waits for a termination signal.
///
/// Fails only if a signal listener cannot be registered.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = int.recv() => {},
        _ = term.recv() => {},
        _ = quit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
