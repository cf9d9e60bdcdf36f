//! Waits for the process to be asked to shut down: `Ctrl+C`/`SIGINT`, or on
//! Unix, `SIGTERM`.

use tokio::signal;

enum ShutdownSignal {
    CtrlC,
    #[cfg(unix)]
    Sigterm,
}

async fn wait_ctrl_c() -> ShutdownSignal {
    let _ = signal::ctrl_c().await;
    ShutdownSignal::CtrlC
}

#[cfg(unix)]
async fn wait_sigterm() -> ShutdownSignal {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
            ShutdownSignal::Sigterm
        }
        Err(_) => std::future::pending().await,
    }
}

#[cfg(not(unix))]
async fn wait_sigterm() -> ShutdownSignal {
    std::future::pending().await
}

/// Resolves once `Ctrl+C` or (on Unix) `SIGTERM` is received.
pub async fn wait_for_shutdown_signal() {
    let signal = tokio::select! {
        s = wait_ctrl_c() => s,
        s = wait_sigterm() => s,
    };
    match signal {
        ShutdownSignal::CtrlC => tracing::info!("received Ctrl+C, starting graceful shutdown"),
        #[cfg(unix)]
        ShutdownSignal::Sigterm => tracing::info!("received SIGTERM, starting graceful shutdown"),
    }
}
