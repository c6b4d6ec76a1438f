use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

async fn terminate() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                warn!("Can't listen for SIGTERM {e:?}");
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    std::future::pending::<()>().await;
}

/// Waits for Ctrl+C (or SIGTERM on unix) and cancels `cancellation`. Returns early if something
/// else cancels the token first.
pub async fn detect_shutdown(cancellation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate() => {
            info!("Received termination signal, shutting down");
        },
        _ = cancellation.cancelled() => {},
    };
    cancellation.cancel();
}
