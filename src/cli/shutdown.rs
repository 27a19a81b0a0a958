use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancels `cancellation` on Ctrl-C. Returns early when something else cancels it first.
pub async fn detect_shutdown(cancellation: CancellationToken) {
    select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Interrupted, shutting down"),
                Err(e) => error!("Failed to listen for Ctrl-C {e:?}"),
            }
            cancellation.cancel();
        },
        _ = cancellation.cancelled() => {},
    };
}
