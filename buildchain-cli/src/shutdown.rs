//! Interrupt handling
//!
//! The first SIGINT/SIGTERM cancels the chain cooperatively. A second one
//! exits immediately.

use buildchain_runner::report::EXIT_CANCELLED;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Spawns the task that turns signals into cancellation
pub fn install(cancel: CancellationToken) {
    tokio::spawn(async move {
        let name = wait_for_signal().await;
        warn!("Received {}, cancelling (send again to exit immediately)", name);
        cancel.cancel();

        let name = wait_for_signal().await;
        error!("Received {} again, exiting", name);
        std::process::exit(EXIT_CANCELLED);
    });
}

async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
