//! Spendtrack is a JSON REST API for tracking personal income and expenses
//! against per-category budgets.
//!
//! Transactions are categorized, and each category is permanently tagged as
//! income or expense. A budget can be set for a category, and the budget's
//! remaining amount is kept in sync with the expense transactions in that
//! category: cheap incremental adjustments on every transaction mutation, and
//! an explicit recompute-from-scratch operation as the correctness backstop.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod app_state;
mod budget;
mod category;
mod database_id;
mod db;
mod endpoints;
mod error;
mod logging;
mod pagination;
mod routing;
mod transaction;

pub use app_state::AppState;
pub use error::Error;
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
