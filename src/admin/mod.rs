//! Management API.
//!
//! Read-only views of the scheduler and the rate limiter, served on their own
//! listener behind a bearer token.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::{admin_auth_middleware, AdminAuth};
use self::handlers::*;
use crate::http::server::AppState;
use crate::lifecycle::shutdown;

pub fn setup_admin_router(state: AppState, api_key: String) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/queue", get(get_queue))
        .route("/admin/clients", get(get_clients))
        .layer(middleware::from_fn_with_state(
            AdminAuth::new(api_key),
            admin_auth_middleware,
        ))
        .with_state(state)
}

/// Serve the admin API until shutdown.
pub async fn serve_admin(
    listener: TcpListener,
    router: Router,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown::wait(shutdown))
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
