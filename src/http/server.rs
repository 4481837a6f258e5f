//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the admission handler on every path
//! - Wire up middleware (request ID, tracing, security headers, CORS, rate limit)
//! - Own the scheduler and start its dispatcher
//! - Start the stale-client sweeper
//! - Serve until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::HeaderName,
    middleware,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GateConfig;
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::http::response;
use crate::lifecycle::shutdown;
use crate::scheduler::{Dispatcher, Handler, Priority, Scheduler};
use crate::security::headers;
use crate::security::rate_limit::{rate_limit_middleware, RateLimitState, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Scheduler,
    pub limiter: Arc<RateLimiter>,
}

/// Public HTTP server for the gate.
pub struct HttpServer {
    router: Router,
    config: GateConfig,
    state: AppState,
    dispatcher: Dispatcher,
}

impl HttpServer {
    /// Create a new HTTP server protecting `handler`.
    pub fn new(config: GateConfig, handler: Arc<dyn Handler>) -> Self {
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let (scheduler, dispatcher) = Scheduler::new(handler, &config.scheduler);

        let state = AppState { scheduler, limiter };
        let router = Self::build_router(&config, state.clone());

        Self {
            router,
            config,
            state,
            dispatcher,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GateConfig, state: AppState) -> Router {
        let rate_limit = RateLimitState {
            limiter: state.limiter.clone(),
            client_header: config.rate_limit.client_header.clone(),
        };
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        let router = Router::new()
            .route("/", any(admit_handler))
            .route("/{*path}", any(admit_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(rate_limit, rate_limit_middleware));

        headers::apply(router, &config.security)
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let HttpServer {
            router,
            config,
            state,
            dispatcher,
        } = self;

        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::spawn(dispatcher.run(shutdown.resubscribe()));

        let sweep_every = config.rate_limit.sweep_interval_secs;
        if config.rate_limit.enabled && sweep_every > 0 {
            tokio::spawn(
                state
                    .limiter
                    .clone()
                    .run_sweeper(Duration::from_secs(sweep_every), shutdown.resubscribe()),
            );
        }

        let app = router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Shared state, for wiring the admin API.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}

/// Every request that passed the limiter ends up here.
async fn admit_handler(State(state): State<AppState>, request: Request) -> Response {
    let priority = Priority::from_headers(request.headers());
    let pending = state.scheduler.submit(request, priority);

    // The sender is only dropped without a reply if the dispatcher is gone.
    pending.await.unwrap_or_else(|_| response::service_unavailable())
}
