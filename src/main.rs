//! Priority gate.
//!
//! ```text
//!   client ──▶ CORS ──▶ rate limiter ──429──▶ client
//!                           │ allow
//!                           ▼
//!                 scheduler (x-priority, FIFO ties)
//!                           │ one at a time
//!                           ▼
//!                  handler (static site) ──▶ client
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use priority_gate::admin;
use priority_gate::config::{load_config, override_bind_address, GateConfig};
use priority_gate::content::StaticSite;
use priority_gate::lifecycle::{signals, Shutdown};
use priority_gate::observability::{logging, metrics};
use priority_gate::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "priority-gate")]
#[command(about = "Rate-limited, priority-ordered gate in front of a single handler")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };
    if let Some(bind) = args.bind {
        config = override_bind_address(config, bind)?;
    }

    logging::init(&config.observability);
    tracing::info!("priority-gate v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_requests = config.rate_limit.max_requests,
        window_ms = config.rate_limit.window_ms,
        handler_timeout_ms = ?config.scheduler.handler_timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let site = Arc::new(StaticSite::new(&config.site));
    let server = HttpServer::new(config.clone(), site);

    if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        let router = admin::setup_admin_router(server.state().clone(), config.admin.api_key.clone());
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = admin::serve_admin(admin_listener, router, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let serving = server.run(listener, shutdown.subscribe());
    tokio::pin!(serving);

    tokio::select! {
        result = &mut serving => result?,
        _ = signals::shutdown_signal() => {
            shutdown.trigger();
            serving.await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
