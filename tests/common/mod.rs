//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Request, http::StatusCode, response::IntoResponse};
use priority_gate::config::GateConfig;
use priority_gate::http::{AppState, HttpServer};
use priority_gate::lifecycle::Shutdown;
use priority_gate::scheduler::{Handler, HandlerError};
use tokio::net::TcpListener;

/// A gate running on an ephemeral port.
pub struct TestGate {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: Shutdown,
}

impl TestGate {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGate {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the gate in front of `handler`.
pub async fn start_gate(config: GateConfig, handler: Arc<dyn Handler>) -> TestGate {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config, handler);
    let state = server.state().clone();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestGate {
        addr,
        state,
        shutdown,
    }
}

/// Handler answering 200 with the request path.
#[allow(dead_code)]
pub fn echo_handler() -> Arc<dyn Handler> {
    Arc::new(|request: Request| async move {
        let path = request.uri().path().to_string();
        Ok::<_, HandlerError>((StatusCode::OK, path).into_response())
    })
}

/// Non-pooled client so every request is a fresh connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Poll until `check` holds, failing the test after two seconds.
#[allow(dead_code)]
pub async fn wait_until(what: &str, check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
