//! Axum server for `/health` and `/metrics`.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::lifecycle::Shutdown;
use crate::observability::MetricsRegistry;

const CHECK_TIMEOUT: Duration = Duration::from_secs(1);
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Clone)]
struct EndpointState {
    server_addr: SocketAddr,
    registry: MetricsRegistry,
}

/// Health and metrics endpoint running beside the request server.
pub struct EmbeddedHttpServer {
    addr: String,
    state: EndpointState,
    shutdown: Shutdown,
    local_addr: Option<SocketAddr>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl EmbeddedHttpServer {
    /// `server_addr` is the bound request server address checked by `/health`.
    pub fn new(addr: impl Into<String>, server_addr: SocketAddr, registry: MetricsRegistry) -> Self {
        Self {
            addr: addr.into(),
            state: EndpointState {
                server_addr,
                registry,
            },
            shutdown: Shutdown::new(),
            local_addr: None,
            task: None,
        }
    }

    fn router(state: EndpointState) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(render_metrics))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve in the background. Returns the bound address.
    pub async fn start(&mut self) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind(&self.addr).await?;
        let local_addr = listener.local_addr()?;
        let app = Self::router(self.state.clone());
        let mut stop = self.shutdown.subscribe();

        self.task = Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { stop.recv().await })
                .await
        }));
        self.local_addr = Some(local_addr);

        tracing::info!(address = %local_addr, server = %self.state.server_addr, "Health endpoint listening");
        Ok(local_addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Graceful shutdown; waits for in-flight requests.
    pub async fn destroy(&mut self) -> std::io::Result<()> {
        self.shutdown.trigger();
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        let served = task.await.map_err(std::io::Error::other)?;
        tracing::info!("Health endpoint stopped");
        served
    }
}

async fn health(State(state): State<EndpointState>) -> impl IntoResponse {
    let target = health_target(state.server_addr);
    let reachable = matches!(
        tokio::time::timeout(CHECK_TIMEOUT, TcpStream::connect(target)).await,
        Ok(Ok(_))
    );

    if reachable {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ok",
                "server_port": state.server_addr.port(),
                "version": env!("CARGO_PKG_VERSION"),
            })),
        )
    } else {
        tracing::warn!(server = %target, "Health check could not reach the request server");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "unavailable" })),
        )
    }
}

/// Wildcard binds are checked over loopback of the same family.
fn health_target(server_addr: SocketAddr) -> SocketAddr {
    let ip = match server_addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, server_addr.port())
}

async fn render_metrics(State(state): State<EndpointState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.registry.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_check_dials_the_bound_address() {
        let specific: SocketAddr = "10.1.2.3:7000".parse().unwrap();
        assert_eq!(health_target(specific), specific);

        let wildcard: SocketAddr = "0.0.0.0:7000".parse().unwrap();
        assert_eq!(health_target(wildcard), "127.0.0.1:7000".parse().unwrap());

        let wildcard_v6: SocketAddr = "[::]:7000".parse().unwrap();
        assert_eq!(health_target(wildcard_v6), "[::1]:7000".parse().unwrap());
    }
}
