//! Web server module: the `/metrics` pull endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::api::ZmClient;
use crate::collect;
use crate::config::ExporterConfig;
use crate::metrics;
use crate::shm::MmapShm;

const TEXT_EXPOSITION: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ExporterConfig,
    pub client: Arc<ZmClient>,
    pub shm: Arc<MmapShm>,
}

/// Web server exposing the metrics endpoint.
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(config: ExporterConfig, client: Arc<ZmClient>) -> Self {
        Self {
            state: AppState {
                config,
                client,
                shm: Arc::new(MmapShm::new()),
            },
        }
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/metrics", get(handle_metrics))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind and serve in the foreground until terminated.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr =
            resolve_bind_addr(&self.state.config.bind_addr, self.state.config.http_port).await?;
        let router = self.routes();

        tracing::info!("metrics server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

/// Resolve the bind address so the socket family follows the address
/// (IPv6 literals bind an AF_INET6 socket).
async fn resolve_bind_addr(
    addr: &str,
    port: u16,
) -> Result<SocketAddr, Box<dyn std::error::Error + Send + Sync>> {
    let mut candidates = tokio::net::lookup_host((addr, port)).await?;
    candidates
        .next()
        .ok_or_else(|| format!("bind address {addr:?} resolved to nothing").into())
}

/// Run one collection cycle and render it. Every scrape is an independent
/// cycle; a fatal collection error fails this scrape only.
async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match collect::collect_all(
        state.client.as_ref(),
        state.shm.as_ref(),
        state.config.zmes_websocket_url.as_deref(),
    )
    .await
    {
        Ok(families) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TEXT_EXPOSITION)],
            metrics::render(&families),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "collection cycle failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_bind_addr_families() {
        let v4 = resolve_bind_addr("0.0.0.0", 9100).await.unwrap();
        assert!(v4.is_ipv4());
        assert_eq!(v4.port(), 9100);

        let v6 = resolve_bind_addr("::1", 9100).await.unwrap();
        assert!(v6.is_ipv6());
    }
}
