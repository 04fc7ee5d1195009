//! Companion web server.
//! `GET /` serves a small control page for a phone on the same network; `GET /scan` runs one
//! capture-and-analyze cycle and answers `{"result": "..."}`. Failures are reported in the same
//! shape with status 200 so the page only has one code path.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerSettings;
use crate::scanner::Scanner;

const INDEX_HTML: &str = include_str!("index.html");

#[derive(Debug, Serialize)]
pub struct ScanReply {
    pub result: String,
}

pub fn router(scanner: Arc<Scanner>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/scan", get(scan))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(scanner)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn scan(State(scanner): State<Arc<Scanner>>) -> Json<ScanReply> {
    let result = match scanner.scan().await {
        Ok(hint) => hint.to_string(),
        Err(e) => {
            warn!("Scan request failed: {}", e);
            format!("Error: {}", e)
        }
    };
    Json(ScanReply { result })
}

/// Serves until Ctrl-C.
pub async fn run(settings: &ServerSettings, scanner: Arc<Scanner>) -> Result<()> {
    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let bound: SocketAddr = listener.local_addr().context("Failed to read bound address")?;

    let shown_ip = if bound.ip().is_unspecified() {
        local_ip()
    } else {
        bound.ip()
    };
    info!("Companion server running on http://{}:{}", shown_ip, bound.port());

    axum::serve(listener, router(scanner))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down companion server");
        })
        .await
        .context("Companion server failed")
}

/// Best-effort LAN address: the source address the OS would route public traffic from.
/// No packet is sent.
fn local_ip() -> IpAddr {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| {
            socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
