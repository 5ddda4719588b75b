//! HTTP surface of the relay.
//!
//! Maps the public endpoints onto the relay components and serves the
//! embedded receiver page. TLS is optional: with a certificate and key the
//! listener speaks HTTPS (required by browsers for service workers and push
//! on anything but localhost), otherwise plain HTTP.
//!
//! # Endpoints
//!
//! | Method | Path                | Purpose                                 |
//! |--------|---------------------|-----------------------------------------|
//! | GET    | `/`                 | Receiver page                           |
//! | GET    | `/sw.js`            | Service worker                          |
//! | GET    | `/ca.crt`           | CA certificate download                 |
//! | GET    | `/vapid-public-key` | `applicationServerKey` for subscribing  |
//! | POST   | `/subscribe`        | Store a push subscription               |
//! | GET    | `/events`           | SSE notification stream                 |
//! | POST   | `/send`             | Submit a notification                   |

mod assets;
pub mod error;
mod handlers;

use anyhow::{Context, Result};
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::relay::NotificationRelay;

/// Grace period for open connections once shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Fan-out coordinator (owns the registry and store handles).
    pub relay: NotificationRelay,
    /// VAPID public key handed to browsers.
    pub vapid_public_key: Arc<str>,
    /// CA certificate PEM offered at `/ca.crt`, if configured.
    pub ca_cert: Option<Arc<str>>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(handlers::index))
        .route("/sw.js", get(handlers::service_worker))
        .route("/ca.crt", get(handlers::ca_cert))
        .route("/vapid-public-key", get(handlers::vapid_public_key))
        .route("/subscribe", post(handlers::subscribe))
        .route("/events", get(handlers::events))
        .route("/send", post(handlers::send))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::not_found)
        .layer(cors)
        .with_state(state)
}

/// TLS material for the listener.
#[derive(Debug, Clone)]
pub struct TlsFiles {
    /// Leaf certificate (PEM).
    pub cert_pem: String,
    /// Private key (PEM).
    pub key_pem: String,
    /// CA certificate appended to the served chain (PEM), if any.
    pub ca_pem: Option<String>,
}

impl TlsFiles {
    /// Leaf certificate followed by the CA certificate.
    fn chain(&self) -> String {
        match &self.ca_pem {
            Some(ca) => format!("{}\n{}", self.cert_pem.trim_end(), ca),
            None => self.cert_pem.clone(),
        }
    }
}

/// Serve `app` on `addr` until Ctrl-C.
pub async fn serve(addr: SocketAddr, app: Router, tls: Option<TlsFiles>) -> Result<()> {
    let handle = Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {e}");
            return;
        }
        log::info!("Shutdown requested");
        // SSE streams never finish on their own; cap the wait.
        shutdown.graceful_shutdown(Some(SHUTDOWN_GRACE));
    });

    match tls {
        Some(tls) => {
            let config = RustlsConfig::from_pem(tls.chain().into_bytes(), tls.key_pem.into_bytes())
                .await
                .context("Failed to load TLS certificate/key")?;
            axum_server::bind_rustls(addr, config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .with_context(|| format!("HTTPS server on {addr} failed"))?;
        }
        None => {
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .with_context(|| format!("HTTP server on {addr} failed"))?;
        }
    }

    log::info!("Server stopped");
    Ok(())
}
