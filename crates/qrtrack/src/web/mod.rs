//! HTTP interface for qrtrack.
//!
//! Serves the item listing and forms, the scan-to-delete endpoint that codes
//! point at, and the code images themselves.

mod handlers;
pub mod pages;

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::inventory::Inventory;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    inventory: Inventory,
    public_url: Option<String>,
    bind: SocketAddr,
}

impl AppState {
    /// Build state for `inventory` using the server settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is invalid.
    pub fn new(config: &Config, inventory: Inventory) -> Result<Self> {
        Ok(Self {
            inventory,
            public_url: config
                .server
                .public_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
            bind: config.bind_addr()?,
        })
    }

    /// Base URL written into codes: the configured public URL, else the
    /// request's `Host`, else the bind address.
    fn base_url(&self, host: Option<&str>) -> String {
        if let Some(url) = &self.public_url {
            return url.clone();
        }
        match host {
            Some(host) if !host.is_empty() => format!("http://{host}"),
            _ => format!("http://{}", self.bind),
        }
    }
}

/// Build the application router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/create",
            get(handlers::create_form).post(handlers::create_submit),
        )
        .route(
            "/edit/:id",
            get(handlers::edit_form).post(handlers::edit_submit),
        )
        .route("/delete/:id", get(handlers::scan_delete))
        .route("/delete_manual/:id", get(handlers::manual_delete))
        .route("/qrcodes/:file", get(handlers::code_image))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}

/// Run the HTTP server until interrupted.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(config: &Config, inventory: Inventory) -> Result<()> {
    let state = AppState::new(config, inventory)?;
    let addr = state.bind;
    let app = build_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Error returned from a handler. Logged, then shown as a generic 500 page.
#[derive(Debug)]
pub struct AppError(Error);

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, Html(pages::server_error())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::{CodeGenerator, TokenSigner};
    use crate::storage::SqliteStore;
    use std::sync::Arc;

    fn state(public_url: Option<&str>) -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let inventory = Inventory::new(
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            CodeGenerator::new(dir.path()).unwrap(),
            TokenSigner::new(b"0123456789abcdef", None).unwrap(),
        );
        let mut config = Config::default();
        config.server.public_url = public_url.map(str::to_string);
        AppState::new(&config, inventory).unwrap()
    }

    #[test]
    fn test_base_url_prefers_public_url() {
        let state = state(Some("https://stock.example.com/"));
        assert_eq!(
            state.base_url(Some("localhost:5000")),
            "https://stock.example.com"
        );
    }

    #[test]
    fn test_base_url_uses_host_then_bind() {
        let state = state(None);
        assert_eq!(state.base_url(Some("10.0.0.5:5000")), "http://10.0.0.5:5000");
        assert_eq!(state.base_url(None), "http://127.0.0.1:5000");
        assert_eq!(state.base_url(Some("")), "http://127.0.0.1:5000");
    }

    #[test]
    fn test_invalid_bind_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = Inventory::new(
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            CodeGenerator::new(dir.path()).unwrap(),
            TokenSigner::new(b"0123456789abcdef", None).unwrap(),
        );
        let mut config = Config::default();
        config.server.bind = "nowhere".to_string();

        assert!(AppState::new(&config, inventory).is_err());
    }
}
