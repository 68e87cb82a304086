//! FinanceGuard Document Viewer Service
//!
//! Review sessions, PDF text extraction and highlight mapping.

use anyhow::Result;
use financeguard_document_viewer::{create_router, AppState};
use financeguard_utils::{init_logging, AppConfig};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

const DEFAULT_PORT: u16 = 8083;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load_for_service("document-viewer", DEFAULT_PORT).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration ({}), using defaults", e);
        let mut config = AppConfig::default();
        config.server.port = DEFAULT_PORT;
        config
    });

    init_logging(&config.logging)?;
    info!("Starting FinanceGuard Document Viewer");

    let state = AppState::from_config(config.clone())?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Document Viewer listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
