//! Ledger Web Server
//!
//! Main web server implementation using Axum.

use crate::{create_app, AppState};
use ledger_core::{LedgerConfig, LedgerResult};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Main ledger server
pub struct LedgerServer {
    state: AppState,
}

impl LedgerServer {
    /// Create a new server: connect, migrate and bootstrap
    pub async fn new(config: LedgerConfig) -> LedgerResult<Self> {
        let state = AppState::new(config).await?;
        Ok(Self { state })
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn start(self) -> LedgerResult<()> {
        let address = self.state.config.address();
        let listener = TcpListener::bind(&address).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> LedgerResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr()?;
        info!("Starting ledger server");
        info!("Server address: http://{}", local);
        info!("Debug mode: {}", self.state.config.server.debug);

        let app = create_app(self.state);

        // Peer addresses feed the audit trail
        let service = app.into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = axum::serve(listener, service)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("Server error: {}", e);
            return Err(e.into());
        }

        info!("Server shut down gracefully");
        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &LedgerConfig {
        &self.state.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Builder for LedgerServer
pub struct LedgerServerBuilder {
    config: LedgerConfig,
}

impl LedgerServerBuilder {
    /// Create a new server builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LedgerConfig::default(),
        }
    }

    /// Start from a loaded configuration
    pub fn config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the server host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.server.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Expose internal error details in 500 responses
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.server.debug = debug;
        self
    }

    /// Set database URL
    pub fn database_url<S: Into<String>>(mut self, database_url: S) -> Self {
        self.config.database.url = database_url.into();
        self
    }

    /// Build the server
    pub async fn build(self) -> LedgerResult<LedgerServer> {
        LedgerServer::new(self.config).await
    }
}

impl Default for LedgerServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_creation() {
        let server = LedgerServerBuilder::new()
            .database_url("sqlite::memory:")
            .build()
            .await;
        assert!(server.is_ok());
    }

    #[test]
    fn test_server_builder() {
        let builder = LedgerServerBuilder::new()
            .host("localhost")
            .port(3000)
            .debug(true);

        assert_eq!(builder.config.server.host, "localhost");
        assert_eq!(builder.config.server.port, 3000);
        assert!(builder.config.server.debug);
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let server = LedgerServerBuilder::new()
            .database_url("sqlite::memory:")
            .build()
            .await
            .unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let result = server.serve(listener, async {}).await;
        assert!(result.is_ok());
    }
}
