//! attune-server - HTTP and WebSocket server for attune live sessions
//!
//! Owns the orchestrator and the per-session tick tasks. Instructor and
//! student clients connect over WebSocket for the ordered event stream and
//! drive the session through the thin REST command surface.

mod error;
pub mod http;
mod state;
mod ticker;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use attune_core::SessionConfig;

pub use error::ServerError;
pub use http::create_router;
pub use state::AppState;
pub use ticker::SessionTicker;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Granularity of the scheduled-interval tick
    pub tick: Duration,
    /// Config applied to sessions created without an explicit one
    pub session_defaults: SessionConfig,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7410,
            tick: Duration::from_secs(10),
            session_defaults: SessionConfig::default(),
        }
    }
}

/// The main attune server
pub struct AttuneServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl AttuneServer {
    /// Create a new server with default in-memory state
    pub fn new(config: ServerConfig) -> Self {
        let state = Arc::new(
            AppState::new(config.tick).with_session_defaults(config.session_defaults.clone()),
        );
        Self { config, state }
    }

    /// Create a server with custom state (for testing and custom wiring)
    pub fn with_state(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Run the server, binding to the configured address
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        tracing::info!("attune server listening on {}", addr);

        let router = create_router(self.state);
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:7410");
    }
}
