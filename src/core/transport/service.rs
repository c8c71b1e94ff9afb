//! Transport service - starts exactly one transport binding.

use tracing::info;

use super::TransportConfig;
use crate::core::McpServer;
use crate::core::error::Result;

#[cfg(feature = "stdio")]
use super::stdio::StdioTransport;

#[cfg(feature = "sse")]
use super::sse::SseTransport;

/// Transport service - manages the transport layer for the MCP server.
pub struct TransportService {
    config: TransportConfig,
}

impl TransportService {
    /// Create a new transport service with the given configuration.
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Start the transport with the given MCP server.
    ///
    /// The server's registry is complete at this point. This method returns
    /// when the transport shuts down: for STDIO when the channel closes, for
    /// SSE on Ctrl-C.
    pub async fn run(self, server: McpServer) -> Result<()> {
        info!("Starting transport: {}", self.config.description());

        match self.config {
            #[cfg(feature = "stdio")]
            TransportConfig::Stdio => StdioTransport::run(server).await?,
            #[cfg(feature = "sse")]
            TransportConfig::Sse(cfg) => SseTransport::new(cfg).run(server).await?,
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "sse"))]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::error::Error;
    use crate::core::transport::{SseConfig, TransportError};

    #[tokio::test]
    async fn test_bind_failure_surfaces_as_transport_error() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let config = TransportConfig::Sse(SseConfig {
            port,
            host: "127.0.0.1".to_string(),
            ..Default::default()
        });
        let server = McpServer::new(Config::default()).unwrap();
        let err = TransportService::new(config).run(server).await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::BindError { .. })));
        assert!(!err.is_configuration());
    }
}
