//! STDIO transport implementation.
//!
//! The pipe binding: one channel (stdin/stdout) opened at startup and bound
//! to exactly one protocol session for the life of the process. There is no
//! reconnection; when the channel closes, `run` returns and the process ends.

use std::sync::Arc;

use rmcp::{RoleServer, ServiceExt, transport::IntoTransport};
use tracing::{info, warn};

use super::{TransportError, TransportResult};
use crate::core::McpServer;
use crate::core::server::SessionHandler;
use crate::core::session::ProtocolSession;

/// STDIO transport handler.
pub struct StdioTransport;

impl StdioTransport {
    /// Run the STDIO transport until the channel closes.
    pub async fn run(server: McpServer) -> TransportResult<()> {
        let session = server.session();
        info!(session = %session.id(), "Ready - communicating via stdin/stdout");
        Self::serve_on(session, rmcp::transport::stdio()).await
    }

    /// Bind `session` to `transport` and serve it until the peer closes the
    /// channel. The session is closed when this returns.
    pub async fn serve_on<T, E, A>(
        session: Arc<ProtocolSession>,
        transport: T,
    ) -> TransportResult<()>
    where
        T: IntoTransport<RoleServer, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let handler = SessionHandler::new(session.clone());

        let service = match handler.serve(transport).await {
            Ok(service) => service,
            Err(e) => {
                session.fail(&e);
                return Err(TransportError::init(e.to_string()));
            }
        };
        session.open();

        let outcome = service.waiting().await;
        match &outcome {
            Ok(reason) => info!("STDIO channel closed: {:?}", reason),
            Err(e) => warn!("STDIO service ended with error: {}", e),
        }
        session.close();

        outcome.map_err(|e| TransportError::service(e.to_string()))?;
        info!("STDIO transport finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::session::SessionState;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::io::{
        AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
    };

    /// Client end of an in-memory pipe speaking newline-delimited JSON-RPC.
    struct PipeClient {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl PipeClient {
        fn new(stream: DuplexStream) -> Self {
            let (reader, writer) = tokio::io::split(stream);
            Self {
                lines: BufReader::new(reader).lines(),
                writer,
            }
        }

        async fn send(&mut self, message: Value) {
            let mut line = message.to_string();
            line.push('\n');
            self.writer.write_all(line.as_bytes()).await.unwrap();
        }

        /// Read messages until the response to `id` arrives.
        async fn response(&mut self, id: u64) -> Value {
            loop {
                let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
                    .await
                    .unwrap()
                    .unwrap()
                    .unwrap();
                let message: Value = serde_json::from_str(&line).unwrap();
                if message["id"] == id {
                    return message;
                }
            }
        }
    }

    fn call(id: u64, name: &str) -> Value {
        json!({
            "jsonrpc": "2.0", "id": id, "method": "tools/call",
            "params": { "name": name, "arguments": {} }
        })
    }

    #[tokio::test]
    async fn test_pipe_session_lifecycle() {
        let server = McpServer::new(Config::default()).unwrap();
        let session = server.session();
        let (client_stream, server_stream) = tokio::io::duplex(64 * 1024);
        let serving = tokio::spawn(StdioTransport::serve_on(
            session.clone(),
            tokio::io::split(server_stream),
        ));
        let mut client = PipeClient::new(client_stream);

        client
            .send(json!({
                "jsonrpc": "2.0", "id": 1, "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "test-client", "version": "0.0.0" }
                }
            }))
            .await;
        let init = client.response(1).await;
        assert_eq!(init["result"]["serverInfo"]["name"], "web3-rpc");
        client
            .send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
            .await;

        client.send(call(2, "get_server_info")).await;
        let info = client.response(2).await;
        assert_eq!(session.state(), SessionState::Open);
        assert_ne!(info["result"]["isError"], true);
        let text = info["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("web3-rpc"));

        client.send(call(3, "nonexistent_tool")).await;
        let unknown = client.response(3).await;
        assert_eq!(unknown["error"]["code"], -32602);
        assert_eq!(unknown["error"]["data"]["error"]["kind"], "unknown_tool");

        drop(client);
        let outcome = tokio::time::timeout(Duration::from_secs(5), serving)
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.is_ok());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_channel_closed_before_handshake() {
        let server = McpServer::new(Config::default()).unwrap();
        let session = server.session();
        let (client_stream, server_stream) = tokio::io::duplex(1024);
        drop(client_stream);

        let err = StdioTransport::serve_on(session.clone(), tokio::io::split(server_stream))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InitError(_)));
        assert_eq!(session.state(), SessionState::Closed);
    }
}
