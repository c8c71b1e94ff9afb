//! Transport configuration types.

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};

/// Transport configuration options.
///
/// Exactly one binding is active per process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Standard input/output pipe (default for MCP).
    #[cfg(feature = "stdio")]
    Stdio,

    /// HTTP server: event stream on GET, client messages on POST.
    #[cfg(feature = "sse")]
    Sse(SseConfig),
}

/// SSE transport configuration.
#[cfg(feature = "sse")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseConfig {
    /// Port number to listen on.
    pub port: u16,

    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Path that opens the event stream.
    #[serde(default = "default_stream_path")]
    pub stream_path: String,

    /// Path that receives client messages.
    #[serde(default = "default_messages_path")]
    pub messages_path: String,

    /// Enable CORS for browser clients.
    #[serde(default = "default_cors")]
    pub enable_cors: bool,
}

#[cfg(feature = "sse")]
fn default_host() -> String {
    "0.0.0.0".to_string()
}

#[cfg(feature = "sse")]
fn default_stream_path() -> String {
    "/".to_string()
}

#[cfg(feature = "sse")]
fn default_messages_path() -> String {
    "/messages".to_string()
}

#[cfg(feature = "sse")]
fn default_cors() -> bool {
    true
}

#[cfg(feature = "sse")]
const DEFAULT_PORT: u16 = 3000;

impl Default for TransportConfig {
    fn default() -> Self {
        #[cfg(feature = "stdio")]
        {
            return Self::Stdio;
        }

        #[cfg(all(not(feature = "stdio"), feature = "sse"))]
        {
            return Self::Sse(SseConfig::default());
        }

        #[cfg(not(any(feature = "stdio", feature = "sse")))]
        {
            compile_error!("At least one transport feature must be enabled: stdio or sse");
        }
    }
}

#[cfg(feature = "sse")]
impl Default for SseConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: default_host(),
            stream_path: default_stream_path(),
            messages_path: default_messages_path(),
            enable_cors: default_cors(),
        }
    }
}

impl TransportConfig {
    /// Load transport config from an environment variable lookup.
    ///
    /// An unknown transport name or a malformed port is a configuration
    /// error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let transport = lookup("MCP_TRANSPORT").unwrap_or_default().to_lowercase();

        match transport.as_str() {
            #[cfg(feature = "sse")]
            "sse" | "http" => {
                let port = match lookup("MCP_HTTP_PORT") {
                    Some(p) => p.trim().parse().map_err(|_| {
                        Error::config(format!("MCP_HTTP_PORT is not a valid port: '{p}'"))
                    })?,
                    None => DEFAULT_PORT,
                };
                let host = lookup("MCP_HTTP_HOST").unwrap_or_else(default_host);
                let enable_cors = lookup("MCP_HTTP_CORS")
                    .map(|v| v.to_lowercase() != "false" && v != "0")
                    .unwrap_or(true);
                Ok(Self::Sse(SseConfig {
                    port,
                    host,
                    enable_cors,
                    ..Default::default()
                }))
            }
            #[cfg(feature = "stdio")]
            "" | "stdio" | "pipe" => Ok(Self::Stdio),
            #[cfg(all(not(feature = "stdio"), feature = "sse"))]
            "" => Ok(Self::Sse(SseConfig::default())),
            other => Err(Error::config(format!(
                "unsupported MCP_TRANSPORT '{other}' (this build supports: {})",
                Self::supported().join(", ")
            ))),
        }
    }

    /// Transport names compiled into this build.
    pub fn supported() -> Vec<&'static str> {
        let mut names = Vec::new();
        #[cfg(feature = "stdio")]
        names.push("stdio");
        #[cfg(feature = "sse")]
        names.push("sse");
        names
    }

    /// Get a description of this transport for logging.
    pub fn description(&self) -> String {
        match self {
            #[cfg(feature = "stdio")]
            Self::Stdio => "STDIO (standard MCP mode)".to_string(),
            #[cfg(feature = "sse")]
            Self::Sse(cfg) => format!(
                "SSE on {}:{} (stream GET {}, messages POST {})",
                cfg.host, cfg.port, cfg.stream_path, cfg.messages_path
            ),
        }
    }

    /// Check if this transport is the standard STDIO mode.
    pub fn is_stdio(&self) -> bool {
        #[cfg(feature = "stdio")]
        {
            matches!(self, Self::Stdio)
        }
        #[cfg(not(feature = "stdio"))]
        {
            false
        }
    }
}
