//! Configuration management for the MCP server.
//!
//! This module provides a centralized configuration structure populated from
//! environment variables (and a `.env` file, if present) or defaults. It is
//! read once at startup and never reloaded.

use super::error::{Error, Result};
use super::transport::TransportConfig;
use crate::domains::tools::FeatureFlags;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Main configuration structure for the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Which optional tool groups are registered.
    pub features: FeatureFlags,

    /// Chain endpoints and API credentials.
    pub chains: ChainsConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,
}

/// Endpoints and credentials used by the chain tools.
#[derive(Clone, Serialize, Deserialize)]
pub struct ChainsConfig {
    /// Solana JSON-RPC endpoint.
    pub solana_rpc_url: String,

    /// Ethereum (or any EVM chain) JSON-RPC endpoint.
    pub ethereum_rpc_url: String,

    /// XRP Ledger JSON-RPC endpoint.
    pub xrp_rpc_url: String,

    /// Toncenter v2 API base URL.
    pub toncenter_api_url: String,

    /// Optional Toncenter API key (raises rate limits).
    pub toncenter_api_key: Option<String>,

    /// Blockchair API base URL (Bitcoin, Litecoin, Dogecoin, Bitcoin Cash).
    pub blockchair_api_url: String,

    /// Blockfrost API base URL (Cardano).
    pub blockfrost_api_url: String,

    /// Blockfrost project id; Cardano lookups fail without it.
    pub blockfrost_project_id: Option<String>,

    /// CoinGecko API base URL.
    pub coingecko_api_url: String,

    /// Timeout applied to every outbound chain request, in seconds.
    pub rpc_timeout_secs: u64,
}

/// Custom Debug implementation to redact secrets from logs.
impl std::fmt::Debug for ChainsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainsConfig")
            .field("solana_rpc_url", &self.solana_rpc_url)
            .field("ethereum_rpc_url", &self.ethereum_rpc_url)
            .field("xrp_rpc_url", &self.xrp_rpc_url)
            .field("toncenter_api_url", &self.toncenter_api_url)
            .field(
                "toncenter_api_key",
                &self.toncenter_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("blockchair_api_url", &self.blockchair_api_url)
            .field("blockfrost_api_url", &self.blockfrost_api_url)
            .field(
                "blockfrost_project_id",
                &self.blockfrost_project_id.as_ref().map(|_| "[REDACTED]"),
            )
            .field("coingecko_api_url", &self.coingecko_api_url)
            .field("rpc_timeout_secs", &self.rpc_timeout_secs)
            .finish()
    }
}

impl Default for ChainsConfig {
    fn default() -> Self {
        Self {
            solana_rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            ethereum_rpc_url: "https://eth.llamarpc.com".to_string(),
            xrp_rpc_url: "https://s1.ripple.com:51234/".to_string(),
            toncenter_api_url: "https://toncenter.com/api/v2".to_string(),
            toncenter_api_key: None,
            blockchair_api_url: "https://api.blockchair.com".to_string(),
            blockfrost_api_url: "https://cardano-mainnet.blockfrost.io/api/v0".to_string(),
            blockfrost_project_id: None,
            coingecko_api_url: "https://api.coingecko.com/api/v3".to_string(),
            rpc_timeout_secs: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "web3-rpc".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            transport: TransportConfig::default(),
            features: FeatureFlags::default(),
            chains: ChainsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is loaded first, if present.
    /// Invalid values for settings that change startup behaviour (transport,
    /// port, timeout) are reported as configuration errors rather than
    /// silently replaced by defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(name) = lookup("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        if let Some(level) = lookup("MCP_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.transport = TransportConfig::from_lookup(&lookup)?;
        config.features = FeatureFlags::from_lookup(&lookup);
        config.chains = ChainsConfig::from_lookup(&lookup)?;

        Ok(config)
    }
}

impl ChainsConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut chains = Self::default();

        let urls = [
            ("SOLANA_RPC_URL", &mut chains.solana_rpc_url),
            ("ETHEREUM_RPC_URL", &mut chains.ethereum_rpc_url),
            ("XRP_RPC_URL", &mut chains.xrp_rpc_url),
            ("TONCENTER_API_URL", &mut chains.toncenter_api_url),
            ("BLOCKCHAIR_API_URL", &mut chains.blockchair_api_url),
            ("BLOCKFROST_API_URL", &mut chains.blockfrost_api_url),
            ("COINGECKO_API_URL", &mut chains.coingecko_api_url),
        ];
        for (key, slot) in urls {
            if let Some(url) = lookup(key) {
                *slot = url.trim_end_matches('/').to_string();
            }
        }

        chains.toncenter_api_key = lookup("TONCENTER_API_KEY").filter(|k| !k.is_empty());
        chains.blockfrost_project_id = lookup("BLOCKFROST_PROJECT_ID").filter(|k| !k.is_empty());
        if chains.blockfrost_project_id.is_some() {
            info!("Blockfrost project id loaded from environment");
        }

        if let Some(timeout) = lookup("RPC_TIMEOUT_SECS") {
            chains.rpc_timeout_secs = match timeout.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(Error::config(format!(
                        "RPC_TIMEOUT_SECS must be a positive integer, got '{timeout}'"
                    )));
                }
            };
        }

        Ok(chains)
    }

    /// Warn about groups that are enabled but will fail without credentials.
    pub fn warn_missing_credentials(&self, features: &FeatureFlags) {
        if features.is_enabled(crate::domains::tools::BITCOIN_FLAG)
            && self.blockfrost_project_id.is_none()
        {
            warn!(
                "BLOCKFROST_PROJECT_ID not set - cardano_get_balance will fail until it is configured"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_from_empty_environment() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.server.name, "web3-rpc");
        assert_eq!(config.logging.level, "info");
        assert!(config.transport.is_stdio());
        assert_eq!(config.features.enabled().count(), 0);
        assert_eq!(config.chains.rpc_timeout_secs, 30);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("MCP_SERVER_NAME", "chain-tools"),
            ("SOLANA_RPC_URL", "http://localhost:8899/"),
            ("ENABLE_SOLANA_TOOLS", "yes"),
            ("RPC_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.server.name, "chain-tools");
        assert_eq!(config.chains.solana_rpc_url, "http://localhost:8899");
        assert!(config.features.is_enabled("ENABLE_SOLANA_TOOLS"));
        assert_eq!(config.chains.rpc_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_timeout_is_configuration_error() {
        let err = Config::from_lookup(lookup_from(&[("RPC_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(err.is_configuration());

        let err = Config::from_lookup(lookup_from(&[("RPC_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_credentials_redacted_in_debug() {
        let chains = ChainsConfig {
            blockfrost_project_id: Some("mainnetSECRET".to_string()),
            toncenter_api_key: Some("ton_secret".to_string()),
            ..Default::default()
        };
        let debug_str = format!("{:?}", chains);
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("mainnetSECRET"));
        assert!(!debug_str.contains("ton_secret"));
    }

    #[test]
    fn test_empty_credentials_are_ignored() {
        let config =
            Config::from_lookup(lookup_from(&[("BLOCKFROST_PROJECT_ID", "")])).unwrap();
        assert!(config.chains.blockfrost_project_id.is_none());
    }
}
