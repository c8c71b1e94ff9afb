//! General tools, registered regardless of feature flags.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::units::{MAX_DECIMALS, format_units, parse_units};
use super::{NoParams, ToolContext, ToolGroup};
use crate::domains::tools::handlers::{ChainTool, HandlerError, HandlerResult};
use crate::domains::tools::policy::{
    BITCOIN_FLAG, CROSS_CHAIN_FLAG, ETHEREUM_FLAG, RIPPLE_FLAG, SOLANA_FLAG, TON_FLAG,
};
use crate::domains::tools::registry::ToolDescriptor;

/// Static description of a supported chain.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChainInfo {
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u32,
    /// Flag enabling the chain's tool group.
    pub flag: &'static str,
}

pub const SUPPORTED_CHAINS: &[ChainInfo] = &[
    ChainInfo {
        name: "solana",
        symbol: "SOL",
        decimals: 9,
        flag: SOLANA_FLAG,
    },
    ChainInfo {
        name: "ethereum",
        symbol: "ETH",
        decimals: 18,
        flag: ETHEREUM_FLAG,
    },
    ChainInfo {
        name: "bitcoin",
        symbol: "BTC",
        decimals: 8,
        flag: BITCOIN_FLAG,
    },
    ChainInfo {
        name: "litecoin",
        symbol: "LTC",
        decimals: 8,
        flag: BITCOIN_FLAG,
    },
    ChainInfo {
        name: "dogecoin",
        symbol: "DOGE",
        decimals: 8,
        flag: BITCOIN_FLAG,
    },
    ChainInfo {
        name: "bitcoin_cash",
        symbol: "BCH",
        decimals: 8,
        flag: BITCOIN_FLAG,
    },
    ChainInfo {
        name: "cardano",
        symbol: "ADA",
        decimals: 6,
        flag: BITCOIN_FLAG,
    },
    ChainInfo {
        name: "xrp",
        symbol: "XRP",
        decimals: 6,
        flag: RIPPLE_FLAG,
    },
    ChainInfo {
        name: "ton",
        symbol: "TON",
        decimals: 9,
        flag: TON_FLAG,
    },
];

/// Look up a chain by name or ticker symbol, case-insensitively.
pub fn find_chain(key: &str) -> Option<&'static ChainInfo> {
    SUPPORTED_CHAINS
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(key) || c.symbol.eq_ignore_ascii_case(key))
}

/// Build the always-on general tool group.
pub fn group(ctx: &Arc<ToolContext>) -> ToolGroup {
    ToolGroup::new("general")
        .with(ToolDescriptor::typed(ServerInfoTool::new(ctx.clone())))
        .with(ToolDescriptor::typed(SupportedChainsTool::new(ctx.clone())))
        .with(ToolDescriptor::typed(ConvertUnitsTool))
}

// ============================================================================
// get_server_info
// ============================================================================

/// Server identity and enabled groups.
#[derive(Debug, Clone)]
pub struct ServerInfoTool {
    ctx: Arc<ToolContext>,
}

impl ServerInfoTool {
    pub const NAME: &'static str = "get_server_info";
    pub const DESCRIPTION: &'static str =
        "Get the server name, version, transport and which chain tool groups are enabled.";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for ServerInfoTool {
    type Params = NoParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, _params: Self::Params) -> HandlerResult {
        let config = &self.ctx.config;
        let enabled: Vec<&str> = config.features.enabled().collect();
        Ok(json!({
            "name": config.server.name,
            "version": config.server.version,
            "transport": config.transport.description(),
            "enabledGroups": enabled,
            "crossChain": config.features.is_enabled(CROSS_CHAIN_FLAG),
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

// ============================================================================
// list_supported_chains
// ============================================================================

/// Supported chains and whether their tools are enabled.
#[derive(Debug, Clone)]
pub struct SupportedChainsTool {
    ctx: Arc<ToolContext>,
}

impl SupportedChainsTool {
    pub const NAME: &'static str = "list_supported_chains";
    pub const DESCRIPTION: &'static str =
        "List supported chains with symbol, decimals, enabling flag and whether it is on.";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for SupportedChainsTool {
    type Params = NoParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, _params: Self::Params) -> HandlerResult {
        let features = &self.ctx.config.features;
        let chains: Vec<_> = SUPPORTED_CHAINS
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "symbol": c.symbol,
                    "decimals": c.decimals,
                    "flag": c.flag,
                    "enabled": features.is_enabled(c.flag),
                })
            })
            .collect();
        Ok(json!({ "chains": chains }))
    }
}

// ============================================================================
// convert_units
// ============================================================================

/// Conversion direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Human amount (1.5 ETH) to base units (wei).
    ToBase,
    /// Base units to human amount.
    FromBase,
}

/// Parameters for unit conversion.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ConvertUnitsParams {
    /// Amount as a decimal string.
    #[schemars(description = "Amount as a decimal string, e.g. \"1.5\" or \"1500000000\"")]
    pub amount: String,

    /// Chain name or symbol (solana, ETH, ...) used to pick the decimals.
    #[schemars(description = "Chain name or symbol; alternative to decimals")]
    #[serde(default)]
    pub chain: Option<String>,

    /// Explicit number of decimals.
    #[schemars(description = "Number of decimals (0-18); alternative to chain")]
    #[serde(default)]
    pub decimals: Option<u32>,

    /// to_base or from_base.
    pub direction: Direction,
}

/// Resolve the decimals for a conversion from either a chain or an explicit value.
pub fn resolve_decimals(chain: Option<&str>, decimals: Option<u32>) -> Result<u32, HandlerError> {
    let decimals = match (chain, decimals) {
        (_, Some(d)) => d,
        (Some(chain), None) => find_chain(chain)
            .map(|c| c.decimals)
            .ok_or_else(|| HandlerError::invalid_argument(format!("unknown chain: {chain}")))?,
        (None, None) => {
            return Err(HandlerError::invalid_argument(
                "either chain or decimals is required",
            ));
        }
    };
    if decimals > MAX_DECIMALS {
        return Err(HandlerError::invalid_argument(format!(
            "decimals must be at most {MAX_DECIMALS}"
        )));
    }
    Ok(decimals)
}

/// Offline amount conversion.
#[derive(Debug, Clone)]
pub struct ConvertUnitsTool;

impl ConvertUnitsTool {
    pub const NAME: &'static str = "convert_units";
    pub const DESCRIPTION: &'static str = "Convert an amount between human units and base units (lamports, wei, satoshis, drops, nanotons) for a chain or an explicit number of decimals.";
}

#[async_trait]
impl ChainTool for ConvertUnitsTool {
    type Params = ConvertUnitsParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, params: Self::Params) -> HandlerResult {
        let decimals = resolve_decimals(params.chain.as_deref(), params.decimals)?;
        let converted = match params.direction {
            Direction::ToBase => parse_units(&params.amount, decimals)
                .map_err(HandlerError::invalid_argument)?
                .to_string(),
            Direction::FromBase => {
                let raw: u128 = params.amount.trim().parse().map_err(|_| {
                    HandlerError::invalid_argument(format!(
                        "base amount must be a non-negative integer: {}",
                        params.amount
                    ))
                })?;
                format_units(raw, decimals)
            }
        };

        Ok(json!({
            "input": params.amount,
            "decimals": decimals,
            "result": converted,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::domains::tools::FeatureFlags;

    fn ctx_with_flags(pairs: &[(&str, &str)]) -> Arc<ToolContext> {
        let config = Config {
            features: FeatureFlags::from_pairs(pairs.iter().copied()),
            ..Config::default()
        };
        Arc::new(ToolContext::new(Arc::new(config)).unwrap())
    }

    #[test]
    fn test_find_chain() {
        assert_eq!(find_chain("ETH").unwrap().decimals, 18);
        assert_eq!(find_chain("Solana").unwrap().symbol, "SOL");
        assert!(find_chain("polkadot").is_none());
    }

    #[test]
    fn test_resolve_decimals() {
        assert_eq!(resolve_decimals(Some("btc"), None).unwrap(), 8);
        assert_eq!(resolve_decimals(Some("btc"), Some(2)).unwrap(), 2);
        assert!(resolve_decimals(None, None).is_err());
        assert!(resolve_decimals(None, Some(30)).is_err());
    }

    #[tokio::test]
    async fn test_convert_units_both_directions() {
        let to_base = ConvertUnitsTool
            .execute(ConvertUnitsParams {
                amount: "1.5".to_string(),
                chain: Some("sol".to_string()),
                decimals: None,
                direction: Direction::ToBase,
            })
            .await
            .unwrap();
        assert_eq!(to_base["result"], "1500000000");

        let from_base = ConvertUnitsTool
            .execute(ConvertUnitsParams {
                amount: "2500000".to_string(),
                chain: Some("xrp".to_string()),
                decimals: None,
                direction: Direction::FromBase,
            })
            .await
            .unwrap();
        assert_eq!(from_base["result"], "2.5");
    }

    #[tokio::test]
    async fn test_convert_units_rejects_bad_amount() {
        let err = ConvertUnitsTool
            .execute(ConvertUnitsParams {
                amount: "-1".to_string(),
                chain: None,
                decimals: Some(6),
                direction: Direction::FromBase,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_supported_chains_reflect_flags() {
        let ctx = ctx_with_flags(&[(TON_FLAG, "true")]);
        let result = SupportedChainsTool::new(ctx).execute(NoParams {}).await.unwrap();
        let chains = result["chains"].as_array().unwrap();
        assert_eq!(chains.len(), SUPPORTED_CHAINS.len());
        for chain in chains {
            assert_eq!(chain["enabled"], chain["name"] == "ton");
        }
    }

    #[tokio::test]
    async fn test_server_info() {
        let ctx = ctx_with_flags(&[(SOLANA_FLAG, "1")]);
        let info = ServerInfoTool::new(ctx).execute(NoParams {}).await.unwrap();
        assert_eq!(info["name"], "web3-rpc");
        assert_eq!(info["enabledGroups"], json!([SOLANA_FLAG]));
    }
}
