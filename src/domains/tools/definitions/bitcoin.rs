//! Bitcoin-family tools.
//!
//! UTXO chains (Bitcoin, Litecoin, Dogecoin, Bitcoin Cash) are queried
//! through the Blockchair address dashboard; Cardano goes through Blockfrost,
//! which requires a project id.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use super::rpc::integer_field;
use super::units::format_units;
use super::{AddressParams, ToolContext, ToolGroup, clean_address};
use crate::domains::tools::handlers::{ChainTool, HandlerError, HandlerResult};
use crate::domains::tools::registry::ToolDescriptor;

/// Satoshis (and their Litecoin/Dogecoin equivalents) per coin.
const UTXO_DECIMALS: u32 = 8;

/// Lovelace per ADA.
pub const ADA_DECIMALS: u32 = 6;

/// A UTXO chain served by Blockchair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtxoChain {
    /// Registered tool name.
    pub tool: &'static str,
    /// Blockchair path segment.
    pub slug: &'static str,
    pub symbol: &'static str,
    pub label: &'static str,
}

pub const BITCOIN: UtxoChain = UtxoChain {
    tool: "bitcoin_get_balance",
    slug: "bitcoin",
    symbol: "BTC",
    label: "Bitcoin",
};

pub const LITECOIN: UtxoChain = UtxoChain {
    tool: "litecoin_get_balance",
    slug: "litecoin",
    symbol: "LTC",
    label: "Litecoin",
};

pub const DOGECOIN: UtxoChain = UtxoChain {
    tool: "dogecoin_get_balance",
    slug: "dogecoin",
    symbol: "DOGE",
    label: "Dogecoin",
};

pub const BITCOIN_CASH: UtxoChain = UtxoChain {
    tool: "bitcoin_cash_get_balance",
    slug: "bitcoin-cash",
    symbol: "BCH",
    label: "Bitcoin Cash",
};

/// Build the Bitcoin-family tool group.
pub fn group(ctx: &Arc<ToolContext>) -> ToolGroup {
    [BITCOIN, LITECOIN, DOGECOIN, BITCOIN_CASH]
        .into_iter()
        .fold(ToolGroup::new("bitcoin"), |group, chain| {
            group.with(ToolDescriptor::typed(UtxoBalanceTool::new(chain, ctx.clone())))
        })
        .with(ToolDescriptor::typed(CardanoBalanceTool::new(ctx.clone())))
}

/// Extract the confirmed balance from a Blockchair address dashboard.
///
/// The dashboard is keyed by the address as Blockchair normalised it, so the
/// first entry of `data` is used rather than a lookup by the caller's string.
pub fn parse_dashboard_balance(response: &Value) -> Result<u128, HandlerError> {
    let entry = response
        .get("data")
        .and_then(Value::as_object)
        .and_then(|data| data.values().next())
        .ok_or_else(|| HandlerError::unexpected("dashboard has no data"))?;
    let address = entry
        .get("address")
        .ok_or_else(|| HandlerError::unexpected("dashboard has no address section"))?;
    integer_field(address, "balance")
}

/// Fetch the balance of `address` on a UTXO chain.
pub async fn fetch_utxo_balance(
    ctx: &ToolContext,
    chain: UtxoChain,
    address: &str,
) -> HandlerResult {
    let address = clean_address(address)?;
    let url = format!(
        "{}/{}/dashboards/address/{}",
        ctx.config.chains.blockchair_api_url, chain.slug, address
    );
    let response = ctx.rpc.get_json(&url, &[], &[]).await?;
    let base_units = parse_dashboard_balance(&response)?;

    Ok(json!({
        "chain": chain.slug,
        "address": address,
        "baseUnits": base_units.to_string(),
        "balance": format_units(base_units, UTXO_DECIMALS),
        "symbol": chain.symbol,
    }))
}

/// Sum the lovelace entry of a Blockfrost address response.
pub fn parse_lovelace(response: &Value) -> Result<u128, HandlerError> {
    let amounts = response
        .get("amount")
        .and_then(Value::as_array)
        .ok_or_else(|| HandlerError::unexpected("address has no amount list"))?;
    amounts
        .iter()
        .filter(|a| a.get("unit").and_then(Value::as_str) == Some("lovelace"))
        .map(|a| integer_field(a, "quantity"))
        .sum()
}

/// Fetch the ADA balance of `address`.
pub async fn fetch_cardano_balance(ctx: &ToolContext, address: &str) -> HandlerResult {
    let address = clean_address(address)?;
    let project_id = ctx
        .config
        .chains
        .blockfrost_project_id
        .as_deref()
        .ok_or(HandlerError::MissingCredential("BLOCKFROST_PROJECT_ID"))?;

    let url = format!("{}/addresses/{}", ctx.config.chains.blockfrost_api_url, address);
    let response = ctx
        .rpc
        .get_json(&url, &[], &[("project_id", project_id)])
        .await?;
    let lovelace = parse_lovelace(&response)?;

    Ok(json!({
        "chain": "cardano",
        "address": address,
        "lovelace": lovelace.to_string(),
        "balance": format_units(lovelace, ADA_DECIMALS),
        "symbol": "ADA",
    }))
}

// ============================================================================
// <chain>_get_balance (Blockchair)
// ============================================================================

/// Balance lookup for one UTXO chain.
#[derive(Debug, Clone)]
pub struct UtxoBalanceTool {
    chain: UtxoChain,
    ctx: Arc<ToolContext>,
}

impl UtxoBalanceTool {
    pub fn new(chain: UtxoChain, ctx: Arc<ToolContext>) -> Self {
        Self { chain, ctx }
    }
}

#[async_trait]
impl ChainTool for UtxoBalanceTool {
    type Params = AddressParams;

    fn name(&self) -> &'static str {
        self.chain.tool
    }

    fn description(&self) -> &'static str {
        match self.chain.slug {
            "bitcoin" => "Get the confirmed balance of a Bitcoin address (BTC and satoshis).",
            "litecoin" => "Get the confirmed balance of a Litecoin address (LTC and litoshis).",
            "dogecoin" => "Get the confirmed balance of a Dogecoin address (DOGE).",
            _ => "Get the confirmed balance of a Bitcoin Cash address (BCH).",
        }
    }

    async fn execute(&self, params: Self::Params) -> HandlerResult {
        info!("{} balance lookup: {}", self.chain.label, params.address);
        fetch_utxo_balance(&self.ctx, self.chain, &params.address).await
    }
}

// ============================================================================
// cardano_get_balance (Blockfrost)
// ============================================================================

/// ADA balance lookup.
#[derive(Debug, Clone)]
pub struct CardanoBalanceTool {
    ctx: Arc<ToolContext>,
}

impl CardanoBalanceTool {
    pub const NAME: &'static str = "cardano_get_balance";
    pub const DESCRIPTION: &'static str =
        "Get the ADA balance of a Cardano address. Requires BLOCKFROST_PROJECT_ID.";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for CardanoBalanceTool {
    type Params = AddressParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, params: Self::Params) -> HandlerResult {
        info!("Cardano balance lookup: {}", params.address);
        fetch_cardano_balance(&self.ctx, &params.address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;

    #[test]
    fn test_parse_dashboard_balance() {
        let response = json!({
            "data": {
                "bc1qexample": {
                    "address": { "type": "witness_v0_keyhash", "balance": 150000000 },
                    "transactions": []
                }
            },
            "context": { "code": 200 }
        });
        assert_eq!(parse_dashboard_balance(&response).unwrap(), 150_000_000);
        assert_eq!(format_units(150_000_000, UTXO_DECIMALS), "1.5");
    }

    #[test]
    fn test_parse_dashboard_without_data() {
        let err = parse_dashboard_balance(&json!({ "data": [] })).unwrap_err();
        assert!(matches!(err, HandlerError::UnexpectedResponse(_)));
    }

    #[test]
    fn test_parse_lovelace_ignores_native_tokens() {
        let response = json!({
            "address": "addr1...",
            "amount": [
                { "unit": "lovelace", "quantity": "2500000" },
                { "unit": "b0d07d45fe9514f80213f4020e5a61241458be626841cde717cb38a7", "quantity": "99" }
            ]
        });
        assert_eq!(parse_lovelace(&response).unwrap(), 2_500_000);
        assert_eq!(parse_lovelace(&json!({ "amount": [] })).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cardano_requires_project_id() {
        let ctx = ToolContext::new(Arc::new(Config::default())).unwrap();
        let err = fetch_cardano_balance(&ctx, "addr1xyz").await.unwrap_err();
        assert!(matches!(err, HandlerError::MissingCredential("BLOCKFROST_PROJECT_ID")));
    }

    #[test]
    fn test_group_contents() {
        let ctx = Arc::new(ToolContext::new(Arc::new(Config::default())).unwrap());
        assert_eq!(
            group(&ctx).names(),
            vec![
                "bitcoin_get_balance",
                "litecoin_get_balance",
                "dogecoin_get_balance",
                "bitcoin_cash_get_balance",
                "cardano_get_balance",
            ]
        );
    }
}
