//! Cross-chain tools: token prices and multi-chain balance lookups.
//!
//! `get_multichain_balances` reuses the per-chain balance functions, so it
//! works for every chain regardless of which chain groups are enabled.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{ToolContext, ToolGroup, bitcoin, ethereum, ripple, solana, ton};
use crate::domains::tools::handlers::{ChainTool, HandlerError, HandlerResult};
use crate::domains::tools::registry::ToolDescriptor;

/// Upper bound on addresses per multichain request.
const MAX_ADDRESSES: usize = 20;

/// Upper bound on token ids per price request.
const MAX_TOKEN_IDS: usize = 50;

/// Build the cross-chain tool group.
pub fn group(ctx: &Arc<ToolContext>) -> ToolGroup {
    ToolGroup::new("cross_chain")
        .with(ToolDescriptor::typed(TokenPricesTool::new(ctx.clone())))
        .with(ToolDescriptor::typed(MultichainBalancesTool::new(ctx.clone())))
}

// ============================================================================
// get_token_prices
// ============================================================================

fn default_vs_currency() -> String {
    "usd".to_string()
}

/// Parameters for price lookup.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TokenPricesParams {
    /// CoinGecko coin ids, e.g. ["bitcoin", "ethereum", "solana"].
    #[schemars(description = "CoinGecko coin ids, e.g. [\"bitcoin\", \"ethereum\"]")]
    pub ids: Vec<String>,

    /// Quote currency (default: usd).
    #[schemars(description = "Quote currency (default: usd)")]
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,
}

/// Normalise coin ids: trimmed, lowercased, de-duplicated, order kept.
pub fn normalize_ids(ids: &[String]) -> Result<Vec<String>, HandlerError> {
    let mut out: Vec<String> = Vec::new();
    for id in ids {
        let id = id.trim().to_ascii_lowercase();
        if !id.is_empty() && !out.contains(&id) {
            out.push(id);
        }
    }
    if out.is_empty() {
        return Err(HandlerError::invalid_argument("at least one coin id is required"));
    }
    if out.len() > MAX_TOKEN_IDS {
        return Err(HandlerError::invalid_argument(format!(
            "at most {MAX_TOKEN_IDS} coin ids per request"
        )));
    }
    Ok(out)
}

/// Token price lookup via CoinGecko.
#[derive(Debug, Clone)]
pub struct TokenPricesTool {
    ctx: Arc<ToolContext>,
}

impl TokenPricesTool {
    pub const NAME: &'static str = "get_token_prices";
    pub const DESCRIPTION: &'static str = "Get current prices for one or more tokens by CoinGecko id, quoted in the requested currency.";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for TokenPricesTool {
    type Params = TokenPricesParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, params: Self::Params) -> HandlerResult {
        let ids = normalize_ids(&params.ids)?;
        let vs_currency = params.vs_currency.trim().to_ascii_lowercase();
        info!("Price lookup for {} tokens in {}", ids.len(), vs_currency);

        let url = format!("{}/simple/price", self.ctx.config.chains.coingecko_api_url);
        let joined = ids.join(",");
        let prices = self
            .ctx
            .rpc
            .get_json(
                &url,
                &[("ids", joined.as_str()), ("vs_currencies", vs_currency.as_str())],
                &[],
            )
            .await?;

        let missing: Vec<&String> = ids
            .iter()
            .filter(|id| prices.get(id.as_str()).is_none())
            .collect();
        Ok(json!({
            "vsCurrency": vs_currency,
            "prices": prices,
            "missing": missing,
        }))
    }
}

// ============================================================================
// get_multichain_balances
// ============================================================================

/// Chains reachable from the multichain lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChainKind {
    Solana,
    Ethereum,
    Bitcoin,
    Litecoin,
    Dogecoin,
    BitcoinCash,
    Cardano,
    Xrp,
    Ton,
}

/// One address on one chain.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ChainAddress {
    pub chain: ChainKind,
    pub address: String,
}

/// Parameters for multichain balance lookup.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MultichainBalancesParams {
    /// Addresses to look up, each tagged with its chain.
    #[schemars(description = "Addresses to look up, each with its chain")]
    pub addresses: Vec<ChainAddress>,
}

async fn fetch_balance(ctx: &ToolContext, chain: ChainKind, address: &str) -> HandlerResult {
    match chain {
        ChainKind::Solana => solana::fetch_balance(ctx, address).await,
        ChainKind::Ethereum => ethereum::fetch_balance(ctx, address).await,
        ChainKind::Bitcoin => bitcoin::fetch_utxo_balance(ctx, bitcoin::BITCOIN, address).await,
        ChainKind::Litecoin => bitcoin::fetch_utxo_balance(ctx, bitcoin::LITECOIN, address).await,
        ChainKind::Dogecoin => bitcoin::fetch_utxo_balance(ctx, bitcoin::DOGECOIN, address).await,
        ChainKind::BitcoinCash => {
            bitcoin::fetch_utxo_balance(ctx, bitcoin::BITCOIN_CASH, address).await
        }
        ChainKind::Cardano => bitcoin::fetch_cardano_balance(ctx, address).await,
        ChainKind::Xrp => ripple::fetch_balance(ctx, address).await,
        ChainKind::Ton => ton::fetch_balance(ctx, address).await,
    }
}

/// Fold per-address outcomes into one report; failures are reported inline
/// so one bad address does not hide the others.
pub fn merge_outcomes(entries: &[ChainAddress], outcomes: Vec<HandlerResult>) -> Value {
    let mut failed = 0;
    let results: Vec<Value> = entries
        .iter()
        .zip(outcomes)
        .map(|(entry, outcome)| match outcome {
            Ok(balance) => json!({
                "chain": entry.chain,
                "address": entry.address,
                "ok": true,
                "result": balance
            }),
            Err(e) => {
                failed += 1;
                json!({
                    "chain": entry.chain,
                    "address": entry.address,
                    "ok": false,
                    "error": e.to_string()
                })
            }
        })
        .collect();

    json!({
        "total": results.len(),
        "failed": failed,
        "results": results,
    })
}

/// Balance lookup across several chains at once.
#[derive(Debug, Clone)]
pub struct MultichainBalancesTool {
    ctx: Arc<ToolContext>,
}

impl MultichainBalancesTool {
    pub const NAME: &'static str = "get_multichain_balances";
    pub const DESCRIPTION: &'static str = "Look up native balances for several addresses across different chains in one call. Lookups run concurrently; per-address failures are reported inline.";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for MultichainBalancesTool {
    type Params = MultichainBalancesParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, params: Self::Params) -> HandlerResult {
        let entries = params.addresses;
        if entries.is_empty() {
            return Err(HandlerError::invalid_argument("at least one address is required"));
        }
        if entries.len() > MAX_ADDRESSES {
            return Err(HandlerError::invalid_argument(format!(
                "at most {MAX_ADDRESSES} addresses per request"
            )));
        }

        info!("Multichain lookup for {} addresses", entries.len());
        let outcomes = join_all(
            entries
                .iter()
                .map(|entry| fetch_balance(&self.ctx, entry.chain, &entry.address)),
        )
        .await;

        let report = merge_outcomes(&entries, outcomes);
        if report["failed"] != 0 {
            warn!("{} of {} balance lookups failed", report["failed"], report["total"]);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ids() {
        let ids = vec![" Bitcoin ".to_string(), "ethereum".to_string(), "bitcoin".to_string()];
        assert_eq!(normalize_ids(&ids).unwrap(), vec!["bitcoin", "ethereum"]);
        assert!(normalize_ids(&[" ".to_string()]).is_err());
    }

    #[test]
    fn test_chain_kind_wire_names() {
        let entry: ChainAddress =
            serde_json::from_value(json!({ "chain": "bitcoin_cash", "address": "qp..." })).unwrap();
        assert_eq!(entry.chain, ChainKind::BitcoinCash);
        let unsupported = json!({ "chain": "polkadot", "address": "x" });
        assert!(serde_json::from_value::<ChainAddress>(unsupported).is_err());
    }

    #[test]
    fn test_merge_outcomes_reports_failures_inline() {
        let entries = vec![
            ChainAddress { chain: ChainKind::Solana, address: "a".to_string() },
            ChainAddress { chain: ChainKind::Ton, address: "b".to_string() },
        ];
        let outcomes = vec![
            Ok(json!({ "balance": "1" })),
            Err(HandlerError::remote(500, "upstream down")),
        ];
        let report = merge_outcomes(&entries, outcomes);
        assert_eq!(report["total"], 2);
        assert_eq!(report["failed"], 1);
        assert_eq!(report["results"][0]["ok"], true);
        assert_eq!(report["results"][1]["chain"], "ton");
        assert!(report["results"][1]["error"].as_str().unwrap().contains("upstream down"));
    }

    #[tokio::test]
    async fn test_invalid_addresses_fail_without_network() {
        use crate::core::config::Config;

        let ctx = ToolContext::new(Arc::new(Config::default())).unwrap();
        let err = fetch_balance(&ctx, ChainKind::Ethereum, "nope").await.unwrap_err();
        assert!(matches!(err, HandlerError::InvalidArgument(_)));
        let err = fetch_balance(&ctx, ChainKind::Cardano, "addr1").await.unwrap_err();
        assert!(matches!(err, HandlerError::MissingCredential(_)));
    }
}
