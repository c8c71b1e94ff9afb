//! Ethereum / EVM tools (JSON-RPC).
//!
//! Any EVM-compatible endpoint works; the chain is whatever
//! `ETHEREUM_RPC_URL` points at.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::units::{format_units, parse_hex_quantity};
use super::{NoParams, ToolContext, ToolGroup, clean_address};
use crate::domains::tools::handlers::{ChainTool, HandlerError, HandlerResult};
use crate::domains::tools::registry::ToolDescriptor;

/// Wei per ether, as a decimal exponent.
pub const ETH_DECIMALS: u32 = 18;

/// Wei per gwei, as a decimal exponent.
const GWEI_DECIMALS: u32 = 9;

/// Build the Ethereum tool group.
pub fn group(ctx: &Arc<ToolContext>) -> ToolGroup {
    ToolGroup::new("ethereum")
        .with(ToolDescriptor::typed(EthBalanceTool::new(ctx.clone())))
        .with(ToolDescriptor::typed(EthBlockNumberTool::new(ctx.clone())))
        .with(ToolDescriptor::typed(EthGasPriceTool::new(ctx.clone())))
        .with(ToolDescriptor::typed(EthTransactionTool::new(ctx.clone())))
}

/// Check a `0x`-prefixed hex string of exactly `hex_len` digits.
pub fn validate_hex(value: &str, hex_len: usize, what: &str) -> Result<(), HandlerError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| HandlerError::invalid_argument(format!("{what} must start with 0x")))?;
    if digits.len() != hex_len || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(HandlerError::invalid_argument(format!(
            "{what} must be 0x followed by {hex_len} hex digits"
        )));
    }
    Ok(())
}

/// Block tags and hex block numbers accepted by `eth_getBalance`.
fn validate_block(block: &str) -> Result<(), HandlerError> {
    match block {
        "latest" | "earliest" | "pending" | "safe" | "finalized" => Ok(()),
        other => parse_hex_quantity(other)
            .map(|_| ())
            .map_err(HandlerError::invalid_argument),
    }
}

fn hex_result(value: &Value, what: &str) -> Result<u128, HandlerError> {
    let hex = value
        .as_str()
        .ok_or_else(|| HandlerError::unexpected(format!("{what} is not a hex string")))?;
    parse_hex_quantity(hex).map_err(HandlerError::unexpected)
}

/// Fetch the ether balance of `address` at the latest block.
pub async fn fetch_balance(ctx: &ToolContext, address: &str) -> HandlerResult {
    fetch_balance_at(ctx, address, "latest").await
}

async fn fetch_balance_at(ctx: &ToolContext, address: &str, block: &str) -> HandlerResult {
    let address = clean_address(address)?;
    validate_hex(address, 40, "address")?;
    validate_block(block)?;

    let result = ctx
        .rpc
        .json_rpc(
            &ctx.config.chains.ethereum_rpc_url,
            "eth_getBalance",
            json!([address, block]),
        )
        .await?;
    let wei = hex_result(&result, "balance")?;

    Ok(json!({
        "chain": "ethereum",
        "address": address,
        "block": block,
        "wei": wei.to_string(),
        "balance": format_units(wei, ETH_DECIMALS),
        "symbol": "ETH",
    }))
}

/// Reduce an `eth_getTransactionByHash` result to readable fields.
pub fn summarize_transaction(hash: &str, tx: &Value) -> HandlerResult {
    if tx.is_null() {
        return Err(HandlerError::unexpected(format!("transaction {hash} not found")));
    }

    let quantity = |field: &str| -> Result<Option<u128>, HandlerError> {
        match tx.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => hex_result(v, field).map(Some),
        }
    };
    let value = quantity("value")?.unwrap_or(0);

    Ok(json!({
        "hash": hash,
        "from": tx.get("from"),
        "to": tx.get("to"),
        "value": format_units(value, ETH_DECIMALS),
        "nonce": quantity("nonce")?.map(|n| n.to_string()),
        "blockNumber": quantity("blockNumber")?.map(|n| n.to_string()),
        "pending": tx.get("blockNumber").is_none_or(Value::is_null),
    }))
}

// ============================================================================
// eth_get_balance
// ============================================================================

fn default_block() -> String {
    "latest".to_string()
}

/// Parameters for balance lookup.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EthBalanceParams {
    /// 0x-prefixed account address.
    #[schemars(description = "0x-prefixed account address")]
    pub address: String,

    /// Block tag or hex block number (default: latest).
    #[schemars(description = "Block tag (latest, pending, finalized, ...) or hex block number")]
    #[serde(default = "default_block")]
    pub block: String,
}

/// Ether balance lookup.
#[derive(Debug, Clone)]
pub struct EthBalanceTool {
    ctx: Arc<ToolContext>,
}

impl EthBalanceTool {
    pub const NAME: &'static str = "eth_get_balance";
    pub const DESCRIPTION: &'static str =
        "Get the ETH balance of an address, optionally at a given block. Returns wei and ETH.";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for EthBalanceTool {
    type Params = EthBalanceParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, params: Self::Params) -> HandlerResult {
        info!("ETH balance lookup: {} @ {}", params.address, params.block);
        fetch_balance_at(&self.ctx, &params.address, &params.block).await
    }
}

// ============================================================================
// eth_block_number
// ============================================================================

/// Latest block number.
#[derive(Debug, Clone)]
pub struct EthBlockNumberTool {
    ctx: Arc<ToolContext>,
}

impl EthBlockNumberTool {
    pub const NAME: &'static str = "eth_block_number";
    pub const DESCRIPTION: &'static str = "Get the latest block number.";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for EthBlockNumberTool {
    type Params = NoParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, _params: Self::Params) -> HandlerResult {
        let result = self
            .ctx
            .rpc
            .json_rpc(&self.ctx.config.chains.ethereum_rpc_url, "eth_blockNumber", json!([]))
            .await?;
        let number = hex_result(&result, "block number")?;
        Ok(json!({ "chain": "ethereum", "blockNumber": number.to_string() }))
    }
}

// ============================================================================
// eth_gas_price
// ============================================================================

/// Current gas price.
#[derive(Debug, Clone)]
pub struct EthGasPriceTool {
    ctx: Arc<ToolContext>,
}

impl EthGasPriceTool {
    pub const NAME: &'static str = "eth_gas_price";
    pub const DESCRIPTION: &'static str = "Get the current gas price in wei and gwei.";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for EthGasPriceTool {
    type Params = NoParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, _params: Self::Params) -> HandlerResult {
        let result = self
            .ctx
            .rpc
            .json_rpc(&self.ctx.config.chains.ethereum_rpc_url, "eth_gasPrice", json!([]))
            .await?;
        let wei = hex_result(&result, "gas price")?;
        Ok(json!({
            "chain": "ethereum",
            "wei": wei.to_string(),
            "gwei": format_units(wei, GWEI_DECIMALS),
        }))
    }
}

// ============================================================================
// eth_get_transaction
// ============================================================================

/// Parameters for transaction lookup.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TxHashParams {
    /// 0x-prefixed transaction hash.
    #[schemars(description = "0x-prefixed 32-byte transaction hash")]
    pub hash: String,
}

/// Transaction lookup by hash.
#[derive(Debug, Clone)]
pub struct EthTransactionTool {
    ctx: Arc<ToolContext>,
}

impl EthTransactionTool {
    pub const NAME: &'static str = "eth_get_transaction";
    pub const DESCRIPTION: &'static str =
        "Look up a transaction by hash. Returns sender, recipient, value in ETH, nonce and block.";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for EthTransactionTool {
    type Params = TxHashParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, params: Self::Params) -> HandlerResult {
        let hash = params.hash.trim();
        validate_hex(hash, 64, "transaction hash")?;

        let tx = self
            .ctx
            .rpc
            .json_rpc(
                &self.ctx.config.chains.ethereum_rpc_url,
                "eth_getTransactionByHash",
                json!([hash]),
            )
            .await?;
        summarize_transaction(hash, &tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_hex_address() {
        assert!(validate_hex("0x742d35Cc6634C0532925a3b844Bc454e4438f44e", 40, "address").is_ok());
        assert!(validate_hex("742d35Cc6634C0532925a3b844Bc454e4438f44e", 40, "address").is_err());
        assert!(validate_hex("0x742d", 40, "address").is_err());
        assert!(validate_hex("0xZZ2d35Cc6634C0532925a3b844Bc454e4438f44e", 40, "address").is_err());
    }

    #[test]
    fn test_validate_block() {
        assert!(validate_block("latest").is_ok());
        assert!(validate_block("0x10").is_ok());
        assert!(validate_block("yesterday").is_err());
    }

    #[test]
    fn test_summarize_transaction() {
        let tx = json!({
            "from": "0xaaa",
            "to": "0xbbb",
            "value": "0xde0b6b3a7640000",
            "nonce": "0x2",
            "blockNumber": "0x10"
        });
        let summary = summarize_transaction("0xhash", &tx).unwrap();
        assert_eq!(summary["value"], "1");
        assert_eq!(summary["nonce"], "2");
        assert_eq!(summary["blockNumber"], "16");
        assert_eq!(summary["pending"], false);
    }

    #[test]
    fn test_summarize_pending_and_missing() {
        let pending = json!({
            "from": "0xaaa", "to": null, "value": "0x0", "nonce": "0x0", "blockNumber": null
        });
        let summary = summarize_transaction("0xhash", &pending).unwrap();
        assert_eq!(summary["pending"], true);
        assert!(summary["blockNumber"].is_null());

        assert!(summarize_transaction("0xhash", &Value::Null).is_err());
    }

    #[test]
    fn test_hex_result_rejects_non_string() {
        assert!(matches!(
            hex_result(&json!(5), "balance").unwrap_err(),
            HandlerError::UnexpectedResponse(_)
        ));
    }
}
