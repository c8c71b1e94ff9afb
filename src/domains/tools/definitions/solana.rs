//! Solana tools (JSON-RPC).

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::rpc::integer_field;
use super::units::format_units;
use super::{AddressParams, NoParams, ToolContext, ToolGroup, clean_address};
use crate::domains::tools::handlers::{ChainTool, HandlerError, HandlerResult};
use crate::domains::tools::registry::ToolDescriptor;

/// Lamports per SOL, as a decimal exponent.
pub const SOL_DECIMALS: u32 = 9;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Build the Solana tool group.
pub fn group(ctx: &Arc<ToolContext>) -> ToolGroup {
    ToolGroup::new("solana")
        .with(ToolDescriptor::typed(SolanaBalanceTool::new(ctx.clone())))
        .with(ToolDescriptor::typed(SolanaSlotTool::new(ctx.clone())))
        .with(ToolDescriptor::typed(SolanaTransactionTool::new(ctx.clone())))
}

/// Check that `value` looks like a base58 public key or signature.
pub fn validate_base58(value: &str, min_len: usize, max_len: usize) -> Result<(), HandlerError> {
    if !(min_len..=max_len).contains(&value.len()) {
        return Err(HandlerError::invalid_argument(format!(
            "expected {min_len}-{max_len} base58 characters, got {}",
            value.len()
        )));
    }
    if let Some(bad) = value.chars().find(|c| !BASE58_ALPHABET.contains(*c)) {
        return Err(HandlerError::invalid_argument(format!(
            "invalid base58 character '{bad}'"
        )));
    }
    Ok(())
}

/// Fetch the SOL balance of `address`.
pub async fn fetch_balance(ctx: &ToolContext, address: &str) -> HandlerResult {
    let address = clean_address(address)?;
    validate_base58(address, 32, 44)?;

    let result = ctx
        .rpc
        .json_rpc(&ctx.config.chains.solana_rpc_url, "getBalance", json!([address]))
        .await?;
    let lamports = integer_field(&result, "value")?;
    let slot = result.get("context").and_then(|c| c.get("slot")).cloned();

    Ok(json!({
        "chain": "solana",
        "address": address,
        "lamports": lamports.to_string(),
        "balance": format_units(lamports, SOL_DECIMALS),
        "symbol": "SOL",
        "slot": slot,
    }))
}

/// Reduce a `getTransaction` result to the fields clients care about.
pub fn summarize_transaction(signature: &str, tx: &Value) -> HandlerResult {
    if tx.is_null() {
        return Err(HandlerError::unexpected(format!(
            "transaction {signature} not found"
        )));
    }
    let meta = tx.get("meta").unwrap_or(&Value::Null);
    let status = match meta.get("err") {
        None | Some(Value::Null) => "success",
        Some(_) => "failed",
    };

    Ok(json!({
        "signature": signature,
        "slot": tx.get("slot"),
        "blockTime": tx.get("blockTime"),
        "fee": meta.get("fee"),
        "status": status,
        "error": meta.get("err").filter(|e| !e.is_null()),
    }))
}

// ============================================================================
// solana_get_balance
// ============================================================================

/// SOL balance lookup.
#[derive(Debug, Clone)]
pub struct SolanaBalanceTool {
    ctx: Arc<ToolContext>,
}

impl SolanaBalanceTool {
    pub const NAME: &'static str = "solana_get_balance";
    pub const DESCRIPTION: &'static str =
        "Get the SOL balance of a Solana account. Returns lamports and SOL.";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for SolanaBalanceTool {
    type Params = AddressParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, params: Self::Params) -> HandlerResult {
        info!("Solana balance lookup: {}", params.address);
        fetch_balance(&self.ctx, &params.address).await
    }
}

// ============================================================================
// solana_get_slot
// ============================================================================

/// Current slot of the configured cluster.
#[derive(Debug, Clone)]
pub struct SolanaSlotTool {
    ctx: Arc<ToolContext>,
}

impl SolanaSlotTool {
    pub const NAME: &'static str = "solana_get_slot";
    pub const DESCRIPTION: &'static str = "Get the current slot of the Solana cluster.";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for SolanaSlotTool {
    type Params = NoParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, _params: Self::Params) -> HandlerResult {
        let slot = self
            .ctx
            .rpc
            .json_rpc(&self.ctx.config.chains.solana_rpc_url, "getSlot", json!([]))
            .await?;
        Ok(json!({ "chain": "solana", "slot": slot }))
    }
}

// ============================================================================
// solana_get_transaction
// ============================================================================

/// Parameters for transaction lookup.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SignatureParams {
    /// Base58 transaction signature.
    #[schemars(description = "Base58 transaction signature")]
    pub signature: String,
}

/// Transaction status lookup by signature.
#[derive(Debug, Clone)]
pub struct SolanaTransactionTool {
    ctx: Arc<ToolContext>,
}

impl SolanaTransactionTool {
    pub const NAME: &'static str = "solana_get_transaction";
    pub const DESCRIPTION: &'static str =
        "Look up a Solana transaction by signature. Returns slot, block time, fee and status.";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for SolanaTransactionTool {
    type Params = SignatureParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, params: Self::Params) -> HandlerResult {
        let signature = params.signature.trim();
        validate_base58(signature, 64, 88)?;

        let tx = self
            .ctx
            .rpc
            .json_rpc(
                &self.ctx.config.chains.solana_rpc_url,
                "getTransaction",
                json!([signature, { "encoding": "json", "maxSupportedTransactionVersion": 0 }]),
            )
            .await?;
        summarize_transaction(signature, &tx)
    }
}
