//! XRP Ledger tools (rippled JSON-RPC).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use super::rpc::integer_field;
use super::units::format_units;
use super::{AddressParams, NoParams, ToolContext, ToolGroup, clean_address};
use crate::domains::tools::handlers::{ChainTool, HandlerError, HandlerResult};
use crate::domains::tools::registry::ToolDescriptor;

/// Drops per XRP.
pub const XRP_DECIMALS: u32 = 6;

/// Build the Ripple tool group.
pub fn group(ctx: &Arc<ToolContext>) -> ToolGroup {
    ToolGroup::new("ripple")
        .with(ToolDescriptor::typed(XrpBalanceTool::new(ctx.clone())))
        .with(ToolDescriptor::typed(XrpLedgerIndexTool::new(ctx.clone())))
}

/// rippled reports failures inside `result` with `status: "error"` rather
/// than as a JSON-RPC error object.
pub fn check_status(result: Value) -> HandlerResult {
    if result.get("status").and_then(Value::as_str) == Some("error") {
        let code = result.get("error_code").and_then(Value::as_i64).unwrap_or(0);
        let message = result
            .get("error_message")
            .or_else(|| result.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(HandlerError::remote(code, message));
    }
    Ok(result)
}

/// Classic addresses are base58 (ripple alphabet) and start with `r`.
pub fn validate_classic_address(address: &str) -> Result<(), HandlerError> {
    if !address.starts_with('r') || !(25..=35).contains(&address.len()) {
        return Err(HandlerError::invalid_argument(
            "XRP account must be a classic address starting with 'r'",
        ));
    }
    if !address.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(HandlerError::invalid_argument("XRP account must be alphanumeric"));
    }
    Ok(())
}

/// Fetch the XRP balance of `address` on the last validated ledger.
pub async fn fetch_balance(ctx: &ToolContext, address: &str) -> HandlerResult {
    let address = clean_address(address)?;
    validate_classic_address(address)?;

    let result = ctx
        .rpc
        .json_rpc(
            &ctx.config.chains.xrp_rpc_url,
            "account_info",
            json!([{ "account": address, "ledger_index": "validated" }]),
        )
        .await?;
    let result = check_status(result)?;
    let account_data = result
        .get("account_data")
        .ok_or_else(|| HandlerError::unexpected("account_info has no account_data"))?;
    let drops = integer_field(account_data, "Balance")?;

    Ok(json!({
        "chain": "xrp",
        "address": address,
        "drops": drops.to_string(),
        "balance": format_units(drops, XRP_DECIMALS),
        "symbol": "XRP",
        "ledgerIndex": result.get("ledger_index"),
    }))
}

/// XRP balance lookup.
#[derive(Debug, Clone)]
pub struct XrpBalanceTool {
    ctx: Arc<ToolContext>,
}

impl XrpBalanceTool {
    pub const NAME: &'static str = "xrp_get_balance";
    pub const DESCRIPTION: &'static str =
        "Get the XRP balance of a classic address on the last validated ledger.";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for XrpBalanceTool {
    type Params = AddressParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, params: Self::Params) -> HandlerResult {
        info!("XRP balance lookup: {}", params.address);
        fetch_balance(&self.ctx, &params.address).await
    }
}

/// Current open ledger index.
#[derive(Debug, Clone)]
pub struct XrpLedgerIndexTool {
    ctx: Arc<ToolContext>,
}

impl XrpLedgerIndexTool {
    pub const NAME: &'static str = "xrp_get_ledger_index";
    pub const DESCRIPTION: &'static str = "Get the index of the current in-progress XRP ledger.";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for XrpLedgerIndexTool {
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
            .json_rpc(&self.ctx.config.chains.xrp_rpc_url, "ledger_current", json!([{}]))
            .await?;
        let result = check_status(result)?;
        let index = integer_field(&result, "ledger_current_index")?;
        Ok(json!({ "chain": "xrp", "ledgerCurrentIndex": index.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_status_error() {
        let err = check_status(json!({
            "status": "error",
            "error": "actNotFound",
            "error_code": 19,
            "error_message": "Account not found."
        }))
        .unwrap_err();
        match err {
            HandlerError::Remote { code, message } => {
                assert_eq!(code, 19);
                assert_eq!(message, "Account not found.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_check_status_success() {
        let response = json!({ "status": "success", "ledger_current_index": 7 });
        let result = check_status(response).unwrap();
        assert_eq!(integer_field(&result, "ledger_current_index").unwrap(), 7);
    }

    #[test]
    fn test_validate_classic_address() {
        assert!(validate_classic_address("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh").is_ok());
        assert!(
            validate_classic_address("XVLhHMPHU98es4dbozjVtdWzVrDjtV18pX8yuPT7y4xaEHi").is_err()
        );
        assert!(validate_classic_address("r!!").is_err());
    }

    #[test]
    fn test_drops_to_xrp() {
        assert_eq!(format_units(25_500_000, XRP_DECIMALS), "25.5");
    }
}
