//! TON tools (Toncenter v2 HTTP API).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use super::units::format_units;
use super::{AddressParams, ToolContext, ToolGroup, clean_address};
use crate::domains::tools::handlers::{ChainTool, HandlerError, HandlerResult};
use crate::domains::tools::registry::ToolDescriptor;

/// Nanotons per TON.
pub const TON_DECIMALS: u32 = 9;

/// Build the TON tool group.
pub fn group(ctx: &Arc<ToolContext>) -> ToolGroup {
    ToolGroup::new("ton")
        .with(ToolDescriptor::typed(TonBalanceTool::new(ctx.clone())))
        .with(ToolDescriptor::typed(TonAddressStateTool::new(ctx.clone())))
}

/// Unwrap a Toncenter `{ ok, result }` envelope.
pub fn toncenter_result(response: Value) -> HandlerResult {
    let ok = response.get("ok").and_then(Value::as_bool);
    match ok {
        Some(true) => match response {
            Value::Object(mut map) => map
                .remove("result")
                .ok_or_else(|| HandlerError::unexpected("toncenter response has no result")),
            _ => Err(HandlerError::unexpected("toncenter response is not an object")),
        },
        Some(false) => {
            let code = response.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = response
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Err(HandlerError::remote(code, message))
        }
        None => Err(HandlerError::unexpected("toncenter response has no ok flag")),
    }
}

async fn toncenter_get(ctx: &ToolContext, method: &str, address: &str) -> HandlerResult {
    let url = format!("{}/{}", ctx.config.chains.toncenter_api_url, method);
    let api_key = ctx.config.chains.toncenter_api_key.as_deref();
    let headers: Vec<(&'static str, &str)> =
        api_key.map(|k| ("x-api-key", k)).into_iter().collect();

    let response = ctx
        .rpc
        .get_json(&url, &[("address", address)], &headers)
        .await?;
    toncenter_result(response)
}

/// Fetch the TON balance of `address`.
pub async fn fetch_balance(ctx: &ToolContext, address: &str) -> HandlerResult {
    let address = clean_address(address)?;
    let result = toncenter_get(ctx, "getAddressBalance", address).await?;
    let nanotons: u128 = match &result {
        Value::String(s) => s
            .parse()
            .map_err(|_| HandlerError::unexpected(format!("balance is not an integer: {s}")))?,
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| HandlerError::unexpected("balance is not an unsigned integer"))?,
        other => return Err(HandlerError::unexpected(format!("unexpected balance: {other}"))),
    };

    Ok(json!({
        "chain": "ton",
        "address": address,
        "nanotons": nanotons.to_string(),
        "balance": format_units(nanotons, TON_DECIMALS),
        "symbol": "TON",
    }))
}

/// TON balance lookup.
#[derive(Debug, Clone)]
pub struct TonBalanceTool {
    ctx: Arc<ToolContext>,
}

impl TonBalanceTool {
    pub const NAME: &'static str = "ton_get_balance";
    pub const DESCRIPTION: &'static str = "Get the TON balance of an address (nanotons and TON).";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for TonBalanceTool {
    type Params = AddressParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, params: Self::Params) -> HandlerResult {
        info!("TON balance lookup: {}", params.address);
        fetch_balance(&self.ctx, &params.address).await
    }
}

/// Account state lookup (active, uninit, frozen).
#[derive(Debug, Clone)]
pub struct TonAddressStateTool {
    ctx: Arc<ToolContext>,
}

impl TonAddressStateTool {
    pub const NAME: &'static str = "ton_get_address_state";
    pub const DESCRIPTION: &'static str =
        "Get the state of a TON account: active, uninit (never deployed) or frozen.";

    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainTool for TonAddressStateTool {
    type Params = AddressParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn execute(&self, params: Self::Params) -> HandlerResult {
        let address = clean_address(&params.address)?;
        let state = toncenter_get(&self.ctx, "getAddressState", address).await?;
        Ok(json!({ "chain": "ton", "address": address, "state": state }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toncenter_ok() {
        let result = toncenter_result(json!({ "ok": true, "result": "1500000000" })).unwrap();
        assert_eq!(result, "1500000000");
    }

    #[test]
    fn test_toncenter_error() {
        let err = toncenter_result(json!({
            "ok": false,
            "error": "Incorrect address",
            "code": 416
        }))
        .unwrap_err();
        assert!(matches!(err, HandlerError::Remote { code: 416, .. }));
    }

    #[test]
    fn test_toncenter_malformed() {
        assert!(matches!(
            toncenter_result(json!({ "result": 1 })).unwrap_err(),
            HandlerError::UnexpectedResponse(_)
        ));
    }
}
