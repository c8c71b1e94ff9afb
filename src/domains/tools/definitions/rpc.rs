//! HTTP client shared by the chain tools.
//!
//! Wraps a single `reqwest::Client` (connection pool, timeout) and provides
//! the three request shapes the chain APIs need: JSON-RPC 2.0 calls, plain
//! JSON POSTs and JSON GETs.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::domains::tools::handlers::HandlerError;

/// Shared chain RPC client.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
}

impl RpcClient {
    /// Create a client with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, HandlerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("web3-mcp-server/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// Call a JSON-RPC 2.0 method and return its `result`.
    #[instrument(skip(self, params))]
    pub async fn json_rpc(
        &self,
        url: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, HandlerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self.post_json(url, &body).await?;
        parse_json_rpc_response(response)
    }

    /// POST a JSON body and decode the JSON answer.
    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value, HandlerError> {
        debug!("POST {}", url);
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// GET a URL with optional query parameters and headers and decode the
    /// JSON answer.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&'static str, &str)],
    ) -> Result<Value, HandlerError> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .query(query)
            .headers(header_map(headers)?)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

fn header_map(headers: &[(&'static str, &str)]) -> Result<HeaderMap, HandlerError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let value = HeaderValue::from_str(value)
            .map_err(|e| HandlerError::invalid_argument(format!("header {name}: {e}")))?;
        map.insert(HeaderName::from_static(name), value);
    }
    Ok(map)
}

/// Extract `result` from a JSON-RPC 2.0 response, turning `error` objects
/// into [`HandlerError::Remote`].
pub fn parse_json_rpc_response(response: Value) -> Result<Value, HandlerError> {
    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(HandlerError::remote(code, message));
    }

    match response {
        Value::Object(mut map) => map
            .remove("result")
            .ok_or_else(|| HandlerError::unexpected("JSON-RPC response has no result")),
        other => Err(HandlerError::unexpected(format!(
            "expected a JSON-RPC object, got {other}"
        ))),
    }
}

/// Read a string field that may hold a decimal integer or a JSON number.
pub fn integer_field(value: &Value, field: &str) -> Result<u128, HandlerError> {
    match value.get(field) {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| HandlerError::unexpected(format!("{field} is not an unsigned integer"))),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| HandlerError::unexpected(format!("{field} is not an integer: {s}"))),
        _ => Err(HandlerError::unexpected(format!("missing field {field}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_result() {
        let result = parse_json_rpc_response(json!({
            "jsonrpc": "2.0", "id": 1, "result": { "value": 5 }
        }))
        .unwrap();
        assert_eq!(result["value"], 5);
    }

    #[test]
    fn test_parse_error_object() {
        let err = parse_json_rpc_response(json!({
            "jsonrpc": "2.0", "id": 1,
            "error": { "code": -32602, "message": "invalid address" }
        }))
        .unwrap_err();
        match err {
            HandlerError::Remote { code, message } => {
                assert_eq!(code, -32602);
                assert_eq!(message, "invalid address");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_null_error_is_ignored() {
        let result =
            parse_json_rpc_response(json!({ "error": null, "result": "0x1" })).unwrap();
        assert_eq!(result, "0x1");
    }

    #[test]
    fn test_parse_missing_result() {
        let err = parse_json_rpc_response(json!({ "jsonrpc": "2.0", "id": 1 })).unwrap_err();
        assert!(matches!(err, HandlerError::UnexpectedResponse(_)));
    }

    #[test]
    fn test_integer_field() {
        let value = json!({ "a": 12, "b": "340282366920938463463374607431768211455", "c": -1 });
        assert_eq!(integer_field(&value, "a").unwrap(), 12);
        assert_eq!(integer_field(&value, "b").unwrap(), u128::MAX);
        assert!(integer_field(&value, "c").is_err());
        assert!(integer_field(&value, "d").is_err());
    }

    #[test]
    fn test_client_builds() {
        assert!(RpcClient::new(Duration::from_secs(5)).is_ok());
    }
}
