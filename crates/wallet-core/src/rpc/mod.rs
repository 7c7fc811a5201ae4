//! JSON-RPC plumbing and typed wrappers for the external APIs.
//!
//! The [`Transport`] trait is the seam between the SDK and the network. The
//! HTTP implementation lives in [`http`]; tests script responses with an
//! in-memory transport.
//!
//! Typed wrappers are grouped by API:
//!
//! | Module | Methods |
//! |---|---|
//! | [`modular_wallet`] | `circle_getAddress`, `circle_createAddressMapping`, `circle_getAddressMapping`, `circle_getUserOperationGasPrice` |
//! | [`relying_party`] | `rp_getRegistrationOptions`, `rp_getRegistrationVerification`, `rp_getLoginOptions`, `rp_getLoginVerification` |
//! | [`eth`] | `eth_chainId`, `eth_getCode`, `eth_call`, `eth_gasPrice`, `eth_maxPriorityFeePerGas` |
//! | [`bundler`] | `eth_estimateUserOperationGas`, `eth_sendUserOperation`, `eth_getUserOperationReceipt` |
//! | [`paymaster`] | `pm_getPaymasterStubData`, `pm_getPaymasterData` |

pub mod bundler;
pub mod eth;
pub mod http;
pub mod modular_wallet;
pub mod paymaster;
pub mod relying_party;

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::U256;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result, RpcError};

/// The API a transport talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// The modular wallet backend: serves `circle_*`, `rp_*` and the
    /// bundler/node methods, and validates account addresses.
    ModularWallet,

    /// Any other JSON-RPC endpoint.
    Generic,
}

/// Sends JSON-RPC requests.
///
/// Implementations return the `result` member of a successful response and
/// map `error` members to [`Error::Rpc`].
#[async_trait(?Send)]
pub trait Transport: fmt::Debug {
    /// Sends `method` with positional `params` and returns the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] for JSON-RPC errors and [`Error::Http`] or
    /// [`Error::Transport`] for transport failures.
    async fn request(&self, method: &str, params: Value) -> Result<Value>;

    /// The API this transport talks to.
    fn kind(&self) -> TransportKind {
        TransportKind::Generic
    }
}

#[async_trait(?Send)]
impl<T: Transport + ?Sized> Transport for Rc<T> {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        (**self).request(method, params).await
    }

    fn kind(&self) -> TransportKind {
        (**self).kind()
    }
}

/// Sends a request and deserializes its result.
///
/// # Errors
///
/// Returns the transport's error, or [`Error::MalformedResponse`] if the
/// result does not have the expected shape.
pub async fn call<R: DeserializeOwned>(
    transport: &(impl Transport + ?Sized),
    method: &str,
    params: Value,
) -> Result<R> {
    let value = transport.request(method, params).await?;
    serde_json::from_value(value).map_err(|e| Error::MalformedResponse(format!("{method}: {e}")))
}

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: String,

    /// Request id.
    pub id: u64,

    /// Method name.
    pub method: String,

    /// Positional parameters.
    pub params: Value,
}

impl JsonRpcRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    /// Echoed request id.
    #[serde(default)]
    pub id: Option<Value>,

    /// Result on success.
    #[serde(default)]
    pub result: Option<Value>,

    /// Error on failure.
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl JsonRpcResponse {
    /// Extracts the result, turning an `error` member into [`Error::Rpc`].
    ///
    /// A missing `result` is read as `null`, which is how `eth_getCode` style
    /// lookups report absence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] if the response carries an error.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::Rpc(error)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Monotonic JSON-RPC request ids.
#[derive(Debug, Default)]
pub struct RequestIds(AtomicU64);

impl RequestIds {
    /// Returns the next id, starting at 1.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Deserializes a quantity given as a hex string, a decimal string or a JSON
/// number.
///
/// # Errors
///
/// Fails if the value is none of those.
pub fn deserialize_quantity<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> core::result::Result<U256, D::Error> {
    use serde::de::Error as _;

    match Value::deserialize(deserializer)? {
        Value::String(s) => U256::from_str(&s).map_err(D::Error::custom),
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| D::Error::custom(format!("invalid quantity: {n}"))),
        other => Err(D::Error::custom(format!("invalid quantity: {other}"))),
    }
}

/// Optional variant of [`deserialize_quantity`].
///
/// # Errors
///
/// Fails if the value is present and not a quantity.
pub fn deserialize_optional_quantity<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> core::result::Result<Option<U256>, D::Error> {
    use serde::de::Error as _;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => U256::from_str(&s).map(Some).map_err(D::Error::custom),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|n| Some(U256::from(n)))
            .ok_or_else(|| D::Error::custom(format!("invalid quantity: {n}"))),
        Some(other) => Err(D::Error::custom(format!("invalid quantity: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::RpcErrorCode;

    #[test]
    fn request_envelope() {
        let request = JsonRpcRequest::new(7, "eth_chainId", json!([]));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"jsonrpc": "2.0", "id": 7, "method": "eth_chainId", "params": []})
        );
    }

    #[test]
    fn response_error_is_typed() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 155_614, "message": "mapping already exists"}
        }))
        .unwrap();

        let error = response.into_result().unwrap_err();
        assert_eq!(error.rpc_code(), Some(RpcErrorCode::AddressMappingAlreadyExists));
    }

    #[test]
    fn missing_result_is_null() {
        let response: JsonRpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1})).unwrap();
        assert_eq!(response.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn request_ids_increase() {
        let ids = RequestIds::default();
        assert_eq!(ids.next(), 1);
        assert_eq!(ids.next(), 2);
    }

    #[derive(Deserialize)]
    struct Quantities {
        #[serde(deserialize_with = "deserialize_quantity")]
        hex: U256,
        #[serde(deserialize_with = "deserialize_quantity")]
        decimal: U256,
        #[serde(deserialize_with = "deserialize_quantity")]
        number: U256,
        #[serde(default, deserialize_with = "deserialize_optional_quantity")]
        missing: Option<U256>,
    }

    #[test]
    fn quantities_accept_all_encodings() {
        let q: Quantities =
            serde_json::from_value(json!({"hex": "0x10", "decimal": "16", "number": 16})).unwrap();
        assert_eq!(q.hex, U256::from(16));
        assert_eq!(q.decimal, U256::from(16));
        assert_eq!(q.number, U256::from(16));
        assert_eq!(q.missing, None);
    }
}
