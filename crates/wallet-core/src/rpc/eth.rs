//! Standard `eth_*` node methods.

use alloy_primitives::{Address, Bytes, U256};
use serde_json::json;

use super::{Transport, call};
use crate::error::{Error, Result};

/// Calls `eth_chainId`.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn chain_id(transport: &(impl Transport + ?Sized)) -> Result<u64> {
    let id: U256 = call(transport, "eth_chainId", json!([])).await?;
    u64::try_from(id)
        .map_err(|_| Error::MalformedResponse(format!("eth_chainId: {id} out of range")))
}

/// Calls `eth_getCode` at the latest block. A missing result reads as empty
/// code.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn get_code(transport: &(impl Transport + ?Sized), address: Address) -> Result<Bytes> {
    let code: Option<Bytes> = call(transport, "eth_getCode", json!([address, "latest"])).await?;
    Ok(code.unwrap_or_default())
}

/// Calls `eth_call` against `to` at the latest block.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn eth_call(
    transport: &(impl Transport + ?Sized),
    to: Address,
    data: &Bytes,
) -> Result<Bytes> {
    call(
        transport,
        "eth_call",
        json!([{ "to": to, "data": data }, "latest"]),
    )
    .await
}

/// Calls `eth_gasPrice`.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn gas_price(transport: &(impl Transport + ?Sized)) -> Result<U256> {
    call(transport, "eth_gasPrice", json!([])).await
}

/// Calls `eth_maxPriorityFeePerGas`.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn max_priority_fee_per_gas(transport: &(impl Transport + ?Sized)) -> Result<U256> {
    call(transport, "eth_maxPriorityFeePerGas", json!([])).await
}
