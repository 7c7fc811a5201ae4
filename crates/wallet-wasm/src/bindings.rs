//! Stateless helpers exported to JavaScript.
//!
//! Hex strings are `0x`-prefixed on output and accepted with or without the
//! prefix on input.

use std::str::FromStr;

use alloy_primitives::{Address, B256};
use modular_wallet_core::Call;
use modular_wallet_core::address::public_key_params;
use modular_wallet_core::config::ReplaySafeDomain;
use modular_wallet_core::replay_safe::{ReplaySafeHashParams, to_replay_safe_hash};
use modular_wallet_core::signature::{wrap_eoa_signature, wrap_signature};
use wasm_bindgen::prelude::*;

use crate::error::{WasmError, WasmResult};

fn decode_hex(value: &str) -> WasmResult<Vec<u8>> {
    let value = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(value).map_err(|e| WasmError::InvalidInput(format!("hex: {e}")))
}

fn parse_address(value: &str) -> WasmResult<Address> {
    Address::from_str(value).map_err(|e| WasmError::InvalidInput(format!("address: {e}")))
}

fn parse_b256(value: &str) -> WasmResult<B256> {
    B256::from_str(value).map_err(|e| WasmError::InvalidInput(format!("bytes32: {e}")))
}

/// Returns the sender id of a passkey: `keccak256(abi.encode(x, y))`.
///
/// # Arguments
///
/// * `public_key` - SEC1 or SPKI encoded P-256 public key, hex.
///
/// # Errors
///
/// Returns an error if the key does not parse.
#[wasm_bindgen(js_name = "getSender")]
pub fn get_sender(public_key: &str) -> WasmResult<String> {
    let params = public_key_params(&decode_hex(public_key)?)?;
    Ok(params.sender.to_string())
}

/// Computes the replay-safe hash the multisig plugin validates.
///
/// # Arguments
///
/// * `account` - The smart account address.
/// * `chain_id` - The chain the signature is valid on.
/// * `plugin` - The weighted multisig plugin address.
/// * `hash` - The 32-byte hash being signed.
///
/// # Errors
///
/// Returns an error if an argument does not parse.
#[wasm_bindgen(js_name = "toReplaySafeHash")]
pub fn replay_safe_hash(
    account: &str,
    chain_id: u64,
    plugin: &str,
    hash: &str,
) -> WasmResult<String> {
    let params = ReplaySafeHashParams {
        account: parse_address(account)?,
        chain_id,
        plugin: parse_address(plugin)?,
        hash: parse_b256(hash)?,
    };
    Ok(to_replay_safe_hash(&ReplaySafeDomain::default(), &params).to_string())
}

/// Encodes calls as account calldata.
///
/// One call encodes as `execute`, any other number as `executeBatch`.
///
/// # Arguments
///
/// * `calls` - JSON array of `{ to, value?, data? }`.
///
/// # Errors
///
/// Returns an error if the JSON does not parse.
///
/// # Example
///
/// ```javascript
/// const calldata = encodeCalls(JSON.stringify([{ to: "0x...", value: "0x1" }]));
/// ```
#[wasm_bindgen(js_name = "encodeCalls")]
pub fn encode_calls(calls: &str) -> WasmResult<String> {
    let calls: Vec<Call> =
        serde_json::from_str(calls).map_err(|e| WasmError::InvalidInput(format!("calls: {e}")))?;
    Ok(modular_wallet_core::encode_calls(&calls).to_string())
}

/// Wraps a signature in the plugin's contract signature layout.
///
/// # Arguments
///
/// * `sender` - The signer's 32-byte sender id.
/// * `signature` - The inner signature, hex.
/// * `has_user_op_gas` - Whether the signature validates a user operation.
///
/// # Errors
///
/// Returns an error if an argument does not parse.
#[wasm_bindgen(js_name = "wrapSignature")]
pub fn wrap_contract_signature(
    sender: &str,
    signature: &str,
    has_user_op_gas: bool,
) -> WasmResult<String> {
    let wrapped = wrap_signature(parse_b256(sender)?, &decode_hex(signature)?, has_user_op_gas);
    Ok(wrapped.to_string())
}

/// Rewrites a 65-byte `r ‖ s ‖ v` signature into the plugin's EOA layout.
///
/// # Errors
///
/// Returns an error if the signature is not 65 bytes.
#[wasm_bindgen(js_name = "wrapEoaSignature")]
pub fn wrap_eoa(signature: &str, has_user_op_gas: bool) -> WasmResult<String> {
    Ok(wrap_eoa_signature(&decode_hex(signature)?, has_user_op_gas)?.to_string())
}
