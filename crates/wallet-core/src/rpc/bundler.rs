//! ERC-4337 bundler methods.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Transport, call, deserialize_optional_quantity, deserialize_quantity};
use crate::error::Result;
use crate::user_operation::UserOperation;

/// Result of `eth_estimateUserOperationGas`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    /// Bundler overhead gas.
    #[serde(deserialize_with = "deserialize_quantity")]
    pub pre_verification_gas: U256,

    /// Account validation gas.
    #[serde(deserialize_with = "deserialize_quantity")]
    pub verification_gas_limit: U256,

    /// Main call gas.
    #[serde(deserialize_with = "deserialize_quantity")]
    pub call_gas_limit: U256,

    /// Paymaster validation gas, when a paymaster is set.
    #[serde(default, deserialize_with = "deserialize_optional_quantity")]
    pub paymaster_verification_gas_limit: Option<U256>,

    /// Paymaster post-op gas, when a paymaster is set.
    #[serde(default, deserialize_with = "deserialize_optional_quantity")]
    pub paymaster_post_op_gas_limit: Option<U256>,
}

impl GasEstimate {
    /// Copies the estimated limits onto a user operation.
    pub fn apply(&self, user_operation: &mut UserOperation) {
        user_operation.pre_verification_gas = self.pre_verification_gas;
        user_operation.verification_gas_limit = self.verification_gas_limit;
        user_operation.call_gas_limit = self.call_gas_limit;
        if user_operation.paymaster.is_some() {
            if let Some(limit) = self.paymaster_verification_gas_limit {
                user_operation.paymaster_verification_gas_limit = Some(limit);
            }
            if let Some(limit) = self.paymaster_post_op_gas_limit {
                user_operation.paymaster_post_op_gas_limit = Some(limit);
            }
        }
    }
}

/// A log emitted during user operation execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics.
    #[serde(default)]
    pub topics: Vec<B256>,
    /// Unindexed data.
    #[serde(default)]
    pub data: alloy_primitives::Bytes,
}

/// Result of `eth_getUserOperationReceipt`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    /// The user operation hash.
    pub user_op_hash: B256,
    /// The account.
    pub sender: Address,
    /// The nonce the operation consumed.
    #[serde(deserialize_with = "deserialize_quantity")]
    pub nonce: U256,
    /// The paymaster, if any.
    #[serde(default)]
    pub paymaster: Option<Address>,
    /// Gas cost charged.
    #[serde(deserialize_with = "deserialize_quantity")]
    pub actual_gas_cost: U256,
    /// Gas used.
    #[serde(deserialize_with = "deserialize_quantity")]
    pub actual_gas_used: U256,
    /// Whether the execution succeeded.
    pub success: bool,
    /// Revert reason, if any.
    #[serde(default)]
    pub reason: Option<String>,
    /// Logs emitted by the operation.
    #[serde(default)]
    pub logs: Vec<Log>,
    /// The bundle transaction receipt.
    #[serde(default)]
    pub receipt: Value,
}

/// Calls `eth_estimateUserOperationGas`.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn estimate_user_operation_gas(
    transport: &(impl Transport + ?Sized),
    user_operation: &UserOperation,
    entry_point: Address,
) -> Result<GasEstimate> {
    call(
        transport,
        "eth_estimateUserOperationGas",
        json!([user_operation, entry_point]),
    )
    .await
}

/// Calls `eth_sendUserOperation`, returning the user operation hash.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn send_user_operation(
    transport: &(impl Transport + ?Sized),
    user_operation: &UserOperation,
    entry_point: Address,
) -> Result<B256> {
    call(
        transport,
        "eth_sendUserOperation",
        json!([user_operation, entry_point]),
    )
    .await
}

/// Calls `eth_getUserOperationReceipt`. Returns `None` while the operation is
/// pending.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn get_user_operation_receipt(
    transport: &(impl Transport + ?Sized),
    hash: B256,
) -> Result<Option<UserOperationReceipt>> {
    call(transport, "eth_getUserOperationReceipt", json!([hash])).await
}

/// Calls `eth_supportedEntryPoints`.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn supported_entry_points(transport: &(impl Transport + ?Sized)) -> Result<Vec<Address>> {
    call(transport, "eth_supportedEntryPoints", json!([])).await
}
