//! ERC-7677 paymaster methods.

use alloy_primitives::{Address, Bytes, U256};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{Transport, call, deserialize_optional_quantity};
use crate::error::Result;
use crate::user_operation::UserOperation;

/// Result of `pm_getPaymasterStubData` and `pm_getPaymasterData`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterData {
    /// The paymaster contract.
    pub paymaster: Address,

    /// Paymaster-specific data.
    #[serde(default)]
    pub paymaster_data: Bytes,

    /// Paymaster validation gas, if the paymaster knows it.
    #[serde(default, deserialize_with = "deserialize_optional_quantity")]
    pub paymaster_verification_gas_limit: Option<U256>,

    /// Paymaster post-op gas, if the paymaster knows it.
    #[serde(default, deserialize_with = "deserialize_optional_quantity")]
    pub paymaster_post_op_gas_limit: Option<U256>,

    /// Whether the stub data is already final.
    #[serde(default)]
    pub is_final: bool,
}

impl PaymasterData {
    /// Copies the paymaster fields onto a user operation, keeping existing
    /// gas limits when the paymaster does not provide them.
    pub fn apply(&self, user_operation: &mut UserOperation) {
        user_operation.paymaster = Some(self.paymaster);
        user_operation.paymaster_data = Some(self.paymaster_data.clone());
        if let Some(limit) = self.paymaster_verification_gas_limit {
            user_operation.paymaster_verification_gas_limit = Some(limit);
        }
        if let Some(limit) = self.paymaster_post_op_gas_limit {
            user_operation.paymaster_post_op_gas_limit = Some(limit);
        }
    }
}

fn params(
    user_operation: &UserOperation,
    entry_point: Address,
    chain_id: u64,
    context: Option<&Value>,
) -> Value {
    json!([
        user_operation,
        entry_point,
        format!("{chain_id:#x}"),
        context.cloned().unwrap_or_else(|| json!({}))
    ])
}

/// Calls `pm_getPaymasterStubData`.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn get_paymaster_stub_data(
    transport: &(impl Transport + ?Sized),
    user_operation: &UserOperation,
    entry_point: Address,
    chain_id: u64,
    context: Option<&Value>,
) -> Result<PaymasterData> {
    call(
        transport,
        "pm_getPaymasterStubData",
        params(user_operation, entry_point, chain_id, context),
    )
    .await
}

/// Calls `pm_getPaymasterData`.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn get_paymaster_data(
    transport: &(impl Transport + ?Sized),
    user_operation: &UserOperation,
    entry_point: Address,
    chain_id: u64,
    context: Option<&Value>,
) -> Result<PaymasterData> {
    call(
        transport,
        "pm_getPaymasterData",
        params(user_operation, entry_point, chain_id, context),
    )
    .await
}
