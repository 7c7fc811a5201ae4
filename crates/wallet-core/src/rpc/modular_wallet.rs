//! `circle_*` methods of the modular wallet backend.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Transport, call, deserialize_optional_quantity, deserialize_quantity};
use crate::error::Result;

/// Account implementation identifier reported to the backend.
pub const SCA_CORE: &str = "circle_6900_v1";

/// A weighted EOA owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedOwner {
    /// Owner address.
    pub address: Address,
    /// Voting weight.
    pub weight: u64,
}

/// A weighted P-256 owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedWebAuthnOwner {
    /// Public key x coordinate.
    pub public_key_x: U256,
    /// Public key y coordinate.
    pub public_key_y: U256,
    /// Voting weight.
    pub weight: u64,
}

/// Initial owner set of the weighted multisig plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedMultisig {
    /// EOA owners.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owners: Vec<WeightedOwner>,
    /// P-256 owners.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub webauthn_owners: Vec<WeightedWebAuthnOwner>,
    /// Total weight required to sign.
    pub threshold_weight: u64,
}

/// How ownership of a new account is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialOwnershipConfiguration {
    /// Ownership scheme, always `weightedMultisig`.
    pub ownership_contract_type: String,
    /// Owner set.
    pub weighted_multisig: WeightedMultisig,
}

/// Account configuration sent to `circle_getAddress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaConfiguration {
    /// Initial owner set.
    pub initial_ownership_configuration: InitialOwnershipConfiguration,
    /// Account implementation identifier.
    pub sca_core: String,
}

impl ScaConfiguration {
    /// A weighted multisig configuration for the given owner set.
    #[must_use]
    pub fn weighted_multisig(weighted_multisig: WeightedMultisig) -> Self {
        Self {
            initial_ownership_configuration: InitialOwnershipConfiguration {
                ownership_contract_type: "weightedMultisig".to_string(),
                weighted_multisig,
            },
            sca_core: SCA_CORE.to_string(),
        }
    }
}

/// Optional wallet metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletMetadata {
    /// Display name of the wallet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Parameters of `circle_getAddress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAddressParams {
    /// Account configuration.
    pub sca_configuration: ScaConfiguration,
    /// Wallet metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<WalletMetadata>,
}

/// A wallet record returned by `circle_getAddress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModularWallet {
    /// Wallet id.
    #[serde(default)]
    pub id: String,
    /// Canonical account address.
    pub address: Address,
    /// Blockchain identifier, e.g. `MATIC-AMOY`.
    #[serde(default)]
    pub blockchain: String,
    /// Wallet state.
    #[serde(default)]
    pub state: String,
    /// Account implementation identifier.
    #[serde(default)]
    pub sca_core: String,
    /// Echoed account configuration.
    #[serde(default)]
    pub sca_configuration: Value,
    /// Creation timestamp.
    #[serde(default)]
    pub create_date: String,
    /// Update timestamp.
    #[serde(default)]
    pub update_date: String,
}

/// Calls `circle_getAddress`.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn get_address(
    transport: &(impl Transport + ?Sized),
    params: &GetAddressParams,
) -> Result<ModularWallet> {
    call(transport, "circle_getAddress", json!([params])).await
}

/// A recovery identifier associated with an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "identifier")]
pub enum AddressMappingOwner {
    /// An EOA recovery address.
    #[serde(rename = "EOA")]
    Eoa {
        /// The EOA address.
        address: Address,
    },

    /// A passkey.
    #[serde(rename = "WebAuthn", rename_all = "camelCase")]
    WebAuthn {
        /// Public key x coordinate.
        public_key_x: U256,
        /// Public key y coordinate.
        public_key_y: U256,
    },
}

/// Parameters of `circle_createAddressMapping`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAddressMappingParams {
    /// Account address.
    pub wallet_address: Address,
    /// Identifiers to associate with it.
    pub owners: Vec<AddressMappingOwner>,
}

/// A stored address mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressMapping {
    /// Mapping id.
    #[serde(default)]
    pub id: String,
    /// Blockchain identifier.
    #[serde(default)]
    pub blockchain: String,
    /// Recovery identifier.
    pub owner: AddressMappingOwner,
    /// Account address.
    pub wallet_address: Address,
    /// Creation timestamp.
    #[serde(default)]
    pub create_date: String,
    /// Update timestamp.
    #[serde(default)]
    pub update_date: String,
}

/// Calls `circle_createAddressMapping`.
///
/// A duplicate mapping fails with
/// [`RpcErrorCode::AddressMappingAlreadyExists`](crate::error::RpcErrorCode::AddressMappingAlreadyExists);
/// see [`Error::is_address_mapping_conflict`](crate::error::Error::is_address_mapping_conflict).
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn create_address_mapping(
    transport: &(impl Transport + ?Sized),
    params: &CreateAddressMappingParams,
) -> Result<Vec<AddressMapping>> {
    call(transport, "circle_createAddressMapping", json!([params])).await
}

/// Calls `circle_getAddressMapping` for a recovery identifier.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn get_address_mapping(
    transport: &(impl Transport + ?Sized),
    owner: &AddressMappingOwner,
) -> Result<Vec<AddressMapping>> {
    call(transport, "circle_getAddressMapping", json!([{ "owner": owner }])).await
}

/// One fee tier of `circle_getUserOperationGasPrice`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPriceTier {
    /// Max fee per gas.
    #[serde(deserialize_with = "deserialize_quantity")]
    pub max_fee_per_gas: U256,
    /// Max priority fee per gas.
    #[serde(deserialize_with = "deserialize_quantity")]
    pub max_priority_fee_per_gas: U256,
}

/// Result of `circle_getUserOperationGasPrice`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationGasPrice {
    /// Low tier.
    pub low: GasPriceTier,
    /// Medium tier, used by default.
    pub medium: GasPriceTier,
    /// High tier.
    pub high: GasPriceTier,
    /// Verification gas hint for deployed accounts.
    #[serde(default, deserialize_with = "deserialize_optional_quantity")]
    pub deployed: Option<U256>,
    /// Verification gas hint for undeployed accounts.
    #[serde(default, deserialize_with = "deserialize_optional_quantity")]
    pub not_deployed: Option<U256>,
}

/// Calls `circle_getUserOperationGasPrice`.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn get_user_operation_gas_price(
    transport: &(impl Transport + ?Sized),
) -> Result<UserOperationGasPrice> {
    call(transport, "circle_getUserOperationGasPrice", json!([])).await
}
