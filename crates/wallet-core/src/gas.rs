//! Verification gas floors.
//!
//! Bundler estimates for passkey accounts undershoot: the P-256 verifier's
//! cost depends on the signature, and the estimate runs against the stub
//! signature. An undeployed account also pays for its initcode during
//! verification. The floors below are applied on top of the estimate.

use alloy_primitives::U256;

/// Chain id of Sepolia.
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Minimum verification gas of a deployed account.
pub const DEFAULT_DEPLOYED_VERIFICATION_GAS: u64 = 600_000;

/// Minimum verification gas of an account deployed by the operation.
pub const DEFAULT_UNDEPLOYED_VERIFICATION_GAS: u64 = 1_500_000;

/// Sepolia floors, `(deployed, undeployed)`.
const SEPOLIA_VERIFICATION_GAS: (u64, u64) = (700_000, 2_000_000);

/// The minimum verification gas limit for an account on `chain_id`.
#[must_use]
pub fn get_minimum_verification_gas_limit(deployed: bool, chain_id: u64) -> U256 {
    let (deployed_gas, undeployed_gas) = match chain_id {
        SEPOLIA_CHAIN_ID => SEPOLIA_VERIFICATION_GAS,
        _ => (
            DEFAULT_DEPLOYED_VERIFICATION_GAS,
            DEFAULT_UNDEPLOYED_VERIFICATION_GAS,
        ),
    };

    U256::from(if deployed { deployed_gas } else { undeployed_gas })
}

/// Raises `requested` to the chain's floor.
#[must_use]
pub fn apply_verification_gas_floor(requested: U256, deployed: bool, chain_id: u64) -> U256 {
    requested.max(get_minimum_verification_gas_limit(deployed, chain_id))
}
