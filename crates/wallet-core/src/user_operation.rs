//! ERC-4337 v0.7 user operations.
//!
//! [`UserOperation`] is the unpacked form bundlers exchange over JSON-RPC.
//! The `EntryPoint` hashes the packed form:
//!
//! ```text
//! initCode          = factory || factoryData
//! accountGasLimits  = verificationGasLimit (16 bytes) || callGasLimit (16 bytes)
//! gasFees           = maxPriorityFeePerGas (16 bytes) || maxFeePerGas (16 bytes)
//! paymasterAndData  = paymaster || paymasterVerificationGasLimit (16)
//!                     || paymasterPostOpGasLimit (16) || paymasterData
//!
//! userOpHash = keccak256(abi.encode(
//!     keccak256(abi.encode(sender, nonce, keccak256(initCode), keccak256(callData),
//!         accountGasLimits, preVerificationGas, gasFees, keccak256(paymasterAndData))),
//!     entryPoint,
//!     chainId))
//! ```

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

/// An ERC-4337 v0.7 user operation in its RPC form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// The account.
    pub sender: Address,

    /// Anti-replay nonce, key in the high 192 bits.
    pub nonce: U256,

    /// Factory deploying the account, for the first operation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,

    /// Factory calldata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_data: Option<Bytes>,

    /// Calldata executed by the account.
    pub call_data: Bytes,

    /// Gas for the main call.
    pub call_gas_limit: U256,

    /// Gas for account validation, including deployment.
    pub verification_gas_limit: U256,

    /// Gas paid to the bundler for overhead.
    pub pre_verification_gas: U256,

    /// EIP-1559 max fee.
    pub max_fee_per_gas: U256,

    /// EIP-1559 priority fee.
    pub max_priority_fee_per_gas: U256,

    /// Paymaster sponsoring the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,

    /// Gas for paymaster validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,

    /// Gas for the paymaster post-op.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,

    /// Paymaster-specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,

    /// Signature checked by the account.
    pub signature: Bytes,
}

impl UserOperation {
    /// `factory || factoryData`, or empty when there is no factory.
    #[must_use]
    pub fn init_code(&self) -> Bytes {
        match self.factory {
            Some(factory) => {
                let data: &[u8] = self.factory_data.as_ref().map_or(&[][..], |d| &d[..]);
                let mut out = Vec::with_capacity(20 + data.len());
                out.extend_from_slice(factory.as_slice());
                out.extend_from_slice(data);
                out.into()
            }
            None => Bytes::new(),
        }
    }

    /// `verificationGasLimit || callGasLimit` as two 128-bit halves.
    #[must_use]
    pub fn account_gas_limits(&self) -> B256 {
        pack_u128_pair(self.verification_gas_limit, self.call_gas_limit)
    }

    /// `maxPriorityFeePerGas || maxFeePerGas` as two 128-bit halves.
    #[must_use]
    pub fn gas_fees(&self) -> B256 {
        pack_u128_pair(self.max_priority_fee_per_gas, self.max_fee_per_gas)
    }

    /// The packed paymaster field, or empty when there is no paymaster.
    #[must_use]
    pub fn paymaster_and_data(&self) -> Bytes {
        let Some(paymaster) = self.paymaster else {
            return Bytes::new();
        };
        let data: &[u8] = self.paymaster_data.as_ref().map_or(&[][..], |d| &d[..]);
        let mut out = Vec::with_capacity(52 + data.len());
        out.extend_from_slice(paymaster.as_slice());
        out.extend_from_slice(&low_u128_bytes(
            self.paymaster_verification_gas_limit.unwrap_or_default(),
        ));
        out.extend_from_slice(&low_u128_bytes(
            self.paymaster_post_op_gas_limit.unwrap_or_default(),
        ));
        out.extend_from_slice(data);
        out.into()
    }

    /// Computes the hash the `EntryPoint` asks the account to validate.
    #[must_use]
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        let packed = (
            self.sender,
            self.nonce,
            keccak256(self.init_code()),
            keccak256(&self.call_data),
            self.account_gas_limits(),
            self.pre_verification_gas,
            self.gas_fees(),
            keccak256(self.paymaster_and_data()),
        )
            .abi_encode();

        keccak256((keccak256(packed), entry_point, U256::from(chain_id)).abi_encode())
    }
}

fn low_u128_bytes(value: U256) -> [u8; 16] {
    let bytes = value.to_be_bytes::<32>();
    let mut out = [0u8; 16];
    out.copy_from_slice(&bytes[16..]);
    out
}

fn pack_u128_pair(high: U256, low: U256) -> B256 {
    let mut out = [0u8; 32];
    out[..16].copy_from_slice(&low_u128_bytes(high));
    out[16..].copy_from_slice(&low_u128_bytes(low));
    B256::from(out)
}
