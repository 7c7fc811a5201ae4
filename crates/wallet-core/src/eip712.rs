//! EIP-712 typed structured data.
//!
//! [`SmartAccount::sign_typed_data`](crate::account::SmartAccount::sign_typed_data)
//! hashes typed data with this module before wrapping the digest replay-safe.
//! Parsing and `hashStruct` come from `alloy-dyn-abi`, so wallet payloads in
//! the `eth_signTypedData_v4` shape are accepted as-is, including hex
//! `chainId` values.
//!
//! # Hash Computation
//!
//! ```text
//! keccak256("\x19\x01" || domainSeparator || hashStruct(message))
//! ```
//!
//! # Example
//!
//! ```
//! use modular_wallet_core::eip712;
//!
//! let typed_data = eip712::from_json(r#"{
//!     "types": {
//!         "Person": [
//!             {"name": "name", "type": "string"},
//!             {"name": "wallet", "type": "address"}
//!         ]
//!     },
//!     "primaryType": "Person",
//!     "domain": {"name": "Ether Mail", "version": "1", "chainId": "0x1"},
//!     "message": {"name": "Alice", "wallet": "0x0000000000000000000000000000000000000001"}
//! }"#).unwrap();
//! let hash = eip712::signing_hash(&typed_data).unwrap();
//! ```
//!
//! [EIP-712]: https://eips.ethereum.org/EIPS/eip-712

use alloy_primitives::B256;

pub use alloy_dyn_abi::TypedData;
pub use alloy_sol_types::Eip712Domain;

use crate::error::{Error, Result};

/// Parses typed data from its JSON form.
///
/// # Errors
///
/// Returns [`Error::InvalidTypedData`] if the JSON does not describe typed
/// data.
pub fn from_json(json: &str) -> Result<TypedData> {
    serde_json::from_str(json).map_err(|e| Error::InvalidTypedData(e.to_string()))
}

/// Computes the EIP-712 signing hash of `typed_data`.
///
/// # Errors
///
/// Returns [`Error::InvalidTypedData`] if a type is undefined or the message
/// does not match its types.
pub fn signing_hash(typed_data: &TypedData) -> Result<B256> {
    Ok(typed_data.eip712_signing_hash()?)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::b256;
    use serde_json::{Value, json};

    use super::*;

    fn mail() -> Value {
        json!({
            "types": {
                "EIP712Domain": [
                    {"name": "name", "type": "string"},
                    {"name": "version", "type": "string"},
                    {"name": "chainId", "type": "uint256"},
                    {"name": "verifyingContract", "type": "address"}
                ],
                "Person": [
                    {"name": "name", "type": "string"},
                    {"name": "wallet", "type": "address"}
                ],
                "Mail": [
                    {"name": "from", "type": "Person"},
                    {"name": "to", "type": "Person"},
                    {"name": "contents", "type": "string"}
                ]
            },
            "primaryType": "Mail",
            "domain": {
                "name": "Ether Mail",
                "version": "1",
                "chainId": 1,
                "verifyingContract": "0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC"
            },
            "message": {
                "from": {"name": "Cow", "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826"},
                "to": {"name": "Bob", "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB"},
                "contents": "Hello, Bob!"
            }
        })
    }

    #[test]
    fn eip712_reference_vector() {
        let typed_data = from_json(&mail().to_string()).unwrap();

        assert_eq!(
            typed_data.domain.separator(),
            b256!("f2cee375fa42b42143804025fc449deafd50cc031ca257e0b194a650a912090f")
        );
        assert_eq!(
            signing_hash(&typed_data).unwrap(),
            b256!("be609aee343fb3c4b28e1df9e632fca64fcfaede20f02e86244efddf30957bd2")
        );
    }

    #[test]
    fn hex_chain_id_matches_numeric() {
        let mut numeric = mail();
        let mut hex = mail();
        numeric["domain"] = json!({"name": "app", "chainId": 1});
        hex["domain"] = json!({"name": "app", "chainId": "0x1"});
        numeric["types"]["EIP712Domain"] =
            json!([{"name": "name", "type": "string"}, {"name": "chainId", "type": "uint256"}]);
        hex["types"]["EIP712Domain"] = numeric["types"]["EIP712Domain"].clone();

        let numeric = signing_hash(&from_json(&numeric.to_string()).unwrap()).unwrap();
        let hex = signing_hash(&from_json(&hex.to_string()).unwrap()).unwrap();
        assert_eq!(numeric, hex);
    }

    #[test]
    fn undefined_primary_type() {
        let mut value = mail();
        value["primaryType"] = json!("Letter");

        let result = from_json(&value.to_string()).and_then(|data| signing_hash(&data));
        assert!(matches!(result, Err(Error::InvalidTypedData(_))));
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(from_json("{"), Err(Error::InvalidTypedData(_))));
    }
}
