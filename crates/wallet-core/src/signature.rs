//! Signature wrapping for the weighted multisig plugin.
//!
//! The plugin does not accept raw signatures. Every signature is re-encoded
//! into one of two layouts, distinguished by a one-byte signature type:
//!
//! ```text
//! contract signature (passkeys):
//!   sender (32) || 65 (uint256) || sigType (1) || len (uint256) || signature
//!
//! EOA signature:
//!   r (32) || s (32) || sigType (1)
//! ```
//!
//! Signature types for signatures over a user operation (gas-bearing) live
//! 32 above the plain ones: `2`/`34` for contract signatures and `v`/`v + 32`
//! for EOA signatures.

use alloy_primitives::{B256, Bytes, U256, eip191_hash_message};
use alloy_sol_types::SolValue;
use tracing::debug;

use crate::abi;
use crate::address::get_sender_for_contract;
use crate::crypto::parse_p256_signature;
use crate::error::{Error, Result};
use crate::owner::Owner;
use crate::webauthn::WebAuthnMetadata;

/// Signature type of a contract signature.
pub const CONTRACT_SIGNATURE_TYPE: u8 = 2;

/// Offset added to a signature type when the signature covers user operation
/// gas fields.
pub const USER_OP_GAS_OFFSET: u8 = 32;

/// The constant the verifier reads in place of a dynamic offset.
const CONTRACT_SIGNATURE_OFFSET: u64 = 65;

/// An ECDSA signature in `r || s || v` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdsaSignature {
    r: [u8; 32],
    s: [u8; 32],
    v: u8,
}

impl EcdsaSignature {
    /// The length of a serialized signature in bytes.
    pub const BYTE_LEN: usize = 65;

    /// Creates a new signature from raw components.
    ///
    /// A recovery id of `0` or `1` is normalized to `27` or `28`.
    ///
    /// # Arguments
    ///
    /// * `r` - The R component as a 32-byte array
    /// * `s` - The S component as a 32-byte array
    /// * `v` - The recovery id, either `0`/`1` or `27`/`28`
    ///
    /// # Errors
    ///
    /// Returns [`Error::SignatureInvalid`] for any other recovery id.
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Result<Self> {
        let v = match v {
            0 | 1 => v + 27,
            27 | 28 => v,
            _ => return Err(Error::SignatureInvalid),
        };
        Ok(Self { r, s, v })
    }

    /// Parses a signature from a 65-byte slice.
    ///
    /// # Arguments
    ///
    /// * `bytes` - A 65-byte slice containing `r || s || v`
    ///
    /// # Errors
    ///
    /// Returns [`Error::SignatureInvalid`] if the slice is not exactly 65
    /// bytes long or the recovery id is not `0`, `1`, `27` or `28`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::BYTE_LEN {
            return Err(Error::SignatureInvalid);
        }

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);

        Self::new(r, s, bytes[64])
    }

    /// Returns the R component of the signature.
    #[must_use]
    pub const fn r(&self) -> &[u8; 32] {
        &self.r
    }

    /// Returns the S component of the signature.
    #[must_use]
    pub const fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// Returns the recovery id, `27` or `28`.
    #[must_use]
    pub const fn v(&self) -> u8 {
        self.v
    }
}

/// Wraps a signature as a contract signature of `sender`.
///
/// # Arguments
///
/// * `sender` - The owner's 32-byte sender id
/// * `signature` - The inner signature, e.g. from [`to_webauthn_signature`]
/// * `has_user_op_gas` - Whether the signature covers a user operation
///
/// # Returns
///
/// `sender || uint256(65) || sigType || uint256(len) || signature`, packed.
#[must_use]
pub fn wrap_signature(sender: B256, signature: &[u8], has_user_op_gas: bool) -> Bytes {
    let signature_type = if has_user_op_gas {
        CONTRACT_SIGNATURE_TYPE + USER_OP_GAS_OFFSET
    } else {
        CONTRACT_SIGNATURE_TYPE
    };

    let mut wrapped = Vec::with_capacity(97 + signature.len());
    wrapped.extend_from_slice(sender.as_slice());
    wrapped.extend_from_slice(&U256::from(CONTRACT_SIGNATURE_OFFSET).to_be_bytes::<32>());
    wrapped.push(signature_type);
    wrapped.extend_from_slice(&U256::from(signature.len()).to_be_bytes::<32>());
    wrapped.extend_from_slice(signature);
    wrapped.into()
}

/// Re-encodes a 65-byte ECDSA signature for the plugin.
///
/// # Arguments
///
/// * `signature` - `r || s || v`
/// * `has_user_op_gas` - Whether the signature covers a user operation
///
/// # Returns
///
/// `r || s || sigType`, where `sigType` is `v`, or `v + 32` for user
/// operations.
///
/// # Errors
///
/// Returns [`Error::SignatureInvalid`] if the signature has no valid recovery
/// id.
pub fn wrap_eoa_signature(signature: &[u8], has_user_op_gas: bool) -> Result<Bytes> {
    let signature = EcdsaSignature::from_bytes(signature)?;
    let signature_type = if has_user_op_gas {
        signature
            .v()
            .checked_add(USER_OP_GAS_OFFSET)
            .ok_or(Error::SignatureInvalid)?
    } else {
        signature.v()
    };

    let mut wrapped = Vec::with_capacity(EcdsaSignature::BYTE_LEN);
    wrapped.extend_from_slice(signature.r());
    wrapped.extend_from_slice(signature.s());
    wrapped.push(signature_type);
    Ok(wrapped.into())
}

/// ABI-encodes a passkey signature for the on-chain WebAuthn verifier.
///
/// # Arguments
///
/// * `webauthn` - The data the authenticator signed over
/// * `signature` - The P-256 signature, raw `r || s` or DER
///
/// # Returns
///
/// `abi.encode(WebAuthnData, r, s)` with `requireUserVerification` set.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if the signature does not parse.
pub fn to_webauthn_signature(webauthn: &WebAuthnMetadata, signature: &[u8]) -> Result<Bytes> {
    let (r, s) = parse_p256_signature(signature)?;

    let data = abi::WebAuthnData {
        authenticatorData: Bytes::copy_from_slice(&webauthn.authenticator_data),
        clientDataJSON: webauthn.client_data_json.clone(),
        challengeIndex: U256::from(webauthn.challenge_index),
        typeIndex: U256::from(webauthn.type_index),
        requireUserVerification: true,
    };

    Ok((data, U256::from_be_bytes(r), U256::from_be_bytes(s))
        .abi_encode_params()
        .into())
}

/// Signs `hash` with `owner` and wraps the result for the plugin.
///
/// Passkeys sign the EIP-191 hash of `hash` when the signature covers a user
/// operation. EOAs sign user operations as personal messages and everything
/// else as a raw hash.
///
/// # Arguments
///
/// * `hash` - The hash to sign, already replay-safe where required
/// * `owner` - The signing owner
/// * `sender` - The sender id embedded in contract signatures
/// * `has_user_op_gas` - Whether the signature covers a user operation
///
/// # Errors
///
/// Returns the owner's signing error, or [`Error::RawSignUnsupported`] if an
/// EOA owner must sign a raw hash but cannot.
pub async fn sign_and_wrap(
    hash: B256,
    owner: &Owner,
    sender: B256,
    has_user_op_gas: bool,
) -> Result<Bytes> {
    debug!(owner = owner.kind(), has_user_op_gas, "signing hash");

    match owner {
        Owner::WebAuthn(account) => {
            let hash = if has_user_op_gas {
                eip191_hash_message(hash)
            } else {
                hash
            };
            let signed = account.sign(&hash).await?;
            let signature = to_webauthn_signature(&signed.webauthn, &signed.signature)?;
            Ok(wrap_signature(sender, &signature, has_user_op_gas))
        }
        Owner::Local(signer) if has_user_op_gas => {
            let signature = signer.sign_message(hash.as_slice()).await?;
            wrap_eoa_signature(&signature, true)
        }
        Owner::Local(signer) => {
            let signature = signer.sign_hash(&hash).await?;
            wrap_eoa_signature(&signature, false)
        }
    }
}

/// A placeholder user operation signature with the layout of a real one.
///
/// Bundlers simulate validation with this signature, so it must have the
/// final length; it does not need to verify.
///
/// # Errors
///
/// Returns an error if a passkey owner's public key does not parse.
pub fn stub_signature(owner: &Owner) -> Result<Bytes> {
    match owner {
        Owner::WebAuthn(_) => {
            let sender = get_sender_for_contract(owner)?;
            let signature = to_webauthn_signature(&stub_webauthn_metadata(), &[0xff; 64])?;
            Ok(wrap_signature(sender, &signature, true))
        }
        Owner::Local(_) => {
            let mut signature = [0xffu8; 65];
            signature[64] = 28;
            wrap_eoa_signature(&signature, true)
        }
    }
}

fn stub_webauthn_metadata() -> WebAuthnMetadata {
    // rpIdHash || flags (UP | UV) || signCount
    let mut authenticator_data = vec![0x49; 32];
    authenticator_data.push(0x05);
    authenticator_data.extend_from_slice(&[0, 0, 0, 0]);

    let challenge = "A".repeat(43);
    let client_data_json = format!(
        r#"{{"type":"webauthn.get","challenge":"{challenge}","origin":"https://localhost","crossOrigin":false}}"#
    );

    WebAuthnMetadata {
        authenticator_data,
        client_data_json,
        challenge_index: 23,
        type_index: 1,
        user_verification_required: true,
    }
}
