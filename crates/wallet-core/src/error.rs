//! Error types for the modular wallet SDK.
//!
//! This module provides a single error type [`enum@Error`] covering every
//! failure mode of account derivation, signing, RPC transport and recovery.
//!
//! # Error Categories
//!
//! - **Configuration errors**: invalid client URLs or deployment data. Never retried.
//! - **Address integrity errors**: the locally derived account address does not
//!   match the address reported by the wallet service.
//! - **RPC errors**: JSON-RPC error objects carry a typed [`RpcErrorCode`].
//! - **Capability errors**: the owner or client cannot perform the operation.
//! - **WebAuthn ceremony errors**: the user dismissed or failed a passkey prompt.
//!   These are recoverable by retrying the ceremony.
//! - **Recovery errors**: operation-specific failures that keep the original
//!   cause reachable through [`std::error::Error::source`].
//!
//! # Example
//!
//! ```
//! use modular_wallet_core::Error;
//!
//! let err = Error::AccountRequired;
//! assert_eq!(err.to_string(), "Account is required");
//! ```

use core::fmt;
use core::result::Result as CoreResult;

use alloy_primitives::Address;
use hex::FromHexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// The main error type for the modular wallet SDK.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// The client URL could not be parsed.
    #[error("invalid client URL: {0}")]
    InvalidUrl(String),

    /// The SDK configuration is incomplete or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // =========================================================================
    // Address Integrity Errors
    // =========================================================================
    /// The locally computed or supplied account address differs from the
    /// canonical address reported by the wallet service.
    #[error("Address mismatch: local {local}, server {server}")]
    AddressMismatch {
        /// Address computed locally or supplied by the caller.
        local: Address,
        /// Address reported by `circle_getAddress`.
        server: Address,
    },

    // =========================================================================
    // Transport and RPC Errors
    // =========================================================================
    /// The JSON-RPC server answered with an error object.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The HTTP request completed with a non-success status.
    #[error("HTTP request failed with status {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The JSON-RPC response carried neither `result` nor `error`.
    #[error("malformed JSON-RPC response: {0}")]
    MalformedResponse(String),

    // =========================================================================
    // Capability Errors
    // =========================================================================
    /// The owner can only sign messages, not raw hashes.
    #[error("owner does not support raw sign")]
    RawSignUnsupported,

    /// Neither the client nor the call parameters resolve to an account.
    #[error("Account is required")]
    AccountRequired,

    /// The external wallet has no active account to sign with.
    #[error("WalletClient does not have an associated account")]
    WalletAccountMissing,

    /// The operation is only available for a different owner kind.
    #[error("unsupported owner: {0}")]
    UnsupportedOwner(&'static str),

    // =========================================================================
    // WebAuthn Ceremony Errors
    // =========================================================================
    /// The authenticator returned no assertion.
    #[error("No credential available")]
    NoCredentialAvailable,

    /// The authenticator returned no new credential.
    #[error("No credential created")]
    NoCredentialCreated,

    /// The relying party refused the registration response.
    #[error("passkey registration was not verified by the relying party")]
    RegistrationNotVerified,

    /// The platform authenticator failed, was cancelled or timed out.
    #[error("WebAuthn ceremony failed: {0}")]
    WebAuthn(String),

    // =========================================================================
    // Cryptographic and Signature Errors
    // =========================================================================
    /// An ECDSA signature has no recovery id.
    #[error("signature is invalid")]
    SignatureInvalid,

    /// A signature is malformed.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// A public key is malformed or not on the P-256 curve.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// The local signer failed.
    #[error("signer error: {0}")]
    Signer(String),

    // =========================================================================
    // Recovery Errors
    // =========================================================================
    /// Registering the recovery address failed for a reason other than an
    /// existing mapping.
    #[error("Failed to register the recovery address. Please try again.")]
    RecoveryAddressRegistrationFailed(#[source] Box<Error>),

    /// Registering the new passkey during recovery failed for a reason other
    /// than an existing mapping.
    #[error("Failed to register the new WebAuthn credential. Please try again.")]
    CredentialRegistrationFailed(#[source] Box<Error>),

    /// The recovery phrase failed BIP-39 validation.
    #[error("invalid recovery phrase: {0}")]
    InvalidMnemonic(String),

    /// The requested recovery step is not allowed from the current state.
    #[error("cannot {action} while recovery is in state {state}")]
    InvalidRecoveryTransition {
        /// State the session was in.
        state: String,
        /// Step that was attempted.
        action: &'static str,
    },

    /// A recovery step needs data that the session does not hold.
    #[error("recovery session is missing {0}")]
    RecoveryDataMissing(&'static str),

    // =========================================================================
    // EIP-712 Errors
    // =========================================================================
    /// The EIP-712 typed data is invalid.
    #[error("invalid EIP-712 typed data: {0}")]
    InvalidTypedData(String),

    // =========================================================================
    // Serialization Errors
    // =========================================================================
    /// Failed to parse hex data.
    #[error("hex decoding failed: {0}")]
    HexDecodeFailed(String),

    /// Failed to decode base64url data.
    #[error("base64url decoding failed: {0}")]
    Base64DecodeFailed(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    JsonError(String),
}

impl Error {
    /// Returns the RPC error code when this error came from a JSON-RPC error
    /// response.
    #[must_use]
    pub const fn rpc_code(&self) -> Option<RpcErrorCode> {
        match self {
            Self::Rpc(err) => Some(err.code),
            _ => None,
        }
    }

    /// Whether the wallet service reported that an address mapping already
    /// exists.
    #[must_use]
    pub const fn is_address_mapping_conflict(&self) -> bool {
        matches!(
            self.rpc_code(),
            Some(RpcErrorCode::AddressMappingAlreadyExists)
        )
    }
}

impl From<FromHexError> for Error {
    fn from(err: FromHexError) -> Self {
        Self::HexDecodeFailed(err.to_string())
    }
}

impl From<SerdeJsonError> for Error {
    fn from(err: SerdeJsonError) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<alloy_dyn_abi::Error> for Error {
    fn from(err: alloy_dyn_abi::Error) -> Self {
        Self::InvalidTypedData(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64DecodeFailed(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Http {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => Self::Transport(err.to_string()),
        }
    }
}

impl From<alloy_signer::Error> for Error {
    fn from(err: alloy_signer::Error) -> Self {
        Self::Signer(err.to_string())
    }
}

impl From<alloy_signer_local::LocalSignerError> for Error {
    fn from(err: alloy_signer_local::LocalSignerError) -> Self {
        Self::InvalidMnemonic(err.to_string())
    }
}

/// Known JSON-RPC error codes.
///
/// Codes outside the known set are kept verbatim in [`RpcErrorCode::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum RpcErrorCode {
    /// `-32700`: invalid JSON.
    ParseError,
    /// `-32600`: the request object is invalid.
    InvalidRequest,
    /// `-32601`: the method does not exist.
    MethodNotFound,
    /// `-32602`: invalid method parameters.
    InvalidParams,
    /// `-32603`: internal JSON-RPC error.
    InternalError,
    /// The wallet service already holds this address mapping.
    AddressMappingAlreadyExists,
    /// Any other code.
    Other(i64),
}

impl RpcErrorCode {
    /// Code returned by `circle_createAddressMapping` for a duplicate mapping.
    pub const ADDRESS_MAPPING_ALREADY_EXISTS: i64 = 155_614;

    /// Returns the numeric code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::AddressMappingAlreadyExists => Self::ADDRESS_MAPPING_ALREADY_EXISTS,
            Self::Other(code) => code,
        }
    }
}

impl From<i64> for RpcErrorCode {
    fn from(code: i64) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            Self::ADDRESS_MAPPING_ALREADY_EXISTS => Self::AddressMappingAlreadyExists,
            other => Self::Other(other),
        }
    }
}

impl From<RpcErrorCode> for i64 {
    fn from(code: RpcErrorCode) -> Self {
        code.code()
    }
}

impl fmt::Display for RpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    /// The error code.
    pub code: RpcErrorCode,
    /// Human readable message.
    pub message: String,
    /// Optional structured data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A specialized [`Result`] type for modular wallet operations.
pub type Result<T> = CoreResult<T, Error>;
