//! JavaScript-friendly error types for WASM bindings.
//!
//! All errors implement conversion to [`JsValue`], so exported functions
//! reject with a JavaScript `Error`. Authenticator failures convert back into
//! the core error so the SDK can tell a dismissed ceremony from other
//! failures.

use std::{error, fmt};

use js_sys::Error as JsError;
use modular_wallet_core::error::Error as CoreError;
use wasm_bindgen::prelude::*;

/// Error type for WASM operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WasmError {
    /// `navigator.credentials` or `PublicKeyCredential` is unavailable.
    WebAuthnNotSupported,

    /// The registration ceremony returned no credential.
    NoCredentialCreated,

    /// The authentication ceremony returned no credential.
    NoCredentialAvailable,

    /// An argument from JavaScript could not be parsed.
    InvalidInput(String),

    /// Core library error.
    CoreError(String),

    /// JavaScript error from the WebAuthn API.
    JsError(String),
}

impl fmt::Display for WasmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebAuthnNotSupported => {
                write!(f, "WebAuthn is not supported in this context")
            }
            Self::NoCredentialCreated => write!(f, "No credential created"),
            Self::NoCredentialAvailable => write!(f, "No credential available"),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            Self::CoreError(msg) => write!(f, "{msg}"),
            Self::JsError(msg) => write!(f, "JavaScript error: {msg}"),
        }
    }
}

impl error::Error for WasmError {}

impl From<WasmError> for JsValue {
    fn from(error: WasmError) -> Self {
        JsError::new(&error.to_string()).into()
    }
}

impl From<CoreError> for WasmError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::NoCredentialCreated => Self::NoCredentialCreated,
            CoreError::NoCredentialAvailable => Self::NoCredentialAvailable,
            other => Self::CoreError(other.to_string()),
        }
    }
}

impl From<WasmError> for CoreError {
    fn from(error: WasmError) -> Self {
        match error {
            WasmError::NoCredentialCreated => Self::NoCredentialCreated,
            WasmError::NoCredentialAvailable => Self::NoCredentialAvailable,
            other => Self::WebAuthn(other.to_string()),
        }
    }
}

impl From<JsValue> for WasmError {
    fn from(value: JsValue) -> Self {
        let msg = if let Some(s) = value.as_string() {
            s
        } else if let Some(err) = value.dyn_ref::<JsError>() {
            err.message().into()
        } else {
            format!("{value:?}")
        };
        Self::JsError(msg)
    }
}

/// Result type for WASM operations.
pub type WasmResult<T> = Result<T, WasmError>;
