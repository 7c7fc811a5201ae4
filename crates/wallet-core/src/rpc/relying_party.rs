//! `rp_*` methods of the WebAuthn relying party.
//!
//! Options come back as WebAuthn JSON (binary fields base64url encoded) and
//! are handed to a [`WebAuthnAuthenticator`](crate::webauthn::WebAuthnAuthenticator)
//! unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Transport, call};
use crate::error::Result;
use crate::webauthn::{AssertionResponse, RegistrationResponse};

/// Result of `rp_getRegistrationVerification`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationVerification {
    /// Whether the attestation was accepted.
    pub verified: bool,
}

/// Result of `rp_getLoginVerification`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginVerification {
    /// The credential's public key, base64url encoded.
    pub public_key: String,
}

/// Calls `rp_getRegistrationOptions`, returning `PublicKeyCredentialCreationOptions`.
///
/// # Errors
///
/// Returns the transport's error.
pub async fn get_registration_options(
    transport: &(impl Transport + ?Sized),
    username: &str,
) -> Result<Value> {
    transport
        .request("rp_getRegistrationOptions", json!([username]))
        .await
}

/// Calls `rp_getRegistrationVerification`.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn get_registration_verification(
    transport: &(impl Transport + ?Sized),
    credential: &RegistrationResponse,
) -> Result<RegistrationVerification> {
    call(
        transport,
        "rp_getRegistrationVerification",
        json!([credential]),
    )
    .await
}

/// Calls `rp_getLoginOptions`, returning `PublicKeyCredentialRequestOptions`.
///
/// # Errors
///
/// Returns the transport's error.
pub async fn get_login_options(
    transport: &(impl Transport + ?Sized),
    user_id: Option<&str>,
) -> Result<Value> {
    let params = match user_id {
        Some(user_id) => json!([user_id]),
        None => json!([]),
    };
    transport.request("rp_getLoginOptions", params).await
}

/// Calls `rp_getLoginVerification`.
///
/// # Errors
///
/// Returns the transport's error or [`Error::MalformedResponse`](crate::error::Error::MalformedResponse).
pub async fn get_login_verification(
    transport: &(impl Transport + ?Sized),
    credential: &AssertionResponse,
) -> Result<LoginVerification> {
    call(transport, "rp_getLoginVerification", json!([credential])).await
}
