//! WebAuthn credentials and passkey signing.
//!
//! The browser's credential API sits behind [`WebAuthnAuthenticator`]; the
//! relying party issues options and verifies responses. Options and
//! responses cross both seams as WebAuthn JSON, with binary fields base64url
//! encoded.
//!
//! # Signing
//!
//! A passkey signs `authenticatorData || sha256(clientDataJSON)`, where
//! `clientDataJSON` embeds the base64url challenge. [`WebAuthnAccount::sign`]
//! uses the 32-byte hash as the challenge and returns everything the
//! on-chain verifier needs to rebuild the signed message:
//!
//! ```text
//! authenticatorData, clientDataJSON,
//! challengeIndex  (offset of "challenge" in clientDataJSON),
//! typeIndex       (offset of "type" in clientDataJSON),
//! r, s            (low-S normalized)
//! ```

use std::fmt;
use std::rc::Rc;

use alloy_primitives::B256;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::crypto::{
    compress_public_key, normalize_s, parse_der_signature, parse_public_key, signature_components,
};
use crate::error::{Error, Result};
use crate::rpc::{Transport, relying_party};

/// A registered passkey.
///
/// The caller persists credentials between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebAuthnCredential {
    /// Credential id, base64url encoded.
    pub id: String,

    /// Compressed SEC1 public key, `0x`-prefixed hex.
    pub public_key: String,

    /// Relying party id the credential is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rp_id: Option<String>,

    /// The platform credential as returned by the authenticator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl WebAuthnCredential {
    /// Creates a credential from an id and any supported public key encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPublicKey`] if the key does not parse.
    pub fn new(id: impl Into<String>, public_key: &[u8], rp_id: Option<String>) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            public_key: format!("0x{}", hex::encode(compress_public_key(public_key)?)),
            rp_id,
            raw: None,
        })
    }

    /// The serialized public key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HexDecodeFailed`] if the stored key is not hex.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        let key = self.public_key.strip_prefix("0x").unwrap_or(&self.public_key);
        Ok(hex::decode(key)?)
    }

    /// The public key's affine coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPublicKey`] if the key is not a P-256 point.
    pub fn coordinates(&self) -> Result<([u8; 32], [u8; 32])> {
        parse_public_key(&self.public_key_bytes()?)
    }
}

/// `AuthenticatorAttestationResponse` in WebAuthn JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponse {
    /// Client data, base64url.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,

    /// Attestation object, base64url.
    pub attestation_object: String,

    /// SPKI DER public key, base64url, as returned by `getPublicKey()`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    /// COSE algorithm of the public key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_algorithm: Option<i64>,

    /// Authenticator transports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<String>,
}

/// A new credential, returned by [`WebAuthnAuthenticator::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    /// Credential id, base64url.
    pub id: String,

    /// Raw credential id, base64url.
    pub raw_id: String,

    /// Attestation.
    pub response: AttestationResponse,

    /// `platform` or `cross-platform`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<String>,

    /// Extension outputs.
    #[serde(default)]
    pub client_extension_results: Value,

    /// Always `public-key`.
    #[serde(rename = "type")]
    pub credential_type: String,
}

/// `AuthenticatorAssertionResponse` in WebAuthn JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertion {
    /// Client data, base64url.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,

    /// Authenticator data, base64url.
    pub authenticator_data: String,

    /// DER ECDSA signature, base64url.
    pub signature: String,

    /// User handle, base64url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
}

/// An assertion, returned by [`WebAuthnAuthenticator::get`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponse {
    /// Credential id, base64url.
    pub id: String,

    /// Raw credential id, base64url.
    pub raw_id: String,

    /// Assertion.
    pub response: AuthenticatorAssertion,

    /// `platform` or `cross-platform`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<String>,

    /// Extension outputs.
    #[serde(default)]
    pub client_extension_results: Value,

    /// Always `public-key`.
    #[serde(rename = "type")]
    pub credential_type: String,
}

/// A platform authenticator: `navigator.credentials` in a browser, or a
/// software key in tests.
///
/// Ceremonies block on user interaction. Implementations surface
/// cancellation and platform timeouts as errors and impose no timeout of
/// their own.
#[async_trait(?Send)]
pub trait WebAuthnAuthenticator: fmt::Debug {
    /// Runs `navigator.credentials.create` with creation options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCredentialCreated`] if no credential was returned.
    async fn create(&self, options: Value) -> Result<RegistrationResponse>;

    /// Runs `navigator.credentials.get` with request options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCredentialAvailable`] if no assertion was returned.
    async fn get(&self, options: Value) -> Result<AssertionResponse>;
}

/// Metadata the on-chain WebAuthn verifier needs alongside `(r, s)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebAuthnMetadata {
    /// Authenticator data.
    pub authenticator_data: Vec<u8>,

    /// The client data JSON string.
    pub client_data_json: String,

    /// Offset of `"challenge"` in the client data.
    pub challenge_index: usize,

    /// Offset of `"type"` in the client data.
    pub type_index: usize,

    /// Whether the verifier must check the user-verified flag.
    pub user_verification_required: bool,
}

/// A passkey signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebAuthnSignature {
    /// `r || s`, low-S normalized.
    pub signature: [u8; 64],

    /// Data the authenticator signed over.
    pub webauthn: WebAuthnMetadata,
}

/// A passkey owner: a credential plus the authenticator that can use it.
#[derive(Debug, Clone)]
pub struct WebAuthnAccount {
    credential: WebAuthnCredential,
    authenticator: Rc<dyn WebAuthnAuthenticator>,
}

impl WebAuthnAccount {
    /// Creates an account for a credential.
    #[must_use]
    pub fn new(
        credential: WebAuthnCredential,
        authenticator: Rc<dyn WebAuthnAuthenticator>,
    ) -> Self {
        Self {
            credential,
            authenticator,
        }
    }

    /// The credential.
    #[must_use]
    pub const fn credential(&self) -> &WebAuthnCredential {
        &self.credential
    }

    /// The authenticator.
    #[must_use]
    pub fn authenticator(&self) -> Rc<dyn WebAuthnAuthenticator> {
        Rc::clone(&self.authenticator)
    }

    /// Signs a 32-byte hash with the passkey.
    ///
    /// # Errors
    ///
    /// Returns the authenticator's error, or [`Error::WebAuthn`] /
    /// [`Error::InvalidSignature`] if the assertion is malformed.
    pub async fn sign(&self, hash: &B256) -> Result<WebAuthnSignature> {
        let mut options = json!({
            "challenge": URL_SAFE_NO_PAD.encode(hash),
            "allowCredentials": [{"id": self.credential.id, "type": "public-key"}],
            "userVerification": "required",
        });
        if let Some(rp_id) = &self.credential.rp_id {
            options["rpId"] = json!(rp_id);
        }

        debug!(credential = %self.credential.id, "requesting WebAuthn assertion");
        let assertion = self.authenticator.get(options).await?;

        let authenticator_data = decode_base64url(&assertion.response.authenticator_data)?;
        let client_data_json = String::from_utf8(decode_base64url(
            &assertion.response.client_data_json,
        )?)
        .map_err(|e| Error::WebAuthn(format!("client data is not UTF-8: {e}")))?;
        let der = decode_base64url(&assertion.response.signature)?;
        let (normalized, _) = normalize_s(parse_der_signature(&der)?);
        let (r, s) = signature_components(&normalized);

        let challenge_index = find_key(&client_data_json, "challenge")?;
        let type_index = find_key(&client_data_json, "type")?;

        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(&r);
        signature[32..].copy_from_slice(&s);

        Ok(WebAuthnSignature {
            signature,
            webauthn: WebAuthnMetadata {
                authenticator_data,
                client_data_json,
                challenge_index,
                type_index,
                user_verification_required: true,
            },
        })
    }
}

fn find_key(client_data_json: &str, key: &str) -> Result<usize> {
    client_data_json
        .find(&format!("\"{key}\""))
        .ok_or_else(|| Error::WebAuthn(format!("client data has no {key}")))
}

/// Decodes base64url, with or without padding.
///
/// # Errors
///
/// Returns [`Error::Base64DecodeFailed`] for invalid input.
pub fn decode_base64url(value: &str) -> Result<Vec<u8>> {
    Ok(URL_SAFE_NO_PAD.decode(value.trim_end_matches('='))?)
}

/// Which relying party ceremony to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebAuthnMode {
    /// Create a new passkey for a username.
    Register {
        /// The username shown by the platform.
        username: String,
    },

    /// Sign in with an existing passkey.
    Login {
        /// Restricts the ceremony to one user, if known.
        user_id: Option<String>,
    },
}

/// Runs a registration or login ceremony against the relying party and
/// returns the resulting credential.
///
/// # Errors
///
/// - [`Error::RegistrationNotVerified`] if the relying party rejects the
///   attestation
/// - [`Error::NoCredentialCreated`] / [`Error::NoCredentialAvailable`] from
///   the authenticator
/// - RPC errors from the relying party
pub async fn to_webauthn_credential(
    transport: &(impl Transport + ?Sized),
    authenticator: &(impl WebAuthnAuthenticator + ?Sized),
    mode: &WebAuthnMode,
) -> Result<WebAuthnCredential> {
    match mode {
        WebAuthnMode::Register { username } => {
            let options = relying_party::get_registration_options(transport, username).await?;
            let rp_id = options
                .pointer("/rp/id")
                .and_then(Value::as_str)
                .map(str::to_string);

            let response = authenticator.create(options).await?;
            let verification =
                relying_party::get_registration_verification(transport, &response).await?;
            if !verification.verified {
                return Err(Error::RegistrationNotVerified);
            }

            let public_key = response.response.public_key.as_deref().ok_or_else(|| {
                Error::WebAuthn("registration response has no public key".to_string())
            })?;
            let public_key = decode_base64url(public_key)?;
            let mut credential = WebAuthnCredential::new(response.id.clone(), &public_key, rp_id)?;
            credential.raw = Some(serde_json::to_value(&response)?);

            info!(credential = %credential.id, "registered WebAuthn credential");
            Ok(credential)
        }
        WebAuthnMode::Login { user_id } => {
            let options = relying_party::get_login_options(transport, user_id.as_deref()).await?;
            let rp_id = options
                .get("rpId")
                .and_then(Value::as_str)
                .map(str::to_string);

            let response = authenticator.get(options).await?;
            let verification = relying_party::get_login_verification(transport, &response).await?;

            let mut credential = WebAuthnCredential::new(
                response.id.clone(),
                &decode_base64url(&verification.public_key)?,
                rp_id,
            )?;
            credential.raw = Some(serde_json::to_value(&response)?);

            info!(credential = %credential.id, "logged in with WebAuthn credential");
            Ok(credential)
        }
    }
}

/// Removes the relying party id from creation (`rp.id`) or request (`rpId`)
/// options.
///
/// Browser extensions may not claim a relying party id; the platform uses
/// the extension origin instead.
pub fn strip_rp_id(options: &mut Value) {
    if let Some(rp) = options.get_mut("rp").and_then(Value::as_object_mut) {
        rp.remove("id");
    }
    if let Some(options) = options.as_object_mut() {
        options.remove("rpId");
    }
}

#[cfg(test)]
mod tests {
    use p256::ecdsa::signature::hazmat::PrehashVerifier;
    use p256::ecdsa::{Signature, VerifyingKey};
    use sha2::{Digest, Sha256};

    use super::*;
    use crate::testing::{MockTransport, SoftwareAuthenticator};

    #[tokio::test]
    async fn sign_produces_verifiable_signature() {
        let authenticator = Rc::new(SoftwareAuthenticator::new(1));
        let account = WebAuthnAccount::new(authenticator.credential(), authenticator.clone());
        let hash = B256::repeat_byte(0x42);

        let signed = account.sign(&hash).await.unwrap();
        let metadata = &signed.webauthn;

        assert_eq!(metadata.authenticator_data.len(), 37);
        assert!(metadata.user_verification_required);
        assert!(metadata.client_data_json[metadata.challenge_index..].starts_with("\"challenge\""));
        assert!(metadata.client_data_json[metadata.type_index..].starts_with("\"type\""));
        assert!(metadata.client_data_json.contains(&URL_SAFE_NO_PAD.encode(hash)));

        let mut message = metadata.authenticator_data.clone();
        message.extend_from_slice(&Sha256::digest(metadata.client_data_json.as_bytes()));
        let digest = Sha256::digest(&message);

        let key = VerifyingKey::from_sec1_bytes(&account.credential().public_key_bytes().unwrap())
            .unwrap();
        let signature = Signature::from_slice(&signed.signature).unwrap();
        assert!(key.verify_prehash(&digest, &signature).is_ok());
        assert!(signature.normalize_s().is_none());
    }

    #[tokio::test]
    async fn sign_requests_the_credential() {
        let authenticator = Rc::new(SoftwareAuthenticator::new(2));
        let account = WebAuthnAccount::new(authenticator.credential(), authenticator.clone());

        account.sign(&B256::ZERO).await.unwrap();

        let options = authenticator.last_options().unwrap();
        assert_eq!(options["userVerification"], "required");
        assert_eq!(options["allowCredentials"][0]["id"], account.credential().id);
        assert_eq!(options["rpId"], "localhost");
    }

    #[tokio::test]
    async fn register_ceremony() {
        let authenticator = SoftwareAuthenticator::new(3);
        let transport = MockTransport::default();
        transport.respond(
            "rp_getRegistrationOptions",
            json!({"challenge": "AAAA", "rp": {"id": "example.com", "name": "Example"}}),
        );
        transport.respond("rp_getRegistrationVerification", json!({"verified": true}));

        let credential = to_webauthn_credential(
            &transport,
            &authenticator,
            &WebAuthnMode::Register {
                username: "alice".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(credential.rp_id.as_deref(), Some("example.com"));
        assert_eq!(credential.public_key_bytes().unwrap().len(), 33);
        assert_eq!(credential.coordinates().unwrap(), authenticator.coordinates());
        assert_eq!(
            transport.methods(),
            ["rp_getRegistrationOptions", "rp_getRegistrationVerification"]
        );
    }

    #[tokio::test]
    async fn unverified_registration_fails() {
        let authenticator = SoftwareAuthenticator::new(4);
        let transport = MockTransport::default();
        transport.respond("rp_getRegistrationOptions", json!({"challenge": "AAAA"}));
        transport.respond("rp_getRegistrationVerification", json!({"verified": false}));

        let result = to_webauthn_credential(
            &transport,
            &authenticator,
            &WebAuthnMode::Register {
                username: "alice".to_string(),
            },
        )
        .await;

        assert!(matches!(result, Err(Error::RegistrationNotVerified)));
    }

    #[tokio::test]
    async fn login_ceremony_uses_verified_public_key() {
        let authenticator = SoftwareAuthenticator::new(5);
        let transport = MockTransport::default();
        transport.respond(
            "rp_getLoginOptions",
            json!({"challenge": "AAAA", "rpId": "example.com"}),
        );
        transport.respond(
            "rp_getLoginVerification",
            json!({"publicKey": URL_SAFE_NO_PAD.encode(authenticator.spki_der())}),
        );

        let credential = to_webauthn_credential(
            &transport,
            &authenticator,
            &WebAuthnMode::Login { user_id: None },
        )
        .await
        .unwrap();

        assert_eq!(credential.id, authenticator.credential().id);
        assert_eq!(credential.coordinates().unwrap(), authenticator.coordinates());
    }

    #[test]
    fn strip_rp_id_from_both_option_shapes() {
        let mut creation =
            json!({"rp": {"id": "example.com", "name": "Example"}, "challenge": "AA"});
        strip_rp_id(&mut creation);
        assert_eq!(creation, json!({"rp": {"name": "Example"}, "challenge": "AA"}));

        let mut request = json!({"rpId": "example.com", "challenge": "AA"});
        strip_rp_id(&mut request);
        assert_eq!(request, json!({"challenge": "AA"}));
    }

    #[test]
    fn base64url_with_and_without_padding() {
        assert_eq!(decode_base64url("AQI").unwrap(), vec![1, 2]);
        assert_eq!(decode_base64url("AQI=").unwrap(), vec![1, 2]);
        assert!(decode_base64url("***").is_err());
    }
}
