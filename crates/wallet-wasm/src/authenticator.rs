//! `navigator.credentials` as a [`WebAuthnAuthenticator`].
//!
//! The relying party hands out ceremony options in WebAuthn JSON form, with
//! binary fields base64url encoded. The browser API wants `ArrayBuffer`s for
//! those fields and returns `ArrayBuffer`s in the credential, so this module
//! converts in both directions.
//!
//! # Extension Contexts
//!
//! A browser extension cannot claim the relying party id of a web origin.
//! When running from a `chrome-extension:` page the `rp.id` and `rpId`
//! options are removed and the platform falls back to the extension origin.
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use modular_wallet_core::webauthn::{WebAuthnMode, to_webauthn_credential};
//! use modular_wallet_wasm::BrowserAuthenticator;
//!
//! // Must run from a user gesture
//! let authenticator = Rc::new(BrowserAuthenticator::new());
//! let mode = WebAuthnMode::Login;
//! let credential = to_webauthn_credential(&transport, &*authenticator, &mode).await?;
//! ```

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use js_sys::{Array, Function, Object, Reflect, Uint8Array};
use modular_wallet_core::error::Result as CoreResult;
use modular_wallet_core::webauthn::{
    AssertionResponse, AttestationResponse, AuthenticatorAssertion, RegistrationResponse,
    WebAuthnAuthenticator, decode_base64url, strip_rp_id,
};
use serde_json::Value;
use tracing::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{CredentialCreationOptions, CredentialRequestOptions, CredentialsContainer};

use crate::error::{WasmError, WasmResult};

/// Credential type of every WebAuthn credential.
const PUBLIC_KEY_CREDENTIAL_TYPE: &str = "public-key";

/// Base64url fields of `PublicKeyCredentialCreationOptions`.
const CREATION_BINARY_FIELDS: &[&str] = &["challenge"];

/// Base64url fields of `PublicKeyCredentialRequestOptions`.
const REQUEST_BINARY_FIELDS: &[&str] = &["challenge"];

/// Authenticator backed by the browser's WebAuthn API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserAuthenticator {
    /// Whether options are rewritten for an extension origin.
    extension: bool,
}

impl Default for BrowserAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserAuthenticator {
    /// Creates an authenticator for the current page.
    ///
    /// Extension contexts are detected from the page location.
    #[must_use]
    pub fn new() -> Self {
        Self {
            extension: crate::is_extension_context(),
        }
    }

    /// Creates an authenticator with explicit extension handling.
    #[must_use]
    pub const fn with_extension(extension: bool) -> Self {
        Self { extension }
    }

    /// Returns `true` if the relying party id is stripped from options.
    #[must_use]
    pub const fn is_extension(&self) -> bool {
        self.extension
    }

    async fn create_credential(&self, options: Value) -> WasmResult<RegistrationResponse> {
        let options = prepare_options(options, self.extension);
        let public_key = to_js_options(&options, CREATION_BINARY_FIELDS)?;
        let user = get(&public_key, "user")?;
        if user.is_object() {
            decode_field(&user, "id")?;
        }
        decode_list(&public_key, "excludeCredentials")?;

        let container = credentials()?;
        let request: CredentialCreationOptions = wrap_public_key(&public_key)?.unchecked_into();

        debug!(extension = self.extension, "requesting passkey creation");
        let credential = JsFuture::from(container.create_with_options(&request)?).await?;
        if credential.is_null() || credential.is_undefined() {
            return Err(WasmError::NoCredentialCreated);
        }

        read_registration(&credential)
    }

    async fn get_credential(&self, options: Value) -> WasmResult<AssertionResponse> {
        let options = prepare_options(options, self.extension);
        let public_key = to_js_options(&options, REQUEST_BINARY_FIELDS)?;
        decode_list(&public_key, "allowCredentials")?;

        let container = credentials()?;
        let request: CredentialRequestOptions = wrap_public_key(&public_key)?.unchecked_into();

        debug!(extension = self.extension, "requesting passkey assertion");
        let credential = JsFuture::from(container.get_with_options(&request)?).await?;
        if credential.is_null() || credential.is_undefined() {
            return Err(WasmError::NoCredentialAvailable);
        }

        read_assertion(&credential)
    }
}

#[async_trait(?Send)]
impl WebAuthnAuthenticator for BrowserAuthenticator {
    async fn create(&self, options: Value) -> CoreResult<RegistrationResponse> {
        Ok(self.create_credential(options).await?)
    }

    async fn get(&self, options: Value) -> CoreResult<AssertionResponse> {
        Ok(self.get_credential(options).await?)
    }
}

/// Unwraps a `{ publicKey }` envelope and strips the relying party id in
/// extension contexts.
///
/// Relying parties return either the bare options or the envelope the
/// browser API takes; both are accepted.
#[must_use]
pub fn prepare_options(options: Value, extension: bool) -> Value {
    let mut options = match options {
        Value::Object(mut map) if map.contains_key("publicKey") => {
            map.remove("publicKey").unwrap_or(Value::Null)
        }
        other => other,
    };
    if extension {
        strip_rp_id(&mut options);
    }
    options
}

fn credentials() -> WasmResult<CredentialsContainer> {
    let window = web_sys::window().ok_or(WasmError::WebAuthnNotSupported)?;
    let navigator = window.navigator();
    if !Reflect::has(&navigator, &JsValue::from_str("credentials")).unwrap_or(false) {
        return Err(WasmError::WebAuthnNotSupported);
    }
    Ok(navigator.credentials())
}

/// Parses JSON options into a JavaScript object, decoding `fields` from
/// base64url into byte arrays.
fn to_js_options(options: &Value, fields: &[&str]) -> WasmResult<JsValue> {
    let object = js_sys::JSON::parse(&options.to_string())?;
    for field in fields {
        decode_field(&object, field)?;
    }
    Ok(object)
}

fn wrap_public_key(public_key: &JsValue) -> WasmResult<Object> {
    let envelope = Object::new();
    Reflect::set(&envelope, &JsValue::from_str("publicKey"), public_key)?;
    Ok(envelope)
}

/// Replaces a base64url string property with its bytes.
fn decode_field(target: &JsValue, key: &str) -> WasmResult<()> {
    let key = JsValue::from_str(key);
    let Some(encoded) = Reflect::get(target, &key)?.as_string() else {
        return Ok(());
    };
    let bytes = decode_base64url(&encoded)?;
    Reflect::set(target, &key, &Uint8Array::from(bytes.as_slice()))?;
    Ok(())
}

/// Decodes the `id` of each credential descriptor in a list property.
fn decode_list(target: &JsValue, key: &str) -> WasmResult<()> {
    let list = Reflect::get(target, &JsValue::from_str(key))?;
    if !Array::is_array(&list) {
        return Ok(());
    }
    for descriptor in Array::from(&list).iter().filter(JsValue::is_object) {
        decode_field(&descriptor, "id")?;
    }
    Ok(())
}

fn get(target: &JsValue, key: &str) -> WasmResult<JsValue> {
    Ok(Reflect::get(target, &JsValue::from_str(key))?)
}

fn string_field(target: &JsValue, key: &str) -> WasmResult<Option<String>> {
    Ok(get(target, key)?.as_string())
}

fn required_string(target: &JsValue, key: &str) -> WasmResult<String> {
    string_field(target, key)?
        .ok_or_else(|| WasmError::InvalidInput(format!("credential is missing {key}")))
}

/// Encodes an `ArrayBuffer` (or view) as base64url.
fn encode_buffer(value: &JsValue) -> Option<String> {
    if value.is_null() || value.is_undefined() {
        return None;
    }
    Some(URL_SAFE_NO_PAD.encode(Uint8Array::new(value).to_vec()))
}

fn buffer_field(target: &JsValue, key: &str) -> WasmResult<Option<String>> {
    Ok(encode_buffer(&get(target, key)?))
}

fn required_buffer(target: &JsValue, key: &str) -> WasmResult<String> {
    buffer_field(target, key)?
        .ok_or_else(|| WasmError::InvalidInput(format!("credential is missing {key}")))
}

/// Calls a zero-argument method if the object has it.
fn call_method(target: &JsValue, name: &str) -> WasmResult<Option<JsValue>> {
    let Ok(method) = get(target, name)?.dyn_into::<Function>() else {
        return Ok(None);
    };
    Ok(Some(method.call0(target)?))
}

fn extension_results(credential: &JsValue) -> WasmResult<Value> {
    let Some(results) = call_method(credential, "getClientExtensionResults")? else {
        return Ok(Value::Object(Default::default()));
    };
    let json: String = js_sys::JSON::stringify(&results)?.into();
    serde_json::from_str(&json).map_err(|e| WasmError::InvalidInput(e.to_string()))
}

fn read_registration(credential: &JsValue) -> WasmResult<RegistrationResponse> {
    let response = get(credential, "response")?;

    let public_key = call_method(&response, "getPublicKey")?.and_then(|key| encode_buffer(&key));
    let public_key_algorithm = call_method(&response, "getPublicKeyAlgorithm")?
        .and_then(|alg| alg.as_f64())
        .map(|alg| alg as i64);
    let transports = call_method(&response, "getTransports")?
        .filter(Array::is_array)
        .map(|list| Array::from(&list).iter().filter_map(|t| t.as_string()).collect())
        .unwrap_or_default();

    Ok(RegistrationResponse {
        id: required_string(credential, "id")?,
        raw_id: required_buffer(credential, "rawId")?,
        response: AttestationResponse {
            client_data_json: required_buffer(&response, "clientDataJSON")?,
            attestation_object: required_buffer(&response, "attestationObject")?,
            public_key,
            public_key_algorithm,
            transports,
        },
        authenticator_attachment: string_field(credential, "authenticatorAttachment")?,
        client_extension_results: extension_results(credential)?,
        credential_type: string_field(credential, "type")?
            .unwrap_or_else(|| PUBLIC_KEY_CREDENTIAL_TYPE.to_string()),
    })
}

fn read_assertion(credential: &JsValue) -> WasmResult<AssertionResponse> {
    let response = get(credential, "response")?;

    Ok(AssertionResponse {
        id: required_string(credential, "id")?,
        raw_id: required_buffer(credential, "rawId")?,
        response: AuthenticatorAssertion {
            client_data_json: required_buffer(&response, "clientDataJSON")?,
            authenticator_data: required_buffer(&response, "authenticatorData")?,
            signature: required_buffer(&response, "signature")?,
            user_handle: buffer_field(&response, "userHandle")?,
        },
        authenticator_attachment: string_field(credential, "authenticatorAttachment")?,
        client_extension_results: extension_results(credential)?,
        credential_type: string_field(credential, "type")?
            .unwrap_or_else(|| PUBLIC_KEY_CREDENTIAL_TYPE.to_string()),
    })
}
