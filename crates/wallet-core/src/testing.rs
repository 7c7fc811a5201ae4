//! Test doubles shared by the unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use alloy_primitives::{Bytes, address, b256};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::EncodePublicKey;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::config::{AccountDeployment, ENTRY_POINT_V07, ReplaySafeDomain};
use crate::error::{Error, Result, RpcError, RpcErrorCode};
use crate::rpc::{Transport, TransportKind};
use crate::webauthn::{
    AssertionResponse, AttestationResponse, AuthenticatorAssertion, RegistrationResponse,
    WebAuthnAuthenticator, WebAuthnCredential,
};

/// A scripted reply.
#[derive(Debug, Clone)]
enum Reply {
    Ok(Value),
    Err(RpcError),
}

/// A transport answering from per-method queues.
///
/// The last queued reply of a method is repeated once the others are used.
#[derive(Debug)]
pub(crate) struct MockTransport {
    kind: TransportKind,
    replies: RefCell<HashMap<String, VecDeque<Reply>>>,
    requests: RefCell<Vec<(String, Value)>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            kind: TransportKind::Generic,
            replies: RefCell::default(),
            requests: RefCell::default(),
        }
    }
}

impl MockTransport {
    pub(crate) fn modular_wallet() -> Self {
        Self {
            kind: TransportKind::ModularWallet,
            ..Self::default()
        }
    }

    pub(crate) fn respond(&self, method: &str, result: Value) {
        self.push(method, Reply::Ok(result));
    }

    pub(crate) fn fail(&self, method: &str, code: i64, message: &str) {
        self.push(
            method,
            Reply::Err(RpcError {
                code: RpcErrorCode::from(code),
                message: message.to_string(),
                data: None,
            }),
        );
    }

    fn push(&self, method: &str, reply: Reply) {
        self.replies
            .borrow_mut()
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    pub(crate) fn methods(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|(m, _)| m.clone()).collect()
    }

    pub(crate) fn requests_for(&self, method: &str) -> Vec<Value> {
        self.requests
            .borrow()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub(crate) fn last_request(&self) -> Option<(String, Value)> {
        self.requests.borrow().last().cloned()
    }
}

#[async_trait(?Send)]
impl Transport for MockTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.requests
            .borrow_mut()
            .push((method.to_string(), params));

        let mut replies = self.replies.borrow_mut();
        let queue = replies
            .get_mut(method)
            .ok_or_else(|| Error::Transport(format!("unexpected request: {method}")))?;
        let reply = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };

        match reply {
            Some(Reply::Ok(value)) => Ok(value),
            Some(Reply::Err(error)) => Err(Error::Rpc(error)),
            None => Err(Error::Transport(format!("no reply for {method}"))),
        }
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }
}

/// A software passkey producing real WebAuthn assertions.
#[derive(Debug)]
pub(crate) struct SoftwareAuthenticator {
    key: SigningKey,
    credential_id: String,
    rp_id: String,
    last_options: RefCell<Option<Value>>,
}

impl SoftwareAuthenticator {
    /// Creates an authenticator with a key derived from `seed`.
    pub(crate) fn new(seed: u8) -> Self {
        let mut secret = [0x11u8; 32];
        secret[31] = seed;
        let key = SigningKey::from_slice(&secret).expect("valid scalar");
        Self {
            key,
            credential_id: URL_SAFE_NO_PAD.encode([seed; 16]),
            rp_id: "localhost".to_string(),
            last_options: RefCell::default(),
        }
    }

    pub(crate) fn credential(&self) -> WebAuthnCredential {
        WebAuthnCredential::new(
            self.credential_id.clone(),
            self.key.verifying_key().to_encoded_point(true).as_bytes(),
            Some(self.rp_id.clone()),
        )
        .expect("valid key")
    }

    pub(crate) fn coordinates(&self) -> ([u8; 32], [u8; 32]) {
        let point = self.key.verifying_key().to_encoded_point(false);
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&point.as_bytes()[1..33]);
        y.copy_from_slice(&point.as_bytes()[33..]);
        (x, y)
    }

    pub(crate) fn spki_der(&self) -> Vec<u8> {
        self.key
            .verifying_key()
            .to_public_key_der()
            .expect("encodable key")
            .as_bytes()
            .to_vec()
    }

    pub(crate) fn last_options(&self) -> Option<Value> {
        self.last_options.borrow().clone()
    }

    fn client_data(ceremony: &str, options: &Value) -> String {
        let challenge = options["challenge"].as_str().unwrap_or_default();
        format!(
            r#"{{"type":"webauthn.{ceremony}","challenge":"{challenge}","origin":"http://localhost:5173","crossOrigin":false}}"#
        )
    }
}

#[async_trait(?Send)]
impl WebAuthnAuthenticator for SoftwareAuthenticator {
    async fn create(&self, options: Value) -> Result<RegistrationResponse> {
        let client_data = Self::client_data("create", &options);
        *self.last_options.borrow_mut() = Some(options);

        Ok(RegistrationResponse {
            id: self.credential_id.clone(),
            raw_id: self.credential_id.clone(),
            response: AttestationResponse {
                client_data_json: URL_SAFE_NO_PAD.encode(client_data),
                attestation_object: URL_SAFE_NO_PAD.encode([0xa0]),
                public_key: Some(URL_SAFE_NO_PAD.encode(self.spki_der())),
                public_key_algorithm: Some(-7),
                transports: vec!["internal".to_string()],
            },
            authenticator_attachment: Some("platform".to_string()),
            client_extension_results: json!({}),
            credential_type: "public-key".to_string(),
        })
    }

    async fn get(&self, options: Value) -> Result<AssertionResponse> {
        let client_data = Self::client_data("get", &options);
        *self.last_options.borrow_mut() = Some(options);

        // rpIdHash || flags (UP | UV) || signCount
        let mut authenticator_data = Sha256::digest(self.rp_id.as_bytes()).to_vec();
        authenticator_data.push(0x05);
        authenticator_data.extend_from_slice(&[0, 0, 0, 1]);

        let mut message = authenticator_data.clone();
        message.extend_from_slice(&Sha256::digest(client_data.as_bytes()));
        let signature: Signature = self.key.sign(&message);

        Ok(AssertionResponse {
            id: self.credential_id.clone(),
            raw_id: self.credential_id.clone(),
            response: AuthenticatorAssertion {
                client_data_json: URL_SAFE_NO_PAD.encode(client_data),
                authenticator_data: URL_SAFE_NO_PAD.encode(&authenticator_data),
                signature: URL_SAFE_NO_PAD.encode(signature.to_der().as_bytes()),
                user_handle: None,
            },
            authenticator_attachment: Some("platform".to_string()),
            client_extension_results: json!({}),
            credential_type: "public-key".to_string(),
        })
    }
}

/// A deployment with placeholder contracts and a short proxy creation code.
pub(crate) fn deployment() -> AccountDeployment {
    AccountDeployment {
        entry_point: ENTRY_POINT_V07,
        factory: address!("0000000df7e6c9dc387cafc5ecbfa6c3a6179add"),
        implementation: address!("0000000e4c6b2a6cae2d0b6ba9f1e5af0d0a5d5e"),
        plugin: address!("0000000c984aff541d6ce86bb697e68ec57873c8"),
        plugin_manifest_hash: b256!(
            "a043327d77a74c1c55cfa799284b831fe09535a88b9f5fa4173d334e5ba0fd91"
        ),
        proxy_creation_code: Bytes::from_static(&[0x60, 0x80, 0x60, 0x40, 0x52]),
        replay_safe: ReplaySafeDomain::default(),
    }
}
