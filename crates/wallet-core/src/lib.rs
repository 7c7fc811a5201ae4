//! Modular Wallet Core Library
//!
//! This crate provides the core of an SDK for ERC-4337 smart accounts owned
//! by passkeys (WebAuthn, P-256) or EOAs, built on a weighted multisig
//! plugin.
//!
//! # Overview
//!
//! This library provides:
//!
//! - **Address Derivation**: owner sender ids and `CREATE2` account addresses
//! - **Replay-Safe Hashing**: binding hashes to one account, chain and plugin
//! - **Signature Wrapping**: the plugin's contract and EOA signature formats,
//!   including the WebAuthn verifier encoding
//! - **Smart Accounts**: signing, call encoding and deployment arguments
//! - **Recovery**: adding a mnemonic-derived EOA as backup owner and using it
//!   to install a new passkey
//! - **RPC**: typed JSON-RPC wrappers for the wallet backend, relying party,
//!   bundler and paymaster
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │        Recovery         │    BundlerClient / Paymaster      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      SmartAccount                           │
//! ├──────────────┬──────────────┬───────────────┬───────────────┤
//! │   Address    │ Replay-Safe  │   Signature   │  User         │
//! │  Derivation  │    Hash      │   Wrapping    │  Operations   │
//! ├──────────────┴──────────────┴───────────────┴───────────────┤
//! │   Owners: WebAuthnAccount (passkey) │ LocalSigner (EOA)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │     RPC: Transport trait, HTTP transport, typed methods     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## Encoding Calls
//!
//! ```rust
//! use modular_wallet_core::{Call, encode_calls};
//! use alloy_primitives::{Address, U256};
//!
//! let call = Call::new(Address::repeat_byte(0x01)).with_value(U256::from(1));
//! let calldata = encode_calls(&[call]);
//!
//! // execute(address,uint256,bytes)
//! assert_eq!(&calldata[..4], &[0xb6, 0x1d, 0x27, 0xf6]);
//! ```
//!
//! ## Replay-Safe Hashing
//!
//! ```rust
//! use modular_wallet_core::config::ReplaySafeDomain;
//! use modular_wallet_core::replay_safe::{ReplaySafeHashParams, to_replay_safe_hash};
//! use alloy_primitives::{Address, B256};
//!
//! let params = ReplaySafeHashParams {
//!     account: Address::repeat_byte(0xaa),
//!     chain_id: 1,
//!     plugin: Address::repeat_byte(0xbb),
//!     hash: B256::repeat_byte(0x01),
//! };
//! let hash = to_replay_safe_hash(&ReplaySafeDomain::default(), &params);
//! assert_ne!(hash, params.hash);
//! ```
//!
//! ## Typed Data
//!
//! ```rust
//! use modular_wallet_core::eip712;
//! use serde_json::json;
//!
//! let typed_data = json!({
//!     "types": {
//!         "Transfer": [
//!             {"name": "to", "type": "address"},
//!             {"name": "amount", "type": "uint256"}
//!         ]
//!     },
//!     "primaryType": "Transfer",
//!     "domain": {"name": "My DApp", "version": "1", "chainId": 1},
//!     "message": {
//!         "to": "0x0000000000000000000000000000000000000001",
//!         "amount": "1000000000000000000"
//!     }
//! });
//!
//! let typed_data = eip712::from_json(&typed_data.to_string()).unwrap();
//! let hash = eip712::signing_hash(&typed_data).unwrap();
//! ```
//!
//! ## Sending a User Operation
//!
//! ```ignore
//! use std::rc::Rc;
//! use modular_wallet_core::{BundlerClient, Call, Client, Config, SmartAccount};
//! use modular_wallet_core::rpc::http::HttpTransport;
//! use modular_wallet_core::webauthn::{WebAuthnAccount, WebAuthnMode, to_webauthn_credential};
//!
//! let config = Config::from_file("wallet.json")?;
//! let transport = Rc::new(HttpTransport::modular_wallet(&config.transport)?);
//! let client = Client::connect(transport.clone(), config.deployment.entry_point).await?;
//!
//! // `authenticator` drives navigator.credentials, see the wasm crate
//! let mode = WebAuthnMode::Register { username: "alice".into() };
//! let credential = to_webauthn_credential(&*transport, &*authenticator, &mode).await?;
//! let owner = WebAuthnAccount::new(credential, authenticator).into();
//!
//! let account = SmartAccount::new(client.clone(), owner, config.deployment, Default::default()).await?;
//! let bundler = BundlerClient::new(client).with_account(account);
//! let hash = bundler.send_user_operation(None, &[Call::new(recipient)]).await?;
//! ```
//!
//! # Concurrency
//!
//! The SDK targets single-threaded runtimes, browsers first. Futures are not
//! `Send` and shared owners use [`std::rc::Rc`].
//!
//! # Logging
//!
//! Diagnostics are emitted through [`tracing`]; no subscriber is installed.
//! Mnemonics, private keys and client keys are never logged.

// Modules
pub mod abi;
pub mod account;
pub mod address;
pub mod client;
pub mod config;
pub mod crypto;
pub mod eip712;
pub mod error;
pub mod gas;
pub mod owner;
pub mod recovery;
pub mod replay_safe;
pub mod rpc;
pub mod signature;
pub mod user_operation;
pub mod webauthn;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use account::{Call, FactoryArgs, SmartAccount, SmartAccountOptions, encode_calls};
pub use client::{BundlerClient, Client, Fees, Paymaster};
pub use config::{AccountDeployment, AppInfo, Config, ReplaySafeDomain, TransportConfig};
pub use eip712::{Eip712Domain, TypedData};
pub use error::{Error, Result, RpcError, RpcErrorCode};
pub use owner::{ExternalWalletOwner, LocalSigner, Owner, WalletSigner};
pub use recovery::{RecoverySession, RecoveryState};
pub use user_operation::UserOperation;
pub use webauthn::{WebAuthnAccount, WebAuthnAuthenticator, WebAuthnCredential};

// Re-export commonly used alloy types
pub use alloy_primitives::{Address, B256, Bytes, U256};
