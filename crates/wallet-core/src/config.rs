//! SDK configuration.
//!
//! Nothing in this crate reads ambient state: the SDK version, the caller's
//! origin and every contract constant reach the code through the values
//! defined here.
//!
//! # Example
//!
//! ```
//! use modular_wallet_core::config::Config;
//!
//! let config = Config::from_json(r#"{
//!     "transport": {
//!         "url": "https://modular-sdk.example.com/v1/rpc/w3s/buidl",
//!         "clientKey": "TEST_CLIENT_KEY",
//!         "appInfo": { "platform": "web", "sdkVersion": "0.1.0", "origin": "https://app.example.com" }
//!     },
//!     "deployment": {
//!         "factory": "0x0000000df7e6c9dc387cafc5ecbfa6c3a6179add",
//!         "implementation": "0x0000000e4c6b2a6cae2d0b6ba9f1e5af0d0a5d5e",
//!         "plugin": "0x0000000c984aff541d6ce86bb697e68ec57873c8",
//!         "pluginManifestHash": "0x0000000000000000000000000000000000000000000000000000000000000000",
//!         "proxyCreationCode": "0x60806040"
//!     }
//! }"#).unwrap();
//!
//! assert_eq!(config.transport.app_info.platform, "web");
//! ```

use std::fs;
use std::path::Path;

use alloy_primitives::{Address, B256, Bytes, address};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The ERC-4337 v0.7 `EntryPoint` singleton.
pub const ENTRY_POINT_V07: Address = address!("0000000071727De22E5E9d8BAf0edAc6f37da032");

/// Identifies the calling application in the `X-AppInfo` request header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    /// Platform name, e.g. `web` or `rust`.
    pub platform: String,

    /// Version of this SDK as reported to the backend.
    pub sdk_version: String,

    /// Caller origin: a web origin or `chrome-extension://<id>`.
    pub origin: String,
}

impl AppInfo {
    /// Creates app info for a native Rust caller, reporting this crate's version.
    #[must_use]
    pub fn native(origin: impl Into<String>) -> Self {
        Self {
            platform: "rust".to_string(),
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            origin: origin.into(),
        }
    }

    /// Creates app info for a browser extension.
    #[must_use]
    pub fn extension(extension_id: &str, sdk_version: impl Into<String>) -> Self {
        Self {
            platform: "web".to_string(),
            sdk_version: sdk_version.into(),
            origin: format!("chrome-extension://{extension_id}"),
        }
    }

    /// Renders the `X-AppInfo` header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!(
            "platform={};version={};uri={}",
            self.platform, self.sdk_version, self.origin
        )
    }
}

/// Connection settings for an HTTP JSON-RPC transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    /// Endpoint URL.
    pub url: String,

    /// Client key sent as a bearer token.
    pub client_key: String,

    /// Caller identification.
    pub app_info: AppInfo,
}

/// Constants of the replay-safe signing domain of the multisig plugin.
///
/// These must match the deployed module byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySafeDomain {
    /// Module name.
    pub name: String,

    /// Module version.
    pub version: String,

    /// Type string hashed into the domain separator type hash.
    pub domain_separator_type: String,

    /// Type string hashed into the message type hash.
    pub module_type: String,
}

impl Default for ReplaySafeDomain {
    fn default() -> Self {
        Self {
            name: "Weighted Multisig Webauthn Plugin".to_string(),
            version: "1.0.0".to_string(),
            domain_separator_type:
                "EIP712Domain(bytes32 moduleId,uint256 chainId,address verifyingContract,bytes32 salt)"
                    .to_string(),
            module_type: "CircleWeightedWebauthnMultisigMessage(bytes32 hash)".to_string(),
        }
    }
}

const fn default_entry_point() -> Address {
    ENTRY_POINT_V07
}

/// On-chain contracts an account is deployed from and validated by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDeployment {
    /// The `EntryPoint` the account is bound to.
    #[serde(default = "default_entry_point")]
    pub entry_point: Address,

    /// The account factory performing `CREATE2`.
    pub factory: Address,

    /// The account implementation behind the proxy.
    pub implementation: Address,

    /// The weighted WebAuthn multisig plugin.
    pub plugin: Address,

    /// Manifest hash of the plugin, passed at installation.
    pub plugin_manifest_hash: B256,

    /// Creation code of the proxy the factory deploys.
    pub proxy_creation_code: Bytes,

    /// Replay-safe signing domain constants.
    #[serde(default)]
    pub replay_safe: ReplaySafeDomain,
}

impl AccountDeployment {
    /// Fails when the deployment cannot be used to derive addresses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the proxy creation code is empty or
    /// the factory is the zero address.
    pub fn validate(&self) -> Result<()> {
        if self.proxy_creation_code.is_empty() {
            return Err(Error::InvalidConfig(
                "proxy creation code is empty".to_string(),
            ));
        }
        if self.factory.is_zero() {
            return Err(Error::InvalidConfig(
                "factory address is zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level SDK configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Modular wallet RPC endpoint.
    pub transport: TransportConfig,

    /// Relying party endpoint, when it differs from the wallet endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relying_party: Option<TransportConfig>,

    /// Account contracts.
    pub deployment: AccountDeployment,
}

impl Config {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] if parsing fails, or
    /// [`Error::InvalidConfig`] if the deployment is unusable.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.deployment.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the file cannot be read, otherwise
    /// the errors of [`Config::from_json`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Transport settings for relying party calls.
    #[must_use]
    pub fn relying_party_transport(&self) -> &TransportConfig {
        self.relying_party.as_ref().unwrap_or(&self.transport)
    }
}
