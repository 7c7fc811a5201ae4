//! Modular Wallet WASM Library
//!
//! This crate provides WebAssembly bindings for the modular wallet SDK:
//! a [`WebAuthnAuthenticator`](modular_wallet_core::WebAuthnAuthenticator)
//! backed by `navigator.credentials`, and stateless helpers for address,
//! hash and signature encoding.
//!
//! # Browser Support
//!
//! Passkeys need WebAuthn, available in all current browsers. Ceremonies
//! must be started from a user gesture in a secure context (HTTPS or
//! `localhost`).
//!
//! # Extension Contexts
//!
//! Pages served from `chrome-extension:` may not claim a web relying party
//! id. [`BrowserAuthenticator`] detects this and drops the id from the
//! ceremony options.
//!
//! # Quick Start
//!
//! ```javascript
//! import init, {
//!     isWebAuthnSupported, getSender, encodeCalls, wrapSignature,
//! } from 'modular-wallet-wasm';
//!
//! // Initialize WASM module
//! await init();
//!
//! if (!isWebAuthnSupported()) {
//!     throw new Error("passkeys are not available");
//! }
//!
//! const sender = getSender(publicKeyHex);
//! const calldata = encodeCalls(JSON.stringify([{ to: "0x...", value: "0x1" }]));
//! const signature = wrapSignature(sender, innerSignatureHex, true);
//! ```
//!
//! # API Reference
//!
//! - [`getVersion()`](get_version) - Library version
//! - [`isWebAuthnSupported()`](is_webauthn_supported) - Whether passkeys are available
//! - [`isExtensionContext()`](is_extension_context) - Whether running in a browser extension
//! - [`getSender(publicKey)`](bindings::get_sender) - Sender id of a passkey
//! - [`toReplaySafeHash(account, chainId, plugin, hash)`](bindings::replay_safe_hash) - Replay-safe hash
//! - [`encodeCalls(callsJson)`](bindings::encode_calls) - Account calldata
//! - [`wrapSignature(sender, signature, hasUserOpGas)`](bindings::wrap_contract_signature) - Contract signature layout
//! - [`wrapEoaSignature(signature, hasUserOpGas)`](bindings::wrap_eoa) - EOA signature layout

pub mod authenticator;
pub mod bindings;
pub mod error;

pub use authenticator::BrowserAuthenticator;
pub use error::{WasmError, WasmResult};

use wasm_bindgen::prelude::*;

/// URL scheme of Chromium extension pages.
const EXTENSION_PROTOCOL: &str = "chrome-extension:";

/// Initializes the WASM module.
///
/// This function is automatically called when the module is loaded,
/// but can be called explicitly if needed.
#[wasm_bindgen(start)]
#[expect(clippy::missing_const_for_fn, reason = "not a stable API function")]
pub fn init() {
    // Nothing to initialize for now
}

/// Checks if WebAuthn is available in the current context.
///
/// # Returns
///
/// `true` if `navigator.credentials` and `PublicKeyCredential` exist.
///
/// # Example
///
/// ```javascript
/// if (!isWebAuthnSupported()) {
///     alert("Passkeys are not supported in this browser.");
/// }
/// ```
#[wasm_bindgen(js_name = "isWebAuthnSupported")]
pub fn is_webauthn_supported() -> bool {
    let Some(window) = web_sys::window() else {
        return false;
    };
    let navigator: web_sys::Navigator = window.navigator();
    js_sys::Reflect::has(&navigator, &JsValue::from_str("credentials")).unwrap_or(false)
        && js_sys::Reflect::has(&window, &JsValue::from_str("PublicKeyCredential"))
            .unwrap_or(false)
}

/// Checks if the code runs on a browser extension page.
#[wasm_bindgen(js_name = "isExtensionContext")]
pub fn is_extension_context() -> bool {
    web_sys::window()
        .and_then(|window| window.location().protocol().ok())
        .is_some_and(|protocol| is_extension_protocol(&protocol))
}

fn is_extension_protocol(protocol: &str) -> bool {
    protocol == EXTENSION_PROTOCOL
}

/// Returns the library version.
///
/// # Returns
///
/// The version string (e.g., `"0.1.0"`).
#[wasm_bindgen(js_name = "getVersion")]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Import for WASM tests
    #[expect(unused_imports, reason = "import for WASM tests")]
    use wasm_bindgen_test::wasm_bindgen_test;

    #[test]
    fn version() {
        let version = get_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn extension_protocol() {
        assert!(is_extension_protocol("chrome-extension:"));
        assert!(!is_extension_protocol("https:"));
        assert!(!is_extension_protocol("chrome-extension"));
    }
}
