//! Account owners.
//!
//! An account is controlled by exactly one [`Owner`]: a passkey or an EOA.
//! Every place that behaves differently per owner kind matches on the enum,
//! so adding a kind is a compile-time decision.
//!
//! EOA owners come in two flavors:
//!
//! - a local private key ([`PrivateKeySigner`]), which can sign raw hashes
//! - an external wallet ([`ExternalWalletOwner`]), which only signs
//!   EIP-191 messages

use std::fmt;
use std::rc::Rc;

use alloy_primitives::{Address, B256, Bytes};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::webauthn::WebAuthnAccount;

/// An EOA that can sign for an account.
#[async_trait(?Send)]
pub trait LocalSigner: fmt::Debug {
    /// The EOA address.
    fn address(&self) -> Address;

    /// Signs an EIP-191 personal message, returning `r || s || v`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signer`] if signing fails.
    async fn sign_message(&self, message: &[u8]) -> Result<Bytes>;

    /// Signs a raw 32-byte hash, returning `r || s || v`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RawSignUnsupported`] unless the signer holds its key.
    async fn sign_hash(&self, _hash: &B256) -> Result<Bytes> {
        Err(Error::RawSignUnsupported)
    }
}

#[async_trait(?Send)]
impl LocalSigner for PrivateKeySigner {
    fn address(&self) -> Address {
        alloy_signer::Signer::address(self)
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Bytes> {
        let signature = alloy_signer::Signer::sign_message(self, message).await?;
        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Bytes> {
        let signature = alloy_signer::Signer::sign_hash(self, hash).await?;
        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }
}

/// A browser or remote wallet, e.g. an injected EIP-1193 provider.
#[async_trait(?Send)]
pub trait WalletSigner: fmt::Debug {
    /// The currently selected account, if any.
    fn account(&self) -> Option<Address>;

    /// Signs an EIP-191 personal message with `account` (`personal_sign`).
    ///
    /// # Errors
    ///
    /// Returns an error if the wallet rejects the request.
    async fn sign_message(&self, account: Address, message: &[u8]) -> Result<Bytes>;
}

/// An EOA owner backed by an external wallet.
///
/// External wallets never expose raw hash signing, so this owner cannot sign
/// replay-safe hashes; it can sign user operations.
#[derive(Debug)]
pub struct ExternalWalletOwner<W> {
    wallet: W,
    address: Address,
}

impl<W: WalletSigner> ExternalWalletOwner<W> {
    /// Wraps a wallet, binding its current account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WalletAccountMissing`] if the wallet has no account.
    pub fn new(wallet: W) -> Result<Self> {
        let address = wallet.account().ok_or(Error::WalletAccountMissing)?;
        Ok(Self { wallet, address })
    }
}

#[async_trait(?Send)]
impl<W: WalletSigner> LocalSigner for ExternalWalletOwner<W> {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Bytes> {
        self.wallet.sign_message(self.address, message).await
    }
}

/// The owner of a smart account.
#[derive(Debug, Clone)]
pub enum Owner {
    /// A passkey.
    WebAuthn(WebAuthnAccount),

    /// An EOA.
    Local(Rc<dyn LocalSigner>),
}

impl Owner {
    /// Wraps any [`LocalSigner`].
    pub fn local(signer: impl LocalSigner + 'static) -> Self {
        Self::Local(Rc::new(signer))
    }

    /// Short owner kind for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::WebAuthn(_) => "webauthn",
            Self::Local(_) => "local",
        }
    }

    /// The passkey, if this is a WebAuthn owner.
    #[must_use]
    pub const fn as_webauthn(&self) -> Option<&WebAuthnAccount> {
        match self {
            Self::WebAuthn(account) => Some(account),
            Self::Local(_) => None,
        }
    }
}

impl From<WebAuthnAccount> for Owner {
    fn from(account: WebAuthnAccount) -> Self {
        Self::WebAuthn(account)
    }
}

impl From<PrivateKeySigner> for Owner {
    fn from(signer: PrivateKeySigner) -> Self {
        Self::local(signer)
    }
}
