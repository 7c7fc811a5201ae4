//! Passkey recovery through a mnemonic-derived EOA.
//!
//! The flow, as seen by the user:
//!
//! ```text
//! None --generate--> KeyGenerated --register--> Registered
//!      --start--> EnteringMnemonic --process mnemonic--> CreatingPasskey
//!      --execute--> Recovered
//! ```
//!
//! Registering adds the recovery EOA as a zero-threshold owner of the
//! account. After losing the passkey, the user re-enters the mnemonic, a new
//! passkey is registered with the relying party, and the recovery EOA signs a
//! user operation adding it as the sole required signer.
//!
//! Both on-chain steps first record an address mapping with the backend so
//! the account can be found by its new identifier. An existing mapping is not
//! an error: a retried step re-submits its user operation.
//!
//! [`RecoverySession`] holds the persisted state; its transitions are pure
//! and return a new session.

use std::fmt;

use alloy_primitives::{Address, B256, U256};
use alloy_signer_local::coins_bip39::{English, Mnemonic};
use alloy_signer_local::{MnemonicBuilder, PrivateKeySigner};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::abi::{self, PublicKey};
use crate::account::{Call, SmartAccount};
use crate::client::{BundlerClient, Client};
use crate::config::AccountDeployment;
use crate::error::{Error, Result};
use crate::owner::Owner;
use crate::rpc::Transport;
use crate::rpc::bundler::GasEstimate;
use crate::rpc::modular_wallet::{self, AddressMappingOwner, CreateAddressMappingParams};
use crate::webauthn::{
    WebAuthnAuthenticator, WebAuthnCredential, WebAuthnMode, to_webauthn_credential,
};

/// Words in a generated recovery phrase.
const RECOVERY_WORD_COUNT: usize = 12;

/// Weight of an owner added during recovery.
const RECOVERY_OWNER_WEIGHT: u64 = 1;

/// Threshold value that leaves the current threshold unchanged.
const UNCHANGED_THRESHOLD: u64 = 0;

/// Threshold after recovery: the new passkey alone.
const RECOVERED_THRESHOLD: u64 = 1;

/// Where a recovery session is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoveryState {
    /// No recovery key.
    #[default]
    None,

    /// A mnemonic was generated and shown to the user.
    KeyGenerated,

    /// The recovery address is an owner of the account.
    Registered,

    /// The passkey is lost; waiting for the mnemonic.
    EnteringMnemonic,

    /// The mnemonic checked out and a new passkey was registered.
    CreatingPasskey,

    /// The new passkey owns the account.
    Recovered,
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::KeyGenerated => "key-generated",
            Self::Registered => "registered",
            Self::EnteringMnemonic => "entering-mnemonic",
            Self::CreatingPasskey => "creating-passkey",
            Self::Recovered => "recovered",
        };
        f.write_str(name)
    }
}

/// A freshly generated recovery key.
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedRecovery {
    /// The 12-word English mnemonic.
    pub mnemonic: String,

    /// The EOA derived from it.
    pub address: Address,
}

impl fmt::Debug for GeneratedRecovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedRecovery")
            .field("mnemonic", &"<redacted>")
            .field("address", &self.address)
            .finish()
    }
}

/// Persisted recovery progress.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverySession {
    /// Current state.
    pub state: RecoveryState,

    /// The recovery mnemonic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,

    /// The recovery EOA.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_address: Option<Address>,

    /// The passkey currently owning the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<WebAuthnCredential>,

    /// The passkey being installed by recovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_credential: Option<WebAuthnCredential>,
}

impl fmt::Debug for RecoverySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoverySession")
            .field("state", &self.state)
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "<redacted>"))
            .field("recovery_address", &self.recovery_address)
            .field("credential", &self.credential.as_ref().map(|c| &c.id))
            .field("new_credential", &self.new_credential.as_ref().map(|c| &c.id))
            .finish()
    }
}

impl RecoverySession {
    /// An empty session for an account owned by `credential`.
    #[must_use]
    pub fn new(credential: Option<WebAuthnCredential>) -> Self {
        Self {
            credential,
            ..Self::default()
        }
    }

    fn expect(&self, allowed: &[RecoveryState], action: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidRecoveryTransition {
                state: self.state.to_string(),
                action,
            })
        }
    }

    /// `None -> KeyGenerated`: stores the generated key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecoveryTransition`] from any other state.
    pub fn key_generated(&self, recovery: &GeneratedRecovery) -> Result<Self> {
        self.expect(&[RecoveryState::None], "generate a recovery key")?;
        Ok(Self {
            state: RecoveryState::KeyGenerated,
            mnemonic: Some(recovery.mnemonic.clone()),
            recovery_address: Some(recovery.address),
            ..self.clone()
        })
    }

    /// `KeyGenerated -> Registered`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecoveryTransition`] from any other state.
    pub fn registered(&self) -> Result<Self> {
        self.expect(&[RecoveryState::KeyGenerated], "register the recovery address")?;
        Ok(Self {
            state: RecoveryState::Registered,
            ..self.clone()
        })
    }

    /// `Registered | None -> EnteringMnemonic`: drops the lost passkey.
    ///
    /// Starting from `None` covers a new device without a persisted session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecoveryTransition`] from any other state.
    pub fn start_recovery(&self) -> Result<Self> {
        self.expect(
            &[RecoveryState::None, RecoveryState::Registered],
            "start recovery",
        )?;
        Ok(Self {
            state: RecoveryState::EnteringMnemonic,
            credential: None,
            ..self.clone()
        })
    }

    /// `EnteringMnemonic -> CreatingPasskey`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecoveryTransition`] from any other state.
    pub fn mnemonic_processed(
        &self,
        mnemonic: &str,
        recovery_address: Address,
        new_credential: WebAuthnCredential,
    ) -> Result<Self> {
        self.expect(&[RecoveryState::EnteringMnemonic], "process the recovery phrase")?;
        Ok(Self {
            state: RecoveryState::CreatingPasskey,
            mnemonic: Some(mnemonic.to_string()),
            recovery_address: Some(recovery_address),
            new_credential: Some(new_credential),
            ..self.clone()
        })
    }

    /// `CreatingPasskey -> Recovered`: the new passkey becomes the current one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecoveryTransition`] from any other state, or
    /// [`Error::RecoveryDataMissing`] without a new passkey.
    pub fn recovered(&self) -> Result<Self> {
        self.expect(&[RecoveryState::CreatingPasskey], "execute recovery")?;
        let credential = self
            .new_credential
            .clone()
            .ok_or(Error::RecoveryDataMissing("the new credential"))?;
        Ok(Self {
            state: RecoveryState::Recovered,
            mnemonic: None,
            credential: Some(credential),
            new_credential: None,
            ..self.clone()
        })
    }

    /// Back to `None`, from any state, clearing everything.
    #[must_use]
    pub fn reset(&self) -> Self {
        Self::default()
    }
}

/// Generates a recovery mnemonic and its EOA. Runs locally.
///
/// # Errors
///
/// Returns [`Error::InvalidMnemonic`] if key derivation fails.
pub fn generate_recovery() -> Result<GeneratedRecovery> {
    let mnemonic = Mnemonic::<English>::new_with_count(&mut rand::thread_rng(), RECOVERY_WORD_COUNT)
        .map_err(|e| Error::InvalidMnemonic(e.to_string()))?
        .to_phrase();
    let address = recovery_signer(&mnemonic)?.address();

    info!(%address, "generated recovery key");
    Ok(GeneratedRecovery { mnemonic, address })
}

/// The recovery EOA of a mnemonic, at `m/44'/60'/0'/0/0`.
///
/// # Errors
///
/// Returns [`Error::InvalidMnemonic`] if the phrase fails BIP-39 validation.
pub fn recovery_signer(mnemonic: &str) -> Result<PrivateKeySigner> {
    let phrase = mnemonic
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    Ok(MnemonicBuilder::<English>::default().phrase(phrase).build()?)
}

/// A facade for the account at `address` signed by the recovery EOA.
///
/// # Errors
///
/// Returns [`Error::InvalidMnemonic`] for a bad phrase, or
/// [`Error::InvalidConfig`] for an incomplete deployment.
pub fn recovery_account(
    client: Client,
    mnemonic: &str,
    deployment: AccountDeployment,
    address: Address,
) -> Result<SmartAccount> {
    let signer = recovery_signer(mnemonic)?;
    SmartAccount::with_recovery_owner(client, Owner::from(signer), deployment, address)
}

/// Username of the passkey created during recovery.
#[must_use]
pub fn recovery_username(base: &str, recovery_address: Address) -> String {
    let hex = hex::encode(recovery_address.as_slice());
    format!("{base}-{}", &hex[..8])
}

/// Validates the mnemonic and registers a new passkey, moving the session to
/// `CreatingPasskey`.
///
/// An invalid mnemonic fails before any ceremony, leaving the caller's
/// session as it was.
///
/// # Errors
///
/// Returns [`Error::InvalidRecoveryTransition`] outside `EnteringMnemonic`,
/// [`Error::InvalidMnemonic`] for a bad phrase, or the registration error.
pub async fn process_recovery_mnemonic(
    session: &RecoverySession,
    transport: &(impl Transport + ?Sized),
    authenticator: &(impl WebAuthnAuthenticator + ?Sized),
    mnemonic: &str,
    username: &str,
) -> Result<RecoverySession> {
    session.expect(&[RecoveryState::EnteringMnemonic], "process the recovery phrase")?;

    let recovery_address = recovery_signer(mnemonic)?.address();
    let mode = WebAuthnMode::Register {
        username: recovery_username(username, recovery_address),
    };
    let credential = to_webauthn_credential(transport, authenticator, &mode).await?;

    info!(%recovery_address, credential = %credential.id, "recovery phrase accepted");
    session.mnemonic_processed(mnemonic, recovery_address, credential)
}

/// Records an address mapping, treating an existing one as success.
async fn create_address_mapping(
    transport: &(impl Transport + ?Sized),
    wallet_address: Address,
    owner: AddressMappingOwner,
) -> Result<()> {
    let params = CreateAddressMappingParams {
        wallet_address,
        owners: vec![owner],
    };

    match modular_wallet::create_address_mapping(transport, &params).await {
        Ok(_) => Ok(()),
        Err(err) if err.is_address_mapping_conflict() => {
            warn!(%wallet_address, "address mapping already exists");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn add_owners_call(account: Address, call: abi::addOwnersCall) -> Call {
    Call::new(account).with_data(call.abi_encode())
}

/// The call adding `recovery_address` as an owner without changing the
/// threshold.
#[must_use]
pub fn register_recovery_address_call(account: Address, recovery_address: Address) -> Call {
    add_owners_call(
        account,
        abi::addOwnersCall {
            ownersToAdd: vec![recovery_address],
            weightsToAdd: vec![U256::from(RECOVERY_OWNER_WEIGHT)],
            publicKeyOwnersToAdd: Vec::new(),
            publicKeyWeightsToAdd: Vec::new(),
            newThresholdWeight: U256::from(UNCHANGED_THRESHOLD),
        },
    )
}

/// The call adding `credential` as the sole required signer.
///
/// # Errors
///
/// Returns [`Error::InvalidPublicKey`] if the credential's key does not
/// parse.
pub fn execute_recovery_call(account: Address, credential: &WebAuthnCredential) -> Result<Call> {
    let (x, y) = credential.coordinates()?;
    Ok(add_owners_call(
        account,
        abi::addOwnersCall {
            ownersToAdd: Vec::new(),
            weightsToAdd: Vec::new(),
            publicKeyOwnersToAdd: vec![PublicKey {
                x: U256::from_be_bytes(x),
                y: U256::from_be_bytes(y),
            }],
            publicKeyWeightsToAdd: vec![U256::from(RECOVERY_OWNER_WEIGHT)],
            newThresholdWeight: U256::from(RECOVERED_THRESHOLD),
        },
    ))
}

/// Registers `recovery_address` off-chain and on-chain.
///
/// The address mapping is recorded before the user operation is sent.
///
/// # Errors
///
/// Returns [`Error::AccountRequired`] without an account, before any
/// request. Any other failure is reported as
/// [`Error::RecoveryAddressRegistrationFailed`].
pub async fn register_recovery_address(
    bundler: &BundlerClient,
    account: Option<&SmartAccount>,
    recovery_address: Address,
) -> Result<B256> {
    let account = bundler.resolve_account(account)?;

    let result: Result<B256> = async {
        create_address_mapping(
            bundler.client().transport(),
            account.address(),
            AddressMappingOwner::Eoa {
                address: recovery_address,
            },
        )
        .await?;

        let call = register_recovery_address_call(account.address(), recovery_address);
        bundler.send_user_operation(Some(account), &[call]).await
    }
    .await;

    match result {
        Ok(hash) => {
            info!(
                account = %account.address(),
                %recovery_address,
                %hash,
                "recovery address registered"
            );
            Ok(hash)
        }
        Err(err) => {
            warn!(
                account = %account.address(),
                error = %err,
                "recovery address registration failed"
            );
            Err(Error::RecoveryAddressRegistrationFailed(Box::new(err)))
        }
    }
}

/// Estimates gas for [`register_recovery_address`] without sending anything.
///
/// # Errors
///
/// Returns [`Error::AccountRequired`] without an account, or the RPC error.
pub async fn estimate_register_recovery_address_gas(
    bundler: &BundlerClient,
    account: Option<&SmartAccount>,
    recovery_address: Address,
) -> Result<GasEstimate> {
    let account = bundler.resolve_account(account)?;
    let call = register_recovery_address_call(account.address(), recovery_address);
    bundler
        .estimate_user_operation_gas(Some(account), &[call])
        .await
}

/// Installs `credential` as the account's signer.
///
/// `account` is the facade signed by the recovery EOA, see
/// [`recovery_account`]. The address mapping is recorded before the user
/// operation is sent.
///
/// # Errors
///
/// Returns [`Error::AccountRequired`] without an account, before any
/// request. Any other failure is reported as
/// [`Error::CredentialRegistrationFailed`].
pub async fn execute_recovery(
    bundler: &BundlerClient,
    account: Option<&SmartAccount>,
    credential: &WebAuthnCredential,
) -> Result<B256> {
    let account = bundler.resolve_account(account)?;

    let result: Result<B256> = async {
        let (x, y) = credential.coordinates()?;
        create_address_mapping(
            bundler.client().transport(),
            account.address(),
            AddressMappingOwner::WebAuthn {
                public_key_x: U256::from_be_bytes(x),
                public_key_y: U256::from_be_bytes(y),
            },
        )
        .await?;

        let call = execute_recovery_call(account.address(), credential)?;
        bundler.send_user_operation(Some(account), &[call]).await
    }
    .await;

    match result {
        Ok(hash) => {
            info!(
                account = %account.address(),
                credential = %credential.id,
                %hash,
                "recovery executed"
            );
            Ok(hash)
        }
        Err(err) => {
            warn!(account = %account.address(), error = %err, "recovery failed");
            Err(Error::CredentialRegistrationFailed(Box::new(err)))
        }
    }
}

/// Estimates gas for [`execute_recovery`] without sending anything.
///
/// # Errors
///
/// Returns [`Error::AccountRequired`] without an account, an error if the
/// credential's key does not parse, or the RPC error.
pub async fn estimate_execute_recovery_gas(
    bundler: &BundlerClient,
    account: Option<&SmartAccount>,
    credential: &WebAuthnCredential,
) -> Result<GasEstimate> {
    let account = bundler.resolve_account(account)?;
    let call = execute_recovery_call(account.address(), credential)?;
    bundler
        .estimate_user_operation_gas(Some(account), &[call])
        .await
}
