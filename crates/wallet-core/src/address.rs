//! Owner identifiers and counterfactual account addresses.
//!
//! The weighted multisig plugin identifies owners by a 32-byte sender id:
//!
//! - passkey owners: `keccak256(abi.encode(x, y))` over the P-256 public key
//! - EOA owners: the address left-padded to 32 bytes
//!
//! The account factory deploys a proxy with `CREATE2`, so the account address
//! is known before deployment:
//!
//! ```text
//! mixedSalt = keccak256(abi.encode(sender, salt))
//! initCode  = proxyCreationCode || abi.encode(implementation, initializeCalldata)
//! address   = keccak256(0xff || factory || mixedSalt || keccak256(initCode))[12..]
//! ```
//!
//! Any deviation from the factory's formula yields an address nobody
//! controls, which is why accounts created over the modular wallet transport
//! are checked against the backend.
//!
//! # Example
//!
//! ```
//! use modular_wallet_core::address::public_key_params;
//!
//! let mut key = vec![0x04];
//! key.extend_from_slice(&hex::decode(
//!     "6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296\
//!      4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5",
//! ).unwrap());
//!
//! let params = public_key_params(&key).unwrap();
//! assert_eq!(params.initial_public_key_owners.len(), 1);
//! ```

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::{SolCall, SolValue};
use tracing::debug;

use crate::abi::{self, PublicKey};
use crate::config::AccountDeployment;
use crate::crypto::parse_public_key;
use crate::error::Result;
use crate::owner::Owner;

/// The salt every account is deployed with.
pub const SALT: B256 = B256::ZERO;

/// Weight given to the initial owner.
pub const INITIAL_OWNER_WEIGHT: u64 = 1;

/// Threshold weight of a freshly deployed account.
pub const INITIAL_THRESHOLD_WEIGHT: u64 = 1;

/// Sender id and plugin owner entry of a passkey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyParams {
    /// `keccak256(abi.encode(x, y))`.
    pub sender: B256,

    /// The passkey as a plugin owner.
    pub initial_public_key_owners: Vec<PublicKey>,
}

/// Parses a P-256 public key into its sender id and owner entry.
///
/// # Errors
///
/// Returns [`Error::InvalidPublicKey`](crate::error::Error::InvalidPublicKey)
/// if the key does not parse.
pub fn public_key_params(public_key: &[u8]) -> Result<PublicKeyParams> {
    let (x, y) = parse_public_key(public_key)?;
    let x = U256::from_be_bytes(x);
    let y = U256::from_be_bytes(y);

    Ok(PublicKeyParams {
        sender: keccak256((x, y).abi_encode()),
        initial_public_key_owners: vec![PublicKey { x, y }],
    })
}

/// [`public_key_params`] for a passkey owner's credential.
///
/// # Errors
///
/// Returns an error if the credential's public key does not parse.
pub fn get_public_key_params_from_owner(
    owner: &crate::webauthn::WebAuthnAccount,
) -> Result<PublicKeyParams> {
    public_key_params(&owner.credential().public_key_bytes()?)
}

/// The owner's 32-byte sender id.
///
/// # Errors
///
/// Returns an error if a passkey owner's public key does not parse.
pub fn get_sender_for_contract(owner: &Owner) -> Result<B256> {
    match owner {
        Owner::WebAuthn(account) => Ok(get_public_key_params_from_owner(account)?.sender),
        Owner::Local(signer) => Ok(signer.address().into_word()),
    }
}

/// The salt accounts are deployed with. Constant, so an owner always maps to
/// the same address.
#[must_use]
pub const fn get_salt() -> B256 {
    SALT
}

/// `abi.encode(owners, weights, publicKeyOwners, publicKeyWeights, threshold)`
/// installing the owner as the sole signer.
///
/// # Errors
///
/// Returns an error if a passkey owner's public key does not parse.
pub fn plugin_install_data(owner: &Owner) -> Result<Bytes> {
    let weight = U256::from(INITIAL_OWNER_WEIGHT);
    let threshold = U256::from(INITIAL_THRESHOLD_WEIGHT);

    let encoded = match owner {
        Owner::WebAuthn(account) => {
            let params = get_public_key_params_from_owner(account)?;
            let weights = vec![weight; params.initial_public_key_owners.len()];
            (
                Vec::<Address>::new(),
                Vec::<U256>::new(),
                params.initial_public_key_owners,
                weights,
                threshold,
            )
                .abi_encode_params()
        }
        Owner::Local(signer) => (
            vec![signer.address()],
            vec![weight],
            Vec::<PublicKey>::new(),
            Vec::<U256>::new(),
            threshold,
        )
            .abi_encode_params(),
    };

    Ok(encoded.into())
}

/// The plugin lists passed to both the factory and the proxy initializer.
fn plugin_lists(
    owner: &Owner,
    deployment: &AccountDeployment,
) -> Result<(Vec<Address>, Vec<B256>, Vec<Bytes>)> {
    Ok((
        vec![deployment.plugin],
        vec![deployment.plugin_manifest_hash],
        vec![plugin_install_data(owner)?],
    ))
}

/// `abi.encode(plugins, manifestHashes, pluginInstallData)`, the factory's
/// `initializingData`.
///
/// # Errors
///
/// Returns an error if a passkey owner's public key does not parse.
pub fn initializing_data(owner: &Owner, deployment: &AccountDeployment) -> Result<Bytes> {
    Ok(plugin_lists(owner, deployment)?.abi_encode_params().into())
}

/// Calldata of `initializeUpgradableMSCA` run by the proxy constructor.
///
/// # Errors
///
/// Returns an error if a passkey owner's public key does not parse.
pub fn initialize_calldata(owner: &Owner, deployment: &AccountDeployment) -> Result<Bytes> {
    let (plugins, manifest_hashes, plugin_install_data) = plugin_lists(owner, deployment)?;
    Ok(abi::initializeUpgradableMSCACall {
        plugins,
        manifestHashes: manifest_hashes,
        pluginInstallData: plugin_install_data,
    }
    .abi_encode()
    .into())
}

/// Calldata of the factory's `createAccount`, used as `factoryData`.
///
/// # Errors
///
/// Returns an error if a passkey owner's public key does not parse.
pub fn create_account_calldata(owner: &Owner, deployment: &AccountDeployment) -> Result<Bytes> {
    Ok(abi::createAccountCall {
        sender: get_sender_for_contract(owner)?,
        salt: get_salt(),
        initializingData: initializing_data(owner, deployment)?,
    }
    .abi_encode()
    .into())
}

/// Computes the account address the factory deploys for `owner`.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`](crate::error::Error::InvalidConfig) if
/// the deployment has no proxy creation code, or an error if a passkey
/// owner's public key does not parse.
pub fn compute_address(owner: &Owner, deployment: &AccountDeployment) -> Result<Address> {
    deployment.validate()?;

    let sender = get_sender_for_contract(owner)?;
    let mixed_salt = keccak256((sender, get_salt()).abi_encode());

    let constructor_args =
        (deployment.implementation, initialize_calldata(owner, deployment)?).abi_encode_params();
    let mut init_code =
        Vec::with_capacity(deployment.proxy_creation_code.len() + constructor_args.len());
    init_code.extend_from_slice(&deployment.proxy_creation_code);
    init_code.extend_from_slice(&constructor_args);

    let address = deployment.factory.create2_from_code(mixed_salt, init_code);
    debug!(owner = owner.kind(), %sender, %address, "computed account address");
    Ok(address)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use alloy_signer_local::PrivateKeySigner;

    use super::*;
    use crate::testing::{SoftwareAuthenticator, deployment};
    use crate::webauthn::{WebAuthnAccount, WebAuthnCredential};

    fn passkey(seed: u8) -> (Owner, Rc<SoftwareAuthenticator>) {
        let authenticator = Rc::new(SoftwareAuthenticator::new(seed));
        let account = WebAuthnAccount::new(authenticator.credential(), authenticator.clone());
        (Owner::WebAuthn(account), authenticator)
    }

    fn eoa() -> (Owner, Address) {
        let signer = PrivateKeySigner::from_bytes(&B256::repeat_byte(0x01)).unwrap();
        let address = signer.address();
        (Owner::from(signer), address)
    }

    #[test]
    fn passkey_sender_hashes_coordinates() {
        let (owner, authenticator) = passkey(1);
        let (x, y) = authenticator.coordinates();

        let mut words = Vec::new();
        words.extend_from_slice(&x);
        words.extend_from_slice(&y);

        assert_eq!(get_sender_for_contract(&owner).unwrap(), keccak256(&words));
    }

    #[test]
    fn eoa_sender_is_left_padded_address() {
        let (owner, address) = eoa();
        let sender = get_sender_for_contract(&owner).unwrap();

        assert!(sender[..12].iter().all(|b| *b == 0));
        assert_eq!(&sender[12..], address.as_slice());
    }

    #[test]
    fn public_key_encodings_agree() {
        let authenticator = SoftwareAuthenticator::new(1);
        let (x, y) = authenticator.coordinates();

        let mut raw = x.to_vec();
        raw.extend_from_slice(&y);
        let mut uncompressed = vec![0x04];
        uncompressed.extend_from_slice(&raw);
        let compressed = authenticator.credential().public_key_bytes().unwrap();

        let expected = public_key_params(&raw).unwrap();
        assert_eq!(public_key_params(&uncompressed).unwrap(), expected);
        assert_eq!(public_key_params(&compressed).unwrap(), expected);
        assert_eq!(public_key_params(&authenticator.spki_der()).unwrap(), expected);
        assert_eq!(expected.initial_public_key_owners[0].x, U256::from_be_bytes(x));
    }

    #[test]
    fn compute_address_is_deterministic() {
        let (owner, _) = passkey(1);
        let deployment = deployment();

        let first = compute_address(&owner, &deployment).unwrap();
        assert_eq!(first, compute_address(&owner, &deployment).unwrap());

        let (other, _) = passkey(2);
        assert_ne!(first, compute_address(&other, &deployment).unwrap());

        let (eoa, _) = eoa();
        assert_ne!(first, compute_address(&eoa, &deployment).unwrap());
    }

    #[test]
    fn compute_address_follows_create2() {
        let (owner, _) = eoa();
        let deployment = deployment();

        let sender = get_sender_for_contract(&owner).unwrap();
        let mut salt_preimage = sender.to_vec();
        salt_preimage.extend_from_slice(&[0u8; 32]);
        let mixed_salt = keccak256(&salt_preimage);

        let mut init_code = deployment.proxy_creation_code.to_vec();
        init_code.extend_from_slice(deployment.implementation.into_word().as_slice());
        init_code.extend_from_slice(&U256::from(64).to_be_bytes::<32>());
        let calldata = initialize_calldata(&owner, &deployment).unwrap();
        init_code.extend_from_slice(&U256::from(calldata.len()).to_be_bytes::<32>());
        init_code.extend_from_slice(&calldata);
        let padding = calldata.len().next_multiple_of(32) - calldata.len();
        init_code.extend(std::iter::repeat_n(0u8, padding));

        let mut preimage = vec![0xff];
        preimage.extend_from_slice(deployment.factory.as_slice());
        preimage.extend_from_slice(mixed_salt.as_slice());
        preimage.extend_from_slice(keccak256(&init_code).as_slice());

        let computed = compute_address(&owner, &deployment).unwrap();
        assert_eq!(computed, Address::from_slice(&keccak256(&preimage)[12..]));
    }

    #[test]
    fn compute_address_requires_proxy_code() {
        let (owner, _) = eoa();
        let mut deployment = deployment();
        deployment.proxy_creation_code = Bytes::new();

        assert!(compute_address(&owner, &deployment).is_err());
    }

    #[test]
    fn install_data_layout() {
        let (owner, address) = eoa();
        let data = plugin_install_data(&owner).unwrap();

        // Five head words, then owners = [address].
        assert_eq!(U256::from_be_slice(&data[128..160]), U256::from(1));
        assert_eq!(U256::from_be_slice(&data[160..192]), U256::from(1));
        assert_eq!(&data[204..224], address.as_slice());
    }

    #[test]
    fn create_account_selector() {
        let (owner, _) = passkey(3);
        let calldata = create_account_calldata(&owner, &deployment()).unwrap();

        assert_eq!(&calldata[..4], &abi::createAccountCall::SELECTOR);
        assert_eq!(&calldata[4..36], get_sender_for_contract(&owner).unwrap().as_slice());
        assert_eq!(&calldata[36..68], SALT.as_slice());
    }

    #[test]
    fn credential_without_valid_key_fails() {
        let authenticator = Rc::new(SoftwareAuthenticator::new(1));
        let credential = WebAuthnCredential {
            id: "id".to_string(),
            public_key: "0x1234".to_string(),
            rp_id: None,
            raw: None,
        };
        let owner = Owner::WebAuthn(WebAuthnAccount::new(credential, authenticator));

        assert!(get_sender_for_contract(&owner).is_err());
    }
}
