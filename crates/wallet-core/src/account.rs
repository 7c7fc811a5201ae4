//! The smart account facade.
//!
//! A [`SmartAccount`] ties an [`Owner`] to an account address on one chain
//! and exposes what a bundler client needs from it: call encoding, factory
//! arguments, a stub signature, user operation signing and the verification
//! gas floor. Message and typed data signatures go through the replay-safe
//! hash of the weighted multisig plugin.
//!
//! Over the modular wallet transport the locally derived address is checked
//! against the backend's record on construction; a mismatch means the
//! deployment constants are wrong and nothing is signed.

use std::cell::OnceCell;

use alloy_primitives::{Address, B256, Bytes, U256, eip191_hash_message};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::abi;
use crate::address::{
    INITIAL_OWNER_WEIGHT, INITIAL_THRESHOLD_WEIGHT, compute_address, create_account_calldata,
    get_public_key_params_from_owner, get_sender_for_contract,
};
use crate::client::Client;
use crate::config::AccountDeployment;
use crate::eip712::{self, TypedData};
use crate::error::{Error, Result};
use crate::gas::apply_verification_gas_floor;
use crate::owner::Owner;
use crate::replay_safe::{ReplaySafeHashParams, to_replay_safe_hash};
use crate::rpc::modular_wallet::{
    self, GetAddressParams, ScaConfiguration, WalletMetadata, WeightedMultisig, WeightedOwner,
    WeightedWebAuthnOwner,
};
use crate::rpc::TransportKind;
use crate::signature::{sign_and_wrap, stub_signature};
use crate::user_operation::UserOperation;

/// A call executed by the account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    /// Target contract or EOA.
    pub to: Address,

    /// Wei sent with the call.
    #[serde(default)]
    pub value: U256,

    /// Calldata.
    #[serde(default)]
    pub data: Bytes,
}

impl Call {
    /// A call to `to` with no value and empty calldata.
    #[must_use]
    pub fn new(to: Address) -> Self {
        Self {
            to,
            ..Self::default()
        }
    }

    /// Sets the value.
    #[must_use]
    pub const fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets the calldata.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }
}

impl From<&Call> for abi::Call {
    fn from(call: &Call) -> Self {
        Self {
            target: call.to,
            value: call.value,
            data: call.data.clone(),
        }
    }
}

/// Encodes calls as account calldata: `execute` for exactly one call,
/// `executeBatch` otherwise, including for none.
#[must_use]
pub fn encode_calls(calls: &[Call]) -> Bytes {
    match calls {
        [call] => abi::executeCall {
            target: call.to,
            value: call.value,
            data: call.data.clone(),
        }
        .abi_encode()
        .into(),
        calls => abi::executeBatchCall {
            calls: calls.iter().map(abi::Call::from).collect(),
        }
        .abi_encode()
        .into(),
    }
}

/// The ownership configuration the backend derives the address from.
///
/// # Errors
///
/// Returns an error if a passkey owner's public key does not parse.
pub fn get_address_params(owner: &Owner, name: Option<&str>) -> Result<GetAddressParams> {
    let weighted_multisig = match owner {
        Owner::WebAuthn(account) => {
            let params = get_public_key_params_from_owner(account)?;
            WeightedMultisig {
                owners: Vec::new(),
                webauthn_owners: params
                    .initial_public_key_owners
                    .into_iter()
                    .map(|key| WeightedWebAuthnOwner {
                        public_key_x: key.x,
                        public_key_y: key.y,
                        weight: INITIAL_OWNER_WEIGHT,
                    })
                    .collect(),
                threshold_weight: INITIAL_THRESHOLD_WEIGHT,
            }
        }
        Owner::Local(signer) => WeightedMultisig {
            owners: vec![WeightedOwner {
                address: signer.address(),
                weight: INITIAL_OWNER_WEIGHT,
            }],
            webauthn_owners: Vec::new(),
            threshold_weight: INITIAL_THRESHOLD_WEIGHT,
        },
    };

    Ok(GetAddressParams {
        sca_configuration: ScaConfiguration::weighted_multisig(weighted_multisig),
        metadata: name.map(|name| WalletMetadata {
            name: Some(name.to_string()),
        }),
    })
}

/// Optional inputs of [`SmartAccount::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmartAccountOptions {
    /// An existing account address. Derived from the owner when absent.
    pub address: Option<Address>,

    /// Wallet name stored by the backend.
    pub name: Option<String>,
}

/// Arguments deploying the account with its first user operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryArgs {
    /// The account factory.
    pub factory: Address,

    /// `createAccount` calldata.
    pub factory_data: Bytes,
}

/// A weighted multisig smart account with a single owner.
#[derive(Debug, Clone)]
pub struct SmartAccount {
    client: Client,
    owner: Owner,
    deployment: AccountDeployment,
    address: Address,
    sender: B256,
    deployed: OnceCell<bool>,
}

impl SmartAccount {
    /// Creates the account facade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an incomplete deployment,
    /// [`Error::AddressMismatch`] if the modular wallet backend reports a
    /// different address, or the `circle_getAddress` error.
    pub async fn new(
        client: Client,
        owner: Owner,
        deployment: AccountDeployment,
        options: SmartAccountOptions,
    ) -> Result<Self> {
        let account = Self::unchecked(client, owner, deployment, options.address)?;

        if account.client.kind() == TransportKind::ModularWallet {
            let params = get_address_params(&account.owner, options.name.as_deref())?;
            let wallet = modular_wallet::get_address(account.client.transport(), &params).await?;
            if wallet.address != account.address {
                return Err(Error::AddressMismatch {
                    local: account.address,
                    server: wallet.address,
                });
            }
            debug!(address = %account.address, "address confirmed by backend");
        }

        info!(address = %account.address, owner = account.owner.kind(), "smart account ready");
        Ok(account)
    }

    /// Creates a facade for an existing account controlled by a recovery
    /// owner. The backend knows the account under its original owner, so the
    /// address is not checked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an incomplete deployment.
    pub fn with_recovery_owner(
        client: Client,
        owner: Owner,
        deployment: AccountDeployment,
        address: Address,
    ) -> Result<Self> {
        let account = Self::unchecked(client, owner, deployment, Some(address))?;
        debug!(%address, "recovery account ready");
        Ok(account)
    }

    fn unchecked(
        client: Client,
        owner: Owner,
        deployment: AccountDeployment,
        address: Option<Address>,
    ) -> Result<Self> {
        deployment.validate()?;
        let address = match address {
            Some(address) => address,
            None => compute_address(&owner, &deployment)?,
        };
        let sender = get_sender_for_contract(&owner)?;

        Ok(Self {
            client,
            owner,
            deployment,
            address,
            sender,
            deployed: OnceCell::new(),
        })
    }

    /// The account address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The owner.
    #[must_use]
    pub const fn owner(&self) -> &Owner {
        &self.owner
    }

    /// The owner's sender id.
    #[must_use]
    pub const fn sender(&self) -> B256 {
        self.sender
    }

    /// The chain client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// The contracts the account runs on.
    #[must_use]
    pub const fn deployment(&self) -> &AccountDeployment {
        &self.deployment
    }

    /// Encodes calls as account calldata; see [`encode_calls`].
    #[must_use]
    pub fn encode_calls(&self, calls: &[Call]) -> Bytes {
        encode_calls(calls)
    }

    /// The entry point nonce of the account.
    ///
    /// # Errors
    ///
    /// Returns the RPC error.
    pub async fn get_nonce(&self) -> Result<U256> {
        self.client.get_nonce(self.address).await
    }

    /// Whether the account has code. Checked once per facade.
    ///
    /// # Errors
    ///
    /// Returns the `eth_getCode` error.
    pub async fn is_deployed(&self) -> Result<bool> {
        if let Some(deployed) = self.deployed.get() {
            return Ok(*deployed);
        }

        let deployed = !self.client.get_code(self.address).await?.is_empty();
        debug!(address = %self.address, deployed, "checked deployment status");
        Ok(*self.deployed.get_or_init(|| deployed))
    }

    /// Factory arguments, or `None` once the account is deployed.
    ///
    /// # Errors
    ///
    /// Returns the `eth_getCode` error.
    pub async fn factory_args(&self) -> Result<Option<FactoryArgs>> {
        if self.is_deployed().await? {
            return Ok(None);
        }

        Ok(Some(FactoryArgs {
            factory: self.deployment.factory,
            factory_data: create_account_calldata(&self.owner, &self.deployment)?,
        }))
    }

    /// A placeholder signature for gas estimation.
    ///
    /// # Errors
    ///
    /// Returns an error if a passkey owner's public key does not parse.
    pub fn stub_signature(&self) -> Result<Bytes> {
        stub_signature(&self.owner)
    }

    /// Signs a hash through the plugin's replay-safe hash.
    ///
    /// # Errors
    ///
    /// Returns the owner's signing error.
    pub async fn sign(&self, hash: B256) -> Result<Bytes> {
        let replay_safe_hash = to_replay_safe_hash(
            &self.deployment.replay_safe,
            &ReplaySafeHashParams {
                account: self.address,
                chain_id: self.client.chain_id(),
                plugin: self.deployment.plugin,
                hash,
            },
        );
        sign_and_wrap(replay_safe_hash, &self.owner, self.sender, false).await
    }

    /// Signs an EIP-191 personal message.
    ///
    /// # Errors
    ///
    /// Returns the owner's signing error.
    pub async fn sign_message(&self, message: &[u8]) -> Result<Bytes> {
        self.sign(eip191_hash_message(message)).await
    }

    /// Signs EIP-712 typed data.
    ///
    /// # Errors
    ///
    /// Returns an error if the typed data does not encode, or the owner's
    /// signing error.
    pub async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<Bytes> {
        self.sign(eip712::signing_hash(typed_data)?).await
    }

    /// Signs a user operation sent from this account.
    ///
    /// The operation hash is signed directly, without the replay-safe hash;
    /// the entry point already binds it to the chain and the account.
    ///
    /// # Errors
    ///
    /// Returns the owner's signing error.
    pub async fn sign_user_operation(&self, user_operation: &UserOperation) -> Result<Bytes> {
        let user_operation = UserOperation {
            sender: self.address,
            ..user_operation.clone()
        };
        let hash = user_operation.hash(self.client.entry_point(), self.client.chain_id());
        debug!(address = %self.address, %hash, "signing user operation");
        sign_and_wrap(hash, &self.owner, self.sender, true).await
    }

    /// Raises a verification gas limit to the floor of this account's chain
    /// and deployment status.
    ///
    /// # Errors
    ///
    /// Returns the `eth_getCode` error.
    pub async fn estimate_verification_gas_limit(&self, requested: U256) -> Result<U256> {
        let deployed = self.is_deployed().await?;
        let limit = apply_verification_gas_floor(requested, deployed, self.client.chain_id());
        if limit != requested {
            debug!(%requested, %limit, deployed, "raised verification gas limit");
        }
        Ok(limit)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use alloy_primitives::{address, hex};
    use alloy_signer_local::PrivateKeySigner;
    use serde_json::json;

    use super::*;
    use crate::config::ENTRY_POINT_V07;
    use crate::gas::SEPOLIA_CHAIN_ID;
    use crate::testing::{MockTransport, SoftwareAuthenticator, deployment};
    use crate::webauthn::WebAuthnAccount;

    fn client(transport: &Rc<MockTransport>) -> Client {
        Client::new(transport.clone(), SEPOLIA_CHAIN_ID, ENTRY_POINT_V07)
    }

    fn passkey() -> Owner {
        let authenticator = Rc::new(SoftwareAuthenticator::new(3));
        Owner::from(WebAuthnAccount::new(authenticator.credential(), authenticator))
    }

    fn eoa() -> Owner {
        Owner::from(PrivateKeySigner::from_bytes(&B256::repeat_byte(0x01)).unwrap())
    }

    async fn account(transport: &Rc<MockTransport>, owner: Owner) -> SmartAccount {
        SmartAccount::new(client(transport), owner, deployment(), SmartAccountOptions::default())
            .await
            .unwrap()
    }

    #[test]
    fn single_call_uses_execute() {
        let target = address!("ca56000000000000000000000000000000009aa0");
        let encoded = encode_calls(&[Call::new(target)]);

        assert_eq!(&encoded[..4], &hex!("b61d27f6"));
        let decoded = abi::executeCall::abi_decode(&encoded).unwrap();
        assert_eq!(decoded.target, target);
        assert_eq!(decoded.value, U256::ZERO);
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn batch_and_empty_use_execute_batch() {
        let calls = [
            Call::new(Address::repeat_byte(0x01)).with_value(U256::from(7)),
            Call::new(Address::repeat_byte(0x02)).with_data(vec![0xab, 0xcd]),
        ];
        let encoded = encode_calls(&calls);
        assert_eq!(&encoded[..4], &hex!("34fcd5be"));
        let decoded = abi::executeBatchCall::abi_decode(&encoded).unwrap();
        assert_eq!(decoded.calls.len(), 2);
        assert_eq!(decoded.calls[0].value, U256::from(7));
        assert_eq!(decoded.calls[1].data, Bytes::from_static(&[0xab, 0xcd]));

        let empty = encode_calls(&[]);
        assert_eq!(&empty[..4], &hex!("34fcd5be"));
        assert!(abi::executeBatchCall::abi_decode(&empty).unwrap().calls.is_empty());
    }

    #[test]
    fn address_params_describe_owner() {
        let params = get_address_params(&passkey(), Some("wallet")).unwrap();
        let value = serde_json::to_value(&params).unwrap();
        let ownership = &value["scaConfiguration"]["initialOwnershipConfiguration"];
        let multisig = &ownership["weightedMultisig"];
        assert_eq!(multisig["webauthnOwners"].as_array().unwrap().len(), 1);
        assert_eq!(multisig["thresholdWeight"], 1);
        assert!(multisig.get("owners").is_none());
        assert_eq!(value["metadata"]["name"], "wallet");

        let params = get_address_params(&eoa(), None).unwrap();
        let multisig = &params.sca_configuration.initial_ownership_configuration.weighted_multisig;
        assert_eq!(multisig.owners.len(), 1);
        assert!(params.metadata.is_none());
    }

    #[tokio::test]
    async fn backend_confirms_address() {
        let transport = Rc::new(MockTransport::modular_wallet());
        let expected = compute_address(&passkey(), &deployment()).unwrap();
        transport.respond("circle_getAddress", json!({ "address": expected }));

        let account = account(&transport, passkey()).await;
        assert_eq!(account.address(), expected);
        assert_eq!(transport.methods(), vec!["circle_getAddress"]);
    }

    #[tokio::test]
    async fn backend_mismatch_fails() {
        let transport = Rc::new(MockTransport::modular_wallet());
        let server = address!("00000000000000000000000000000000000000ff");
        transport.respond("circle_getAddress", json!({ "address": server }));

        let result = SmartAccount::new(
            client(&transport),
            passkey(),
            deployment(),
            SmartAccountOptions::default(),
        )
        .await;
        match result {
            Err(Error::AddressMismatch { server: reported, .. }) => assert_eq!(reported, server),
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generic_transport_skips_validation() {
        let transport = Rc::new(MockTransport::default());
        let supplied = address!("00000000000000000000000000000000000000aa");
        let account = SmartAccount::new(
            client(&transport),
            eoa(),
            deployment(),
            SmartAccountOptions {
                address: Some(supplied),
                name: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(account.address(), supplied);
        assert!(transport.methods().is_empty());
    }

    #[tokio::test]
    async fn deployment_status_is_checked_once() {
        let transport = Rc::new(MockTransport::default());
        transport.respond("eth_getCode", json!("0x6080"));
        let account = account(&transport, eoa()).await;

        assert!(account.factory_args().await.unwrap().is_none());
        let limit = account
            .estimate_verification_gas_limit(U256::from(1))
            .await
            .unwrap();
        assert_eq!(limit, U256::from(700_000));
        assert_eq!(transport.requests_for("eth_getCode").len(), 1);
    }

    #[tokio::test]
    async fn undeployed_account_has_factory_args() {
        let transport = Rc::new(MockTransport::default());
        transport.respond("eth_getCode", json!("0x"));
        let account = account(&transport, eoa()).await;

        let args = account.factory_args().await.unwrap().unwrap();
        assert_eq!(args.factory, deployment().factory);
        assert_eq!(
            args.factory_data,
            create_account_calldata(account.owner(), &deployment()).unwrap()
        );
        assert_eq!(
            account
                .estimate_verification_gas_limit(U256::from(3_000_000))
                .await
                .unwrap(),
            U256::from(3_000_000)
        );
    }

    #[tokio::test]
    async fn eoa_sign_recovers_over_replay_safe_hash() {
        let transport = Rc::new(MockTransport::default());
        let account = account(&transport, eoa()).await;
        let hash = B256::repeat_byte(0x09);

        let signature = account.sign(hash).await.unwrap();
        let replay_safe_hash = to_replay_safe_hash(
            &deployment().replay_safe,
            &ReplaySafeHashParams {
                account: account.address(),
                chain_id: SEPOLIA_CHAIN_ID,
                plugin: deployment().plugin,
                hash,
            },
        );
        let recovered = alloy_primitives::Signature::try_from(signature.as_ref())
            .unwrap()
            .recover_address_from_prehash(&replay_safe_hash)
            .unwrap();
        assert_eq!(recovered.into_word(), account.sender());
    }

    #[tokio::test]
    async fn passkey_message_and_typed_data_signatures_are_wrapped() {
        let transport = Rc::new(MockTransport::default());
        let account = account(&transport, passkey()).await;

        let signature = account.sign_message(b"hello").await.unwrap();
        assert_eq!(&signature[..32], account.sender().as_slice());
        assert_eq!(signature[64], 2);

        let typed_data = eip712::from_json(
            r#"{
                "types": {
                    "EIP712Domain": [{"name": "name", "type": "string"}],
                    "Ping": [{"name": "id", "type": "uint256"}]
                },
                "primaryType": "Ping",
                "domain": {"name": "app"},
                "message": {"id": 1}
            }"#,
        )
        .unwrap();
        let signature = account.sign_typed_data(&typed_data).await.unwrap();
        assert_eq!(signature[64], 2);
    }

    #[tokio::test]
    async fn user_operation_signature_uses_account_as_sender() {
        let transport = Rc::new(MockTransport::default());
        let account = account(&transport, eoa()).await;

        let user_operation = UserOperation {
            sender: Address::ZERO,
            nonce: U256::from(1),
            ..UserOperation::default()
        };
        let signature = account.sign_user_operation(&user_operation).await.unwrap();

        let expected_hash = UserOperation {
            sender: account.address(),
            ..user_operation
        }
        .hash(ENTRY_POINT_V07, SEPOLIA_CHAIN_ID);
        let mut unshifted = signature.to_vec();
        unshifted[64] -= 32;
        let recovered = alloy_primitives::Signature::try_from(unshifted.as_slice())
            .unwrap()
            .recover_address_from_prehash(&eip191_hash_message(expected_hash))
            .unwrap();
        assert_eq!(recovered.into_word(), account.sender());
    }
}
