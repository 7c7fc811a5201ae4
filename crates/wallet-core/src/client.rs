//! Chain and bundler clients.
//!
//! [`Client`] is the read side: chain id, code, nonces and fee suggestions.
//! [`BundlerClient`] builds, signs and submits user operations for a
//! [`SmartAccount`], optionally sponsored by a paymaster.
//!
//! # Sending a user operation
//!
//! ```text
//! nonce, factory args, fees, stub signature
//!   -> pm_getPaymasterStubData        (with a paymaster)
//!   -> eth_estimateUserOperationGas   (verification gas raised to the floor)
//!   -> pm_getPaymasterData            (unless the stub data is final)
//!   -> sign
//!   -> eth_sendUserOperation
//! ```

use std::rc::Rc;

use alloy_primitives::aliases::U192;
use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::SolCall;
use serde_json::Value;
use tracing::{debug, info};

use crate::abi;
use crate::account::{Call, SmartAccount};
use crate::error::{Error, Result};
use crate::rpc::bundler::{self, GasEstimate, UserOperationReceipt};
use crate::rpc::{Transport, TransportKind, eth, modular_wallet, paymaster};
use crate::user_operation::UserOperation;

/// EIP-1559 fee suggestion for a user operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fees {
    /// Max fee per gas.
    pub max_fee_per_gas: U256,

    /// Max priority fee per gas.
    pub max_priority_fee_per_gas: U256,
}

/// A chain client: a transport bound to a chain and an entry point.
#[derive(Debug, Clone)]
pub struct Client {
    transport: Rc<dyn Transport>,
    chain_id: u64,
    entry_point: Address,
}

impl Client {
    /// Creates a client for a known chain.
    #[must_use]
    pub fn new(transport: Rc<dyn Transport>, chain_id: u64, entry_point: Address) -> Self {
        Self {
            transport,
            chain_id,
            entry_point,
        }
    }

    /// Creates a client, asking the node for its chain id.
    ///
    /// # Errors
    ///
    /// Returns the `eth_chainId` error.
    pub async fn connect(transport: Rc<dyn Transport>, entry_point: Address) -> Result<Self> {
        let chain_id = eth::chain_id(&*transport).await?;
        debug!(chain_id, "connected");
        Ok(Self::new(transport, chain_id, entry_point))
    }

    /// The transport.
    #[must_use]
    pub fn transport(&self) -> &dyn Transport {
        &*self.transport
    }

    /// The API the transport talks to.
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// The chain id.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// The entry point.
    #[must_use]
    pub const fn entry_point(&self) -> Address {
        self.entry_point
    }

    /// The code at `address`; empty if none is deployed.
    ///
    /// # Errors
    ///
    /// Returns the `eth_getCode` error.
    pub async fn get_code(&self, address: Address) -> Result<Bytes> {
        eth::get_code(self.transport(), address).await
    }

    /// The entry point nonce of `sender` under key `0`.
    ///
    /// # Errors
    ///
    /// Returns the `eth_call` error, or [`Error::MalformedResponse`] if the
    /// return data is not a `uint256`.
    pub async fn get_nonce(&self, sender: Address) -> Result<U256> {
        let data = abi::getNonceCall {
            sender,
            key: U192::ZERO,
        }
        .abi_encode();

        let output = eth::eth_call(self.transport(), self.entry_point, &data.into()).await?;
        if output.len() < 32 {
            return Err(Error::MalformedResponse(format!(
                "getNonce returned {} bytes",
                output.len()
            )));
        }
        Ok(U256::from_be_slice(&output[..32]))
    }

    /// Fee suggestion: the medium tier of the modular wallet backend, or the
    /// node's gas price plus priority fee elsewhere.
    ///
    /// # Errors
    ///
    /// Returns the RPC error.
    pub async fn get_fees(&self) -> Result<Fees> {
        if self.kind() == TransportKind::ModularWallet {
            let prices = modular_wallet::get_user_operation_gas_price(self.transport()).await?;
            return Ok(Fees {
                max_fee_per_gas: prices.medium.max_fee_per_gas,
                max_priority_fee_per_gas: prices.medium.max_priority_fee_per_gas,
            });
        }

        let gas_price = eth::gas_price(self.transport()).await?;
        let priority_fee = eth::max_priority_fee_per_gas(self.transport()).await?;
        Ok(Fees {
            max_fee_per_gas: gas_price.saturating_add(priority_fee),
            max_priority_fee_per_gas: priority_fee,
        })
    }
}

/// A paymaster endpoint sponsoring user operations.
#[derive(Debug, Clone)]
pub struct Paymaster {
    transport: Rc<dyn Transport>,
    context: Option<Value>,
}

impl Paymaster {
    /// Creates a paymaster without context.
    #[must_use]
    pub fn new(transport: Rc<dyn Transport>) -> Self {
        Self {
            transport,
            context: None,
        }
    }

    /// Sets the paymaster-specific context, e.g. a sponsorship policy.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// Builds and submits user operations.
#[derive(Debug, Clone)]
pub struct BundlerClient {
    client: Client,
    account: Option<SmartAccount>,
    paymaster: Option<Paymaster>,
}

impl BundlerClient {
    /// Creates a bundler client with no default account.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self {
            client,
            account: None,
            paymaster: None,
        }
    }

    /// Sets the account used when none is passed explicitly.
    #[must_use]
    pub fn with_account(mut self, account: SmartAccount) -> Self {
        self.account = Some(account);
        self
    }

    /// Sponsors every user operation through `paymaster`.
    #[must_use]
    pub fn with_paymaster(mut self, paymaster: Paymaster) -> Self {
        self.paymaster = Some(paymaster);
        self
    }

    /// The chain client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// The default account.
    #[must_use]
    pub const fn account(&self) -> Option<&SmartAccount> {
        self.account.as_ref()
    }

    /// Picks the explicit account, falling back to the default one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountRequired`] if there is neither.
    pub fn resolve_account<'a>(
        &'a self,
        account: Option<&'a SmartAccount>,
    ) -> Result<&'a SmartAccount> {
        account.or(self.account.as_ref()).ok_or(Error::AccountRequired)
    }

    /// Estimates gas for executing `calls`, with the verification gas limit
    /// raised to the account's floor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountRequired`] without an account, or the RPC
    /// error.
    pub async fn estimate_user_operation_gas(
        &self,
        account: Option<&SmartAccount>,
        calls: &[Call],
    ) -> Result<GasEstimate> {
        let account = self.resolve_account(account)?;
        let (user_operation, _) = self.draft(account, calls).await?;
        self.estimate(account, &user_operation).await
    }

    /// Builds a complete, unsigned user operation executing `calls`.
    ///
    /// The returned operation carries the stub signature.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountRequired`] without an account, or the RPC
    /// error.
    pub async fn prepare_user_operation(
        &self,
        account: Option<&SmartAccount>,
        calls: &[Call],
    ) -> Result<UserOperation> {
        let account = self.resolve_account(account)?;
        let (mut user_operation, paymaster_pending) = self.draft(account, calls).await?;

        let estimate = self.estimate(account, &user_operation).await?;
        estimate.apply(&mut user_operation);

        if let Some(paymaster) = &self.paymaster
            && paymaster_pending
        {
            let data = paymaster::get_paymaster_data(
                &*paymaster.transport,
                &user_operation,
                self.client.entry_point,
                self.client.chain_id,
                paymaster.context.as_ref(),
            )
            .await?;
            data.apply(&mut user_operation);
        }

        Ok(user_operation)
    }

    /// Prepares, signs and submits a user operation executing `calls`.
    ///
    /// # Returns
    ///
    /// The user operation hash.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountRequired`] without an account, the signing
    /// error, or the RPC error.
    pub async fn send_user_operation(
        &self,
        account: Option<&SmartAccount>,
        calls: &[Call],
    ) -> Result<B256> {
        let account = self.resolve_account(account)?;
        let mut user_operation = self.prepare_user_operation(Some(account), calls).await?;
        user_operation.signature = account.sign_user_operation(&user_operation).await?;

        let hash = bundler::send_user_operation(
            self.client.transport(),
            &user_operation,
            self.client.entry_point,
        )
        .await?;
        info!(account = %account.address(), %hash, "user operation sent");
        Ok(hash)
    }

    /// The receipt of a user operation; `None` while pending.
    ///
    /// # Errors
    ///
    /// Returns the RPC error.
    pub async fn get_user_operation_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<UserOperationReceipt>> {
        bundler::get_user_operation_receipt(self.client.transport(), hash).await
    }

    /// A user operation with everything but gas limits filled in. The flag
    /// is set when the paymaster still has to provide final data.
    async fn draft(&self, account: &SmartAccount, calls: &[Call]) -> Result<(UserOperation, bool)> {
        let nonce = self.client.get_nonce(account.address()).await?;
        let factory = account.factory_args().await?;
        let fees = self.client.get_fees().await?;

        let mut user_operation = UserOperation {
            sender: account.address(),
            nonce,
            factory: factory.as_ref().map(|args| args.factory),
            factory_data: factory.map(|args| args.factory_data),
            call_data: account.encode_calls(calls),
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            signature: account.stub_signature()?,
            ..UserOperation::default()
        };

        let mut paymaster_pending = false;
        if let Some(paymaster) = &self.paymaster {
            let stub = paymaster::get_paymaster_stub_data(
                &*paymaster.transport,
                &user_operation,
                self.client.entry_point,
                self.client.chain_id,
                paymaster.context.as_ref(),
            )
            .await?;
            stub.apply(&mut user_operation);
            paymaster_pending = !stub.is_final;
        }

        Ok((user_operation, paymaster_pending))
    }

    async fn estimate(
        &self,
        account: &SmartAccount,
        user_operation: &UserOperation,
    ) -> Result<GasEstimate> {
        let mut estimate = bundler::estimate_user_operation_gas(
            self.client.transport(),
            user_operation,
            self.client.entry_point,
        )
        .await?;
        estimate.verification_gas_limit = account
            .estimate_verification_gas_limit(estimate.verification_gas_limit)
            .await?;
        Ok(estimate)
    }
}
