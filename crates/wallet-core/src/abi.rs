//! Solidity interfaces of the account, factory, plugin and entry point.
//!
//! Only the functions and structs the SDK encodes are declared here; encoding
//! itself is done by [`alloy_sol_types`].

#![allow(missing_docs)]

use alloy_sol_types::sol;

sol! {
    /// A single call executed by the account.
    #[derive(Debug, PartialEq, Eq)]
    struct Call {
        address target;
        uint256 value;
        bytes data;
    }

    /// A P-256 public key owner of the weighted multisig plugin.
    #[derive(Debug, PartialEq, Eq)]
    struct PublicKey {
        uint256 x;
        uint256 y;
    }

    /// The dynamic part of a WebAuthn signature, as read by the plugin's
    /// WebAuthn verifier.
    #[derive(Debug, PartialEq, Eq)]
    struct WebAuthnData {
        bytes authenticatorData;
        string clientDataJSON;
        uint256 challengeIndex;
        uint256 typeIndex;
        bool requireUserVerification;
    }

    function execute(address target, uint256 value, bytes data);

    function executeBatch(Call[] calls);

    function addOwners(
        address[] ownersToAdd,
        uint256[] weightsToAdd,
        PublicKey[] publicKeyOwnersToAdd,
        uint256[] publicKeyWeightsToAdd,
        uint256 newThresholdWeight
    );

    function createAccount(bytes32 sender, bytes32 salt, bytes initializingData);

    function initializeUpgradableMSCA(
        address[] plugins,
        bytes32[] manifestHashes,
        bytes[] pluginInstallData
    );

    function getNonce(address sender, uint192 key) returns (uint256 nonce);
}
