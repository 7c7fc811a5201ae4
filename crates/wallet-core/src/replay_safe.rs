//! Replay-safe hashing for the weighted multisig plugin.
//!
//! A signature over a raw hash would be valid for every account the owner
//! controls, on every chain. The plugin therefore validates signatures over
//! a digest binding the hash to one (plugin, chain, account) triple:
//!
//! ```text
//! domainSeparator = keccak256(DOMAIN_SEPARATOR_TYPE) || keccak256(name || version)
//!                   || chainId || pad_left(plugin) || pad_right(account)
//! structHash      = keccak256(MODULE_TYPE) || hash
//! replaySafeHash  = keccak256(0x1901 || keccak256(domainSeparator) || keccak256(structHash))
//! ```
//!
//! Every piece is packed, not ABI tuple encoded, and the account address is
//! right-padded where the plugin address is left-padded. The layout must
//! match the deployed plugin byte for byte.

use alloy_primitives::{Address, B256, U256, keccak256};

use crate::config::ReplaySafeDomain;

/// Inputs of a replay-safe hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySafeHashParams {
    /// The account the signature is for.
    pub account: Address,

    /// The chain the signature is for.
    pub chain_id: u64,

    /// The weighted multisig plugin.
    pub plugin: Address,

    /// The raw hash.
    pub hash: B256,
}

/// Computes the replay-safe hash of `params.hash`.
#[must_use]
pub fn to_replay_safe_hash(domain: &ReplaySafeDomain, params: &ReplaySafeHashParams) -> B256 {
    let domain_separator_type_hash = keccak256(domain.domain_separator_type.as_bytes());
    let module_id_hash = keccak256([domain.name.as_bytes(), domain.version.as_bytes()].concat());
    let module_type_hash = keccak256(domain.module_type.as_bytes());

    let mut domain_separator = [0u8; 160];
    domain_separator[..32].copy_from_slice(domain_separator_type_hash.as_slice());
    domain_separator[32..64].copy_from_slice(module_id_hash.as_slice());
    domain_separator[64..96].copy_from_slice(&U256::from(params.chain_id).to_be_bytes::<32>());
    domain_separator[108..128].copy_from_slice(params.plugin.as_slice());
    domain_separator[128..148].copy_from_slice(params.account.as_slice());

    let mut struct_hash = [0u8; 64];
    struct_hash[..32].copy_from_slice(module_type_hash.as_slice());
    struct_hash[32..].copy_from_slice(params.hash.as_slice());

    let mut digest = [0u8; 66];
    digest[..2].copy_from_slice(&[0x19, 0x01]);
    digest[2..34].copy_from_slice(keccak256(domain_separator).as_slice());
    digest[34..].copy_from_slice(keccak256(struct_hash).as_slice());
    keccak256(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ReplaySafeHashParams {
        ReplaySafeHashParams {
            account: Address::repeat_byte(0xaa),
            chain_id: 11_155_111,
            plugin: Address::repeat_byte(0xbb),
            hash: B256::repeat_byte(0x01),
        }
    }

    /// Rebuilds the digest from its definition, one concatenation at a time.
    fn reference(domain: &ReplaySafeDomain, p: &ReplaySafeHashParams) -> B256 {
        let mut separator = Vec::new();
        separator.extend_from_slice(keccak256(&domain.domain_separator_type).as_slice());
        separator.extend_from_slice(
            keccak256(format!("{}{}", domain.name, domain.version)).as_slice(),
        );
        separator.extend_from_slice(&U256::from(p.chain_id).to_be_bytes::<32>());
        separator.extend_from_slice(&[0u8; 12]);
        separator.extend_from_slice(p.plugin.as_slice());
        separator.extend_from_slice(p.account.as_slice());
        separator.extend_from_slice(&[0u8; 12]);

        let mut struct_hash = keccak256(&domain.module_type).to_vec();
        struct_hash.extend_from_slice(p.hash.as_slice());

        let mut digest = vec![0x19, 0x01];
        digest.extend_from_slice(keccak256(&separator).as_slice());
        digest.extend_from_slice(keccak256(&struct_hash).as_slice());
        keccak256(&digest)
    }

    #[test]
    fn matches_packed_layout() {
        let domain = ReplaySafeDomain::default();
        assert_eq!(to_replay_safe_hash(&domain, &params()), reference(&domain, &params()));
    }

    #[test]
    fn binds_chain_account_and_plugin() {
        let domain = ReplaySafeDomain::default();
        let base = to_replay_safe_hash(&domain, &params());

        let other_chain = ReplaySafeHashParams {
            chain_id: 1,
            ..params()
        };
        let other_account = ReplaySafeHashParams {
            account: Address::repeat_byte(0xcc),
            ..params()
        };
        let other_plugin = ReplaySafeHashParams {
            plugin: Address::repeat_byte(0xcc),
            ..params()
        };

        assert_ne!(base, to_replay_safe_hash(&domain, &other_chain));
        assert_ne!(base, to_replay_safe_hash(&domain, &other_account));
        assert_ne!(base, to_replay_safe_hash(&domain, &other_plugin));
        assert_ne!(base, params().hash);
    }

    #[test]
    fn depends_on_domain_constants() {
        let domain = ReplaySafeDomain {
            version: "2.0.0".to_string(),
            ..ReplaySafeDomain::default()
        };
        assert_ne!(
            to_replay_safe_hash(&domain, &params()),
            to_replay_safe_hash(&ReplaySafeDomain::default(), &params())
        );
    }
}
