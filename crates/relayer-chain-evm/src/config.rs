//! Per-chain EVM configuration.

use alloy_primitives::{Address, B256};
use relayer_types::config::{LiteralOrEnv, RpcConfig};
use relayer_types::ChainId;
use serde::{Deserialize, Serialize, Serializer};
use std::str::FromStr;

/// A validated 32-byte EVM private key, accepted as a `0x`-prefixed hex literal or a
/// `$VAR`/`${VAR}` environment reference via [`LiteralOrEnv`].
#[derive(Clone, Copy, Debug)]
pub struct EvmPrivateKey(pub B256);

impl FromStr for EvmPrivateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = B256::from_str(s).map_err(|e| format!("invalid private key: {e}"))?;
        Ok(EvmPrivateKey(bytes))
    }
}

impl Serialize for EvmPrivateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmChainConfig {
    /// The CAIP-2 identifier this config is addressed by, e.g. `eip155:8453`.
    pub chain_id: ChainId,
    /// The numeric EIP-155 chain id, used for signer replay protection.
    pub chain_ref: u64,
    #[serde(default = "defaults::eip1559")]
    pub eip1559: bool,
    #[serde(default = "defaults::receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    /// Gas limit for `mint`/`unlock` calls, which do no external swap.
    #[serde(default = "defaults::gas_limit")]
    pub gas_limit: u64,
    /// Gas limit for `mintAndSwap` calls. Higher than `gas_limit` because the bridge
    /// contract calls out to a DEX router before minting.
    #[serde(default = "defaults::swap_gas_limit")]
    pub swap_gas_limit: u64,
    /// At least one signer is required; multiple are round-robined.
    pub signers: Vec<LiteralOrEnv<EvmPrivateKeyString>>,
    pub rpc: Vec<RpcConfig>,
    /// The bridge contract this gateway reads events from and submits calls to.
    pub bridge_contract: Address,
}

/// `EvmPrivateKey` wrapped to satisfy `LiteralOrEnv<T>`'s `FromStr` bound while
/// keeping the outer config's `(De)Serialize` derive simple.
pub type EvmPrivateKeyString = EvmPrivateKey;

mod defaults {
    pub fn eip1559() -> bool {
        true
    }
    pub fn receipt_timeout_secs() -> u64 {
        30
    }
    pub fn gas_limit() -> u64 {
        150_000
    }
    pub fn swap_gas_limit() -> u64 {
        400_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_KEY: &str = "0x0101010101010101010101010101010101010101010101010101010101010101"; // 33 bytes, intentionally too long

    #[test]
    fn rejects_a_key_of_the_wrong_length() {
        assert!(VALID_KEY.parse::<EvmPrivateKey>().is_err());
    }

    #[test]
    fn accepts_a_32_byte_hex_key() {
        let key = "0x0101010101010101010101010101010101010101010101010101010101010101";
        let trimmed = &key[..66];
        assert!(trimmed.parse::<EvmPrivateKey>().is_ok());
    }
}
