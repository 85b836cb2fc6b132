//! Per-chain Solana configuration.

use relayer_types::config::LiteralOrEnv;
use relayer_types::ChainId;
use serde::{Deserialize, Serialize, Serializer};
use solana_commitment_config::CommitmentConfig;
use std::str::FromStr;

/// A base58-encoded Solana keypair (64 bytes), accepted as a literal or a
/// `$VAR`/`${VAR}` environment reference via [`LiteralOrEnv`].
#[derive(Debug, Clone)]
pub struct SolanaKeypairBytes(pub Vec<u8>);

impl FromStr for SolanaKeypairBytes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        bs58::decode(s)
            .into_vec()
            .map(SolanaKeypairBytes)
            .map_err(|e| format!("invalid base58 keypair: {e}"))
    }
}

impl Serialize for SolanaKeypairBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&bs58::encode(&self.0).into_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaChainConfig {
    /// The CAIP-2 identifier this config is addressed by, e.g. `solana:mainnet`.
    pub chain_id: ChainId,
    pub rpc_url: String,
    /// Base58-encoded fee-payer keypair used to sign submitted transactions.
    pub fee_payer: LiteralOrEnv<SolanaKeypairBytes>,
    /// The bridge program this gateway reads events from and submits calls to.
    #[serde(with = "pubkey_string")]
    pub program_id: solana_pubkey::Pubkey,
    #[serde(default = "defaults::commitment", with = "commitment_string")]
    pub commitment: CommitmentConfig,
    #[serde(default = "defaults::receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
}

mod defaults {
    use solana_commitment_config::CommitmentConfig;

    pub fn commitment() -> CommitmentConfig {
        CommitmentConfig::confirmed()
    }
    pub fn receipt_timeout_secs() -> u64 {
        30
    }
}

mod pubkey_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use solana_pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(pubkey: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&pubkey.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

mod commitment_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use solana_commitment_config::{CommitmentConfig, CommitmentLevel};

    pub fn serialize<S: Serializer>(commitment: &CommitmentConfig, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:?}", commitment.commitment).to_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CommitmentConfig, D::Error> {
        let s = String::deserialize(deserializer)?;
        let level = match s.as_str() {
            "processed" => CommitmentLevel::Processed,
            "confirmed" => CommitmentLevel::Confirmed,
            "finalized" => CommitmentLevel::Finalized,
            other => return Err(serde::de::Error::custom(format!("unknown commitment level: {other}"))),
        };
        Ok(CommitmentConfig { commitment: level })
    }
}
