//! Configuration loading for the relayer binary: CLI `--config`/`-c` (env `CONFIG`,
//! default `config.json`) selects a JSON file, and fields absent from it fall back to
//! serde defaults or environment variables.

use clap::Parser;
use relayer_chain_evm::EvmChainConfig;
use relayer_chain_solana::SolanaChainConfig;
use relayer_types::{ChainId, EventKindFilter};
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "relayer")]
#[command(about = "Cross-chain bridge relayer")]
struct CliArgs {
    /// Path to the JSON configuration file.
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    config: PathBuf,
}

/// Chain-family-specific configuration, keyed in the config file by the CAIP-2 chain
/// identifier whose namespace (`eip155:` or `solana:`) selects the variant.
#[derive(Debug, Clone)]
pub enum ChainConfig {
    Evm(Box<EvmChainConfig>),
    Solana(Box<SolanaChainConfig>),
}

impl ChainConfig {
    pub fn chain_id(&self) -> &ChainId {
        match self {
            ChainConfig::Evm(c) => &c.chain_id,
            ChainConfig::Solana(c) => &c.chain_id,
        }
    }
}

/// Wrapper around `Vec<ChainConfig>` serialized as a map of chain id -> config,
/// mirroring `facilitator::config::ChainsConfig`.
#[derive(Debug, Clone, Default)]
pub struct ChainsConfig(pub Vec<ChainConfig>);

impl Deref for ChainsConfig {
    type Target = Vec<ChainConfig>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Serialize for ChainsConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for chain_config in &self.0 {
            match chain_config {
                ChainConfig::Evm(config) => map.serialize_entry(&config.chain_id, config)?,
                ChainConfig::Solana(config) => map.serialize_entry(&config.chain_id, config)?,
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ChainsConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{MapAccess, Visitor};
        use std::fmt;

        struct ChainsVisitor;

        impl<'de> Visitor<'de> for ChainsVisitor {
            type Value = ChainsConfig;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of chain identifiers to chain configurations")
            }

            fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut chains = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(chain_id) = access.next_key::<ChainId>()? {
                    let config = if chain_id.is_eip155() {
                        ChainConfig::Evm(Box::new(access.next_value()?))
                    } else if chain_id.is_solana() {
                        ChainConfig::Solana(Box::new(access.next_value()?))
                    } else {
                        return Err(serde::de::Error::custom(format!(
                            "unsupported chain namespace: {}",
                            chain_id.namespace()
                        )));
                    };
                    chains.push(config);
                }
                Ok(ChainsConfig(chains))
            }
        }

        deserializer.deserialize_map(ChainsVisitor)
    }
}

/// One A->B (or B->A) bridging pipeline, naming its source/dest chains and the event
/// kind it watches for on the source side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionEntry {
    pub source: ChainId,
    pub dest: ChainId,
    pub event_kind: EventKindFilter,
    #[serde(default = "defaults::slippage_bps")]
    pub slippage_bps: u16,
    #[serde(default = "defaults::worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "defaults::poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "defaults::required_confirmations")]
    pub required_confirmations: u64,
    /// Caps each poll's `query_events` span to at most this many blocks, so a long
    /// catch-up after downtime doesn't issue one unbounded range query.
    #[serde(default = "defaults::max_block_range")]
    pub max_block_range: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chains: ChainsConfig,
    #[serde(default)]
    pub directions: Vec<DirectionEntry>,
    /// `sled` database directory. `None` runs the relayer with the in-memory store,
    /// which does not survive a restart.
    #[serde(default)]
    pub state_store_path: Option<String>,
    #[serde(default = "defaults::shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    /// Signer used for the pluggable `AuthSigner` scheme (`spec.md` §9 Open Question).
    pub auth_signer_key: relayer_types::config::LiteralOrEnv<relayer_chain_evm::EvmPrivateKey>,
}

mod defaults {
    pub fn slippage_bps() -> u16 {
        100
    }
    pub fn worker_pool_size() -> usize {
        4
    }
    pub fn poll_interval_secs() -> u64 {
        15
    }
    pub fn required_confirmations() -> u64 {
        12
    }
    pub fn max_block_range() -> u64 {
        500
    }
    pub fn shutdown_grace_ms() -> u64 {
        60_000
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("direction {1}->{2}: {0}")]
    InvalidSlippage(relayer_core::swap::SlippageConfigError, ChainId, ChainId),
}

impl Config {
    /// Load configuration from CLI arguments and the JSON file they name.
    pub fn load() -> Result<Self, ConfigError> {
        let cli_args = CliArgs::parse();
        let path = Path::new(&cli_args.config)
            .canonicalize()
            .map_err(|e| ConfigError::FileRead(cli_args.config, e))?;
        Self::load_from_path(path)
    }

    fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::FileRead(path, e))?;
        let config: Config = serde_json::from_str(&content)?;
        for direction in &config.directions {
            relayer_core::swap::validate_slippage_bps(direction.slippage_bps)
                .map_err(|e| ConfigError::InvalidSlippage(e, direction.source.clone(), direction.dest.clone()))?;
        }
        Ok(config)
    }
}
