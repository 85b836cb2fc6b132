//! `ChainGateway` for EIP-155 (EVM) chains.

pub mod abi;
pub mod config;
pub mod nonce;
pub mod provider;

pub use config::{EvmChainConfig, EvmPrivateKey};
pub use nonce::EvmNonceManager;
pub use provider::EvmChainGateway;
