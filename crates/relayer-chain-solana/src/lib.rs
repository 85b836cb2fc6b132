//! `ChainGateway` for Solana.
//!
//! See `provider`'s module doc and `DESIGN.md` for why this adapter's at-least-once
//! guarantee is documented as weaker than the EVM path rather than assumed identical.

pub mod config;
pub mod instruction;
pub mod provider;

pub use config::{SolanaChainConfig, SolanaKeypairBytes};
pub use provider::SolanaChainGateway;
