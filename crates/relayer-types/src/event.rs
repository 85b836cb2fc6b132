//! Normalized bridge events, adapted from the Lock/Burn entities of `spec.md` §3.

use crate::chain_id::ChainId;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a token on the destination chain, as named by a `Lock` event's
/// optional `target_token` hint (`spec.md` Design Note "Dynamic event schemas").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetTokenId(pub String);

impl fmt::Display for TargetTokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chain-family-tagged address string, syntax-validated by the gateway that
/// produced or will consume it.
///
/// Validation is deliberately not done here: an EVM gateway and a Solana gateway
/// disagree on what "valid" means, so each [`crate::gateway::ChainGateway`]
/// implementation validates addresses it receives, per `spec.md` §3's invariant that
/// "recipient is a syntactically valid address on the destination chain."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainAddress(pub String);

impl fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChainAddress {
    fn from(s: String) -> Self {
        ChainAddress(s)
    }
}

impl From<&str> for ChainAddress {
    fn from(s: &str) -> Self {
        ChainAddress(s.to_string())
    }
}

/// The two event kinds a source chain can emit, each carrying the destination-side
/// routing hint the Dispatcher needs (`spec.md` §4.5's routing table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EventKind {
    /// Funds locked on the source chain; destination should mint (optionally
    /// followed by a swap) or unlock, depending on `target_token`.
    Lock {
        /// Present only when the source event named a specific destination token to
        /// swap into after minting (routes to `MintAndSwap`); absent for a plain
        /// `Mint`.
        #[serde(skip_serializing_if = "Option::is_none")]
        target_token: Option<TargetTokenId>,
        target_chain: ChainId,
    },
    /// Funds burned on the source chain; destination should unlock the original
    /// collateral.
    Burn { target_chain: ChainId },
}

impl EventKind {
    pub fn target_chain(&self) -> &ChainId {
        match self {
            EventKind::Lock { target_chain, .. } => target_chain,
            EventKind::Burn { target_chain } => target_chain,
        }
    }
}

/// A normalized Lock/Burn event, as produced by a [`crate::gateway::ChainGateway`]'s
/// `query_events` and keyed for dedup by `(source_chain_id, nonce)` per `spec.md` §3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeEvent {
    pub source_chain_id: ChainId,
    /// Monotonic per-source-chain sequence number; the dedup key alongside
    /// `source_chain_id`.
    pub nonce: u64,
    pub kind: EventKind,
    pub sender: ChainAddress,
    pub recipient: ChainAddress,
    pub amount: U256,
    pub block_number: u64,
    pub log_index: u64,
}

impl BridgeEvent {
    /// The dedup key `spec.md` §3/§4.4 key the Dedup / State Store by.
    pub fn dedup_key(&self) -> (ChainId, u64) {
        (self.source_chain_id.clone(), self.nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chain() -> ChainId {
        ChainId::new("eip155", "8453")
    }

    #[test]
    fn dedup_key_pairs_source_chain_and_nonce() {
        let event = BridgeEvent {
            source_chain_id: sample_chain(),
            nonce: 42,
            kind: EventKind::Burn {
                target_chain: ChainId::new("eip155", "1"),
            },
            sender: "0xabc".into(),
            recipient: "0xdef".into(),
            amount: U256::from(1_000u64),
            block_number: 100,
            log_index: 0,
        };
        assert_eq!(event.dedup_key(), (sample_chain(), 42));
    }

    #[test]
    fn lock_without_target_token_serializes_without_field() {
        let kind = EventKind::Lock {
            target_token: None,
            target_chain: sample_chain(),
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(!json.contains("target_token"));
    }

    #[test]
    fn lock_with_target_token_round_trips() {
        let kind = EventKind::Lock {
            target_token: Some(TargetTokenId("USDC".into())),
            target_chain: sample_chain(),
        };
        let json = serde_json::to_string(&kind).unwrap();
        let back: EventKind = serde_json::from_str(&json).unwrap();
        assert_eq!(kind, back);
    }

    #[test]
    fn target_chain_accessor_covers_both_variants() {
        let lock = EventKind::Lock {
            target_token: None,
            target_chain: sample_chain(),
        };
        let burn = EventKind::Burn {
            target_chain: sample_chain(),
        };
        assert_eq!(lock.target_chain(), &sample_chain());
        assert_eq!(burn.target_chain(), &sample_chain());
    }
}
