//! The [`ChainGateway`] trait, the single seam every chain-family adapter implements:
//! a small async surface over an RPC client plus a signer, generalized to the six
//! operations `spec.md` §4.1 names.

use crate::chain_id::ChainId;
use crate::error::GatewayError;
use crate::event::{ChainAddress, EventKind};
use alloy_primitives::U256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a submitted, not-yet-confirmed transaction, returned by
/// [`ChainGateway::submit`] and consumed by [`ChainGateway::await_inclusion`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingTxId(pub String);

impl fmt::Display for PendingTxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal status of a transaction once `await_inclusion` resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Confirmed,
    Reverted,
}

/// A confirmed (or reverted) transaction receipt.
#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub tx_id: PendingTxId,
    pub status: TxStatus,
    pub block_number: u64,
    /// Populated when `status` is `Reverted` and the chain surfaced a reason string.
    pub revert_reason: Option<String>,
}

/// The call the Dispatcher wants submitted on the destination chain, per the routing
/// table of `spec.md` §4.5.
#[derive(Debug, Clone)]
pub enum ChainCall {
    Mint {
        recipient: ChainAddress,
        amount: U256,
        source_chain_id: ChainId,
        source_nonce: u64,
        /// Destination-contract-specific authorization bytes, produced by a
        /// configured `AuthSigner` (see `relayer_core::auth`).
        auth: Vec<u8>,
    },
    MintAndSwap {
        recipient: ChainAddress,
        amount: U256,
        min_out: U256,
        source_chain_id: ChainId,
        source_nonce: u64,
        auth: Vec<u8>,
    },
    Unlock {
        recipient: ChainAddress,
        amount: U256,
        source_chain_id: ChainId,
        source_nonce: u64,
        auth: Vec<u8>,
    },
}

impl ChainCall {
    pub fn source_nonce(&self) -> u64 {
        match self {
            ChainCall::Mint { source_nonce, .. }
            | ChainCall::MintAndSwap { source_nonce, .. }
            | ChainCall::Unlock { source_nonce, .. } => *source_nonce,
        }
    }

    pub fn source_chain_id(&self) -> &ChainId {
        match self {
            ChainCall::Mint { source_chain_id, .. }
            | ChainCall::MintAndSwap { source_chain_id, .. }
            | ChainCall::Unlock { source_chain_id, .. } => source_chain_id,
        }
    }
}

/// The result of quoting a swap's expected output, per `spec.md` §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteAmount {
    pub expected_out: U256,
}

/// The chain-family-agnostic surface every adapter (`relayer-chain-evm`,
/// `relayer-chain-solana`) implements, per `spec.md` §4.1.
///
/// Every method is expected to be wrapped by its caller in a deadline (`spec.md` §5);
/// the trait itself does not impose one so that implementations remain free to choose
/// their own transport-level timeout where that's more natural (e.g. an HTTP client's
/// own request timeout).
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// The chain this gateway talks to.
    fn chain_id(&self) -> &ChainId;

    /// Current chain head height (or slot, for Solana).
    async fn current_height(&self) -> Result<u64, GatewayError>;

    /// Events of the given kind discriminant in `[from_block, to_block]`, ordered by
    /// `(block_number, log_index)`.
    async fn query_events(
        &self,
        kind_filter: EventKindFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<crate::event::BridgeEvent>, GatewayError>;

    /// Submit a call; returns as soon as it has been accepted by the network
    /// (broadcast), not once it is confirmed.
    async fn submit(&self, call: ChainCall) -> Result<PendingTxId, GatewayError>;

    /// Block until `tx_id` reaches a terminal state or the caller's deadline elapses.
    async fn await_inclusion(&self, tx_id: &PendingTxId) -> Result<TxReceipt, GatewayError>;

    /// Whether `(source_chain_id, nonce)` has already been processed on this
    /// (destination) chain, per its `isProcessed` view call.
    async fn is_processed(&self, source_chain_id: &ChainId, nonce: u64) -> Result<bool, GatewayError>;

    /// Expected swap output for `amount`, used by Swap Protection (`spec.md` §4.7) to
    /// compute `minOut` immediately before submission.
    async fn quote(&self, target_token: &crate::event::TargetTokenId, amount: U256) -> Result<QuoteAmount, GatewayError>;
}

/// Which event kind discriminant to filter for in `query_events`; the gateway cannot
/// construct a full `EventKind` (it doesn't yet know `target_token`/`target_chain`
/// until it decodes the log), so this is a thin marker rather than reusing `EventKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKindFilter {
    Lock,
    Burn,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_call_exposes_common_fields_across_variants() {
        let source_chain_id = ChainId::new("eip155", "8453");
        let calls = vec![
            ChainCall::Mint {
                recipient: "0xabc".into(),
                amount: U256::from(1u64),
                source_chain_id: source_chain_id.clone(),
                source_nonce: 7,
                auth: vec![],
            },
            ChainCall::MintAndSwap {
                recipient: "0xabc".into(),
                amount: U256::from(1u64),
                min_out: U256::from(1u64),
                source_chain_id: source_chain_id.clone(),
                source_nonce: 8,
                auth: vec![],
            },
            ChainCall::Unlock {
                recipient: "0xabc".into(),
                amount: U256::from(1u64),
                source_chain_id: source_chain_id.clone(),
                source_nonce: 9,
                auth: vec![],
            },
        ];
        let nonces: Vec<u64> = calls.iter().map(ChainCall::source_nonce).collect();
        assert_eq!(nonces, vec![7, 8, 9]);
        assert!(calls.iter().all(|c| c.source_chain_id() == &source_chain_id));
    }

    #[test]
    fn pending_tx_id_displays_as_inner_string() {
        let id = PendingTxId("0xdeadbeef".into());
        assert_eq!(id.to_string(), "0xdeadbeef");
    }
}
