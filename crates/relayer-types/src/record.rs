//! The dedup/state-store entities of `spec.md` §3: `ProcessingRecord`, `Cursor`, and
//! `QuoteResult`.

use crate::chain_id::ChainId;
use crate::gateway::PendingTxId;
use crate::timestamp::UnixTimestamp;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// The state machine of `spec.md` §3: `Pending -> AwaitingFinality -> Dispatching ->
/// Submitted -> Done | Failed`, with one documented non-forward edge.
///
/// `Submitted -> Dispatching` is not part of normal forward progress; it is used only
/// by [`crate::gateway::ChainGateway`]-external restart reconciliation when the
/// process exits (or crashes) with a record still `Submitted` and the supervisor
/// cannot confirm whether the in-flight call landed (`spec.md` §7
/// `ShutdownInterrupt`). The `StateStore::reclaim` method in `relayer-store` is the
/// only place that performs this transition, so it never leaks into ordinary
/// processing code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProcessingStatus {
    Pending,
    AwaitingFinality,
    Dispatching,
    Submitted,
    Done,
    Failed,
}

impl ProcessingStatus {
    /// Whether `self -> next` is a normal forward transition (not the
    /// restart-reconciliation exception).
    ///
    /// `Dispatching -> Done` is included because the destination-side `isProcessed`
    /// double-guard can discover the call already landed before a submission is ever
    /// made, short-circuiting straight to the terminal state without visiting
    /// `Submitted`.
    pub fn can_advance_to(self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        matches!(
            (self, next),
            (Pending, AwaitingFinality)
                | (AwaitingFinality, Dispatching)
                | (Dispatching, Submitted)
                | (Dispatching, Done)
                | (Submitted, Done)
                | (Submitted, Failed)
                | (Dispatching, Failed)
        )
    }
}

/// A row of the Dedup / State Store, keyed by `(source_chain_id, nonce)`
/// (`spec.md` §3/§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub source_chain_id: ChainId,
    pub nonce: u64,
    pub status: ProcessingStatus,
    pub first_seen_at: UnixTimestamp,
    pub last_attempt_at: Option<UnixTimestamp>,
    pub attempts: u32,
    /// Populated once `status` reaches `Submitted`.
    pub dest_tx_id: Option<PendingTxId>,
    /// Populated once `status` reaches `Done` or `Failed`.
    pub terminal_at: Option<UnixTimestamp>,
    /// Populated only when `status` is `Failed`.
    pub failure_reason: Option<String>,
}

impl ProcessingRecord {
    pub fn new(source_chain_id: ChainId, nonce: u64, now: UnixTimestamp) -> Self {
        Self {
            source_chain_id,
            nonce,
            status: ProcessingStatus::Pending,
            first_seen_at: now,
            last_attempt_at: None,
            attempts: 0,
            dest_tx_id: None,
            terminal_at: None,
            failure_reason: None,
        }
    }

    pub fn key(&self) -> (ChainId, u64) {
        (self.source_chain_id.clone(), self.nonce)
    }
}

/// The per-`(chain_id, event_kind)` polling cursor of `spec.md` §4.2/§4.3: the last
/// block height up to which finalized events have been durably handed off.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cursor {
    pub last_finalized_block: u64,
}

/// The result of a pre-submission swap quote, per `spec.md` §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteResult {
    pub expected_out: U256,
    pub min_out: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> ChainId {
        ChainId::new("eip155", "8453")
    }

    #[test]
    fn new_record_starts_pending_with_zero_attempts() {
        let rec = ProcessingRecord::new(chain(), 1, UnixTimestamp(1_700_000_000));
        assert_eq!(rec.status, ProcessingStatus::Pending);
        assert_eq!(rec.attempts, 0);
        assert!(rec.dest_tx_id.is_none());
    }

    #[test]
    fn key_pairs_source_chain_and_nonce() {
        let rec = ProcessingRecord::new(chain(), 5, UnixTimestamp(0));
        assert_eq!(rec.key(), (chain(), 5));
    }

    #[test]
    fn forward_transitions_are_allowed() {
        use ProcessingStatus::*;
        assert!(Pending.can_advance_to(AwaitingFinality));
        assert!(AwaitingFinality.can_advance_to(Dispatching));
        assert!(Dispatching.can_advance_to(Submitted));
        assert!(Submitted.can_advance_to(Done));
        assert!(Submitted.can_advance_to(Failed));
        assert!(Dispatching.can_advance_to(Done));
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        use ProcessingStatus::*;
        assert!(!Pending.can_advance_to(Dispatching));
        assert!(!Pending.can_advance_to(Done));
    }

    #[test]
    fn submitted_to_dispatching_is_not_a_plain_forward_edge() {
        // The restart-reconciliation exception is modeled as `StateStore::reclaim`,
        // not as an ordinary advance — `can_advance_to` intentionally excludes it.
        assert!(!ProcessingStatus::Submitted.can_advance_to(ProcessingStatus::Dispatching));
    }
}
