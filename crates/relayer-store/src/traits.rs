//! The `StateStore` trait: the Dedup / State Store component of `spec.md` §4.4.

use async_trait::async_trait;
use relayer_types::{ChainId, EventKindFilter, ProcessingRecord, PendingTxId, ProcessingStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("record for ({0}, {1}) not found")]
    NotFound(ChainId, u64),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("illegal transition for ({0}, {1}): {2:?} -> {3:?}")]
    IllegalTransition(ChainId, u64, ProcessingStatus, ProcessingStatus),
}

/// Outcome of attempting to claim `(source_chain_id, nonce)` for processing.
///
/// This is the atomic operation `spec.md` §4.4's "Concurrency" note requires: two
/// workers racing on the same key must not both proceed to dispatch.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// No record existed, or it was `Pending`/`AwaitingFinality`; the caller now owns
    /// it and should proceed to dispatch.
    Claimed(ProcessingRecord),
    /// Another worker already holds this key (`Dispatching` or `Submitted`).
    InFlight(ProcessingRecord),
    /// The record is already terminal (`Done` or `Failed`); the caller should skip it.
    AlreadyTerminal(ProcessingRecord),
}

/// Snapshot of store-wide counters, for the Supervisor's periodic stats log
/// (`spec.md` §4.8).
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    pub pending: u64,
    pub awaiting_finality: u64,
    pub dispatching: u64,
    pub submitted: u64,
    pub done: u64,
    pub failed: u64,
}

/// Checks a `ProcessingStatus` transition against [`ProcessingStatus::can_advance_to`],
/// shared by both `StateStore` implementations' mutation methods.
pub(crate) fn require_advance(
    source_chain_id: &ChainId,
    nonce: u64,
    current: ProcessingStatus,
    next: ProcessingStatus,
) -> Result<(), StoreError> {
    if current.can_advance_to(next) {
        Ok(())
    } else {
        Err(StoreError::IllegalTransition(source_chain_id.clone(), nonce, current, next))
    }
}

/// Durable (or in-memory) idempotence tracking plus per-source cursor persistence.
///
/// Implementations: [`crate::memory::MemoryStateStore`] (process-local, `DashMap`) and
/// [`crate::durable::SledStateStore`] (crash-durable, backed by `sled`), selected by
/// whether the relayer's configuration names a `stateStorePath`.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Atomically claim `(source_chain_id, nonce)` for processing: inserts a fresh
    /// `Pending` record if none exists, then transitions `Pending -> AwaitingFinality`
    /// as part of the same atomic step so exactly one racer on a given key observes
    /// `Claimed`.
    async fn begin_processing(
        &self,
        source_chain_id: &ChainId,
        nonce: u64,
    ) -> Result<ClaimOutcome, StoreError>;

    /// Advance a claimed record's status, recording an attempt.
    /// `AwaitingFinality -> Dispatching` transition point.
    async fn mark_dispatching(&self, source_chain_id: &ChainId, nonce: u64) -> Result<(), StoreError>;

    /// `Dispatching -> Submitted`, recording the destination transaction id.
    async fn mark_submitted(
        &self,
        source_chain_id: &ChainId,
        nonce: u64,
        dest_tx_id: PendingTxId,
    ) -> Result<(), StoreError>;

    /// `Submitted -> Done`, or `Dispatching -> Done` when the destination-side
    /// `isProcessed` double-guard finds the call already landed before submission.
    async fn mark_done(&self, source_chain_id: &ChainId, nonce: u64) -> Result<(), StoreError>;

    /// `Submitted | Dispatching -> Failed`, recording the terminal reason.
    async fn mark_failed(
        &self,
        source_chain_id: &ChainId,
        nonce: u64,
        reason: String,
    ) -> Result<(), StoreError>;

    /// The documented non-forward exception: `Submitted -> Dispatching`, used only
    /// during restart reconciliation when a prior process exited with the record
    /// still in flight and inclusion could not be confirmed (`spec.md` §7
    /// `ShutdownInterrupt`).
    async fn reclaim(&self, source_chain_id: &ChainId, nonce: u64) -> Result<(), StoreError>;

    /// All records currently `Submitted`, for boot-time reconciliation.
    async fn submitted_records(&self) -> Result<Vec<ProcessingRecord>, StoreError>;

    /// Store-wide status counters.
    async fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Remove terminal (`Done`/`Failed`) records older than `older_than_secs` seconds;
    /// returns the number removed.
    async fn cleanup(&self, older_than_secs: u64) -> Result<u64, StoreError>;

    /// The last durably-advanced cursor for `(chain_id, kind)`, or `None` if polling
    /// has never advanced past genesis.
    async fn cursor(
        &self,
        chain_id: &ChainId,
        kind: EventKindFilter,
    ) -> Result<Option<relayer_types::Cursor>, StoreError>;

    /// Durably advance the cursor. Called only after the corresponding event batch
    /// has been handed to the dispatcher channel, per `spec.md` §4.2's "persist
    /// cursor only after side effects are durable" rule.
    async fn advance_cursor(
        &self,
        chain_id: &ChainId,
        kind: EventKindFilter,
        cursor: relayer_types::Cursor,
    ) -> Result<(), StoreError>;
}
