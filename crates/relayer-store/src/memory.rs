//! In-memory `StateStore`, backed by `DashMap` — sufficient on its own when combined
//! with the destination gateway's `is_processed` check, per `spec.md` §4.4's
//! "Concurrency" note. Used whenever the relayer's configuration omits a
//! `stateStorePath`.

use crate::traits::{require_advance, ClaimOutcome, StateStore, StoreError, StoreStats};
use async_trait::async_trait;
use dashmap::DashMap;
use relayer_types::{ChainId, Cursor, EventKindFilter, PendingTxId, ProcessingRecord, ProcessingStatus, UnixTimestamp};

type ProcessingKey = (ChainId, u64);
type CursorKey = (ChainId, EventKindFilter);

#[derive(Default)]
pub struct MemoryStateStore {
    processing: DashMap<ProcessingKey, ProcessingRecord>,
    cursors: DashMap<CursorKey, Cursor>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> UnixTimestamp {
        UnixTimestamp::now().expect("system clock before unix epoch")
    }

    fn get_or_err(&self, chain_id: &ChainId, nonce: u64) -> Result<ProcessingRecord, StoreError> {
        self.processing
            .get(&(chain_id.clone(), nonce))
            .map(|r| r.clone())
            .ok_or_else(|| StoreError::NotFound(chain_id.clone(), nonce))
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn begin_processing(
        &self,
        source_chain_id: &ChainId,
        nonce: u64,
    ) -> Result<ClaimOutcome, StoreError> {
        let key = (source_chain_id.clone(), nonce);
        let mut entry = self
            .processing
            .entry(key)
            .or_insert_with(|| ProcessingRecord::new(source_chain_id.clone(), nonce, Self::now()));
        // The claim itself must transition status while the shard guard is held, or
        // two racers on the same key can both read `Pending` and both proceed.
        if entry.status == ProcessingStatus::Pending {
            entry.status = ProcessingStatus::AwaitingFinality;
            return Ok(ClaimOutcome::Claimed(entry.value().clone()));
        }
        let record = entry.value().clone();
        Ok(match record.status {
            ProcessingStatus::AwaitingFinality
            | ProcessingStatus::Dispatching
            | ProcessingStatus::Submitted => ClaimOutcome::InFlight(record),
            ProcessingStatus::Done | ProcessingStatus::Failed => ClaimOutcome::AlreadyTerminal(record),
            ProcessingStatus::Pending => unreachable!("Pending handled above"),
        })
    }

    async fn mark_dispatching(&self, source_chain_id: &ChainId, nonce: u64) -> Result<(), StoreError> {
        let mut entry = self
            .processing
            .get_mut(&(source_chain_id.clone(), nonce))
            .ok_or_else(|| StoreError::NotFound(source_chain_id.clone(), nonce))?;
        require_advance(source_chain_id, nonce, entry.status, ProcessingStatus::Dispatching)?;
        entry.status = ProcessingStatus::Dispatching;
        entry.attempts += 1;
        entry.last_attempt_at = Some(Self::now());
        Ok(())
    }

    async fn mark_submitted(
        &self,
        source_chain_id: &ChainId,
        nonce: u64,
        dest_tx_id: PendingTxId,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .processing
            .get_mut(&(source_chain_id.clone(), nonce))
            .ok_or_else(|| StoreError::NotFound(source_chain_id.clone(), nonce))?;
        require_advance(source_chain_id, nonce, entry.status, ProcessingStatus::Submitted)?;
        entry.status = ProcessingStatus::Submitted;
        entry.dest_tx_id = Some(dest_tx_id);
        Ok(())
    }

    async fn mark_done(&self, source_chain_id: &ChainId, nonce: u64) -> Result<(), StoreError> {
        let mut entry = self
            .processing
            .get_mut(&(source_chain_id.clone(), nonce))
            .ok_or_else(|| StoreError::NotFound(source_chain_id.clone(), nonce))?;
        require_advance(source_chain_id, nonce, entry.status, ProcessingStatus::Done)?;
        entry.status = ProcessingStatus::Done;
        entry.terminal_at = Some(Self::now());
        Ok(())
    }

    async fn mark_failed(
        &self,
        source_chain_id: &ChainId,
        nonce: u64,
        reason: String,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .processing
            .get_mut(&(source_chain_id.clone(), nonce))
            .ok_or_else(|| StoreError::NotFound(source_chain_id.clone(), nonce))?;
        require_advance(source_chain_id, nonce, entry.status, ProcessingStatus::Failed)?;
        entry.status = ProcessingStatus::Failed;
        entry.terminal_at = Some(Self::now());
        entry.failure_reason = Some(reason);
        Ok(())
    }

    async fn reclaim(&self, source_chain_id: &ChainId, nonce: u64) -> Result<(), StoreError> {
        let mut entry = self
            .processing
            .get_mut(&(source_chain_id.clone(), nonce))
            .ok_or_else(|| StoreError::NotFound(source_chain_id.clone(), nonce))?;
        if entry.status != ProcessingStatus::Submitted {
            return Err(StoreError::IllegalTransition(
                source_chain_id.clone(),
                nonce,
                entry.status,
                ProcessingStatus::Dispatching,
            ));
        }
        entry.status = ProcessingStatus::Dispatching;
        Ok(())
    }

    async fn submitted_records(&self) -> Result<Vec<ProcessingRecord>, StoreError> {
        Ok(self
            .processing
            .iter()
            .filter(|e| e.value().status == ProcessingStatus::Submitted)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut stats = StoreStats::default();
        for entry in self.processing.iter() {
            match entry.value().status {
                ProcessingStatus::Pending => stats.pending += 1,
                ProcessingStatus::AwaitingFinality => stats.awaiting_finality += 1,
                ProcessingStatus::Dispatching => stats.dispatching += 1,
                ProcessingStatus::Submitted => stats.submitted += 1,
                ProcessingStatus::Done => stats.done += 1,
                ProcessingStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    async fn cleanup(&self, older_than_secs: u64) -> Result<u64, StoreError> {
        let now = Self::now().0;
        let cutoff = now.saturating_sub(older_than_secs);
        let mut removed = 0u64;
        self.processing.retain(|_, record| {
            let expired = matches!(record.status, ProcessingStatus::Done | ProcessingStatus::Failed)
                && record.terminal_at.map(|t| t.0 < cutoff).unwrap_or(false);
            if expired {
                removed += 1;
            }
            !expired
        });
        Ok(removed)
    }

    async fn cursor(&self, chain_id: &ChainId, kind: EventKindFilter) -> Result<Option<Cursor>, StoreError> {
        Ok(self.cursors.get(&(chain_id.clone(), kind)).map(|c| *c))
    }

    async fn advance_cursor(
        &self,
        chain_id: &ChainId,
        kind: EventKindFilter,
        cursor: Cursor,
    ) -> Result<(), StoreError> {
        self.cursors.insert((chain_id.clone(), kind), cursor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn chain() -> ChainId {
        ChainId::new("eip155", "8453")
    }

    #[tokio::test]
    async fn first_claim_is_fresh() {
        let store = MemoryStateStore::new();
        let outcome = store.begin_processing(&chain(), 1).await.unwrap();
        assert!(matches!(outcome, ClaimOutcome::Claimed(_)));
    }

    #[tokio::test]
    async fn second_claim_while_dispatching_is_in_flight() {
        let store = MemoryStateStore::new();
        store.begin_processing(&chain(), 1).await.unwrap();
        store.mark_dispatching(&chain(), 1).await.unwrap();
        let outcome = store.begin_processing(&chain(), 1).await.unwrap();
        assert!(matches!(outcome, ClaimOutcome::InFlight(_)));
    }

    #[tokio::test]
    async fn claim_after_done_is_already_terminal() {
        let store = MemoryStateStore::new();
        store.begin_processing(&chain(), 1).await.unwrap();
        store.mark_dispatching(&chain(), 1).await.unwrap();
        store
            .mark_submitted(&chain(), 1, PendingTxId("0xabc".into()))
            .await
            .unwrap();
        store.mark_done(&chain(), 1).await.unwrap();
        let outcome = store.begin_processing(&chain(), 1).await.unwrap();
        assert!(matches!(outcome, ClaimOutcome::AlreadyTerminal(_)));
    }

    #[tokio::test]
    async fn concurrent_claims_on_same_key_only_one_proceeds() {
        let store = Arc::new(MemoryStateStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.begin_processing(&chain(), 99).await.unwrap()
            }));
        }
        let mut claimed = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), ClaimOutcome::Claimed(_)) {
                claimed += 1;
            }
        }
        // The claim transitions status while holding the shard guard, so exactly one
        // of the 16 racers observes `Claimed`; the rest see `InFlight`.
        assert_eq!(claimed, 1);
        assert_eq!(store.processing.len(), 1);
    }

    #[tokio::test]
    async fn cursor_round_trips() {
        let store = MemoryStateStore::new();
        assert!(store.cursor(&chain(), EventKindFilter::Lock).await.unwrap().is_none());
        store
            .advance_cursor(&chain(), EventKindFilter::Lock, Cursor { last_finalized_block: 100 })
            .await
            .unwrap();
        let cursor = store.cursor(&chain(), EventKindFilter::Lock).await.unwrap().unwrap();
        assert_eq!(cursor.last_finalized_block, 100);
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired_terminal_records() {
        let store = MemoryStateStore::new();
        store.begin_processing(&chain(), 1).await.unwrap();
        store.mark_dispatching(&chain(), 1).await.unwrap();
        store
            .mark_submitted(&chain(), 1, PendingTxId("0xabc".into()))
            .await
            .unwrap();
        store.mark_done(&chain(), 1).await.unwrap();
        {
            let mut entry = store.processing.get_mut(&(chain(), 1)).unwrap();
            entry.terminal_at = Some(UnixTimestamp(0));
        }
        store.begin_processing(&chain(), 2).await.unwrap();
        let removed = store.cleanup(3600).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.processing.contains_key(&(chain(), 2)));
    }
}
