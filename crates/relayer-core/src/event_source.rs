//! Event Source + embedded Finality Gate (`spec.md` §4.2/§4.3).
//!
//! Polls one `(ChainGateway, EventKindFilter)` pair on an interval, only ever
//! advancing its cursor to `head - required_confirmations` — the cursor-gating model
//! `spec.md` §4.3 calls "the simpler, chosen" admissible implementation. The cursor is
//! persisted only after the batch has been handed to the dispatcher channel, so a
//! crash between handoff and persistence re-delivers the batch (at-least-once) rather
//! than losing it.

use relayer_store::StateStore;
use relayer_types::{BridgeEvent, ChainGateway, Cursor, EventKindFilter, GatewayError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// How many blocks behind the chain head a source chain's events must be before the
/// Event Source will emit them. `spec.md` §4.3 defaults: 12 for EVM mainnets, 1 for
/// networks explicitly marked test networks.
#[derive(Debug, Clone, Copy)]
pub struct FinalityPolicy {
    pub required_confirmations: u64,
}

impl FinalityPolicy {
    pub const EVM_MAINNET: FinalityPolicy = FinalityPolicy {
        required_confirmations: 12,
    };
    pub const TEST_NETWORK: FinalityPolicy = FinalityPolicy {
        required_confirmations: 1,
    };

    /// The highest block number whose events are eligible to be emitted, given the
    /// chain's current head.
    fn finalized_height(&self, head: u64) -> Option<u64> {
        head.checked_sub(self.required_confirmations)
    }
}

/// Owns one polling loop over a single `(gateway, kind)` pair.
pub struct EventSource<G: ChainGateway + ?Sized> {
    gateway: Arc<G>,
    kind: EventKindFilter,
    finality: FinalityPolicy,
    poll_interval: Duration,
    max_block_range: u64,
    store: Arc<dyn StateStore>,
}

impl<G: ChainGateway + ?Sized + 'static> EventSource<G> {
    pub fn new(
        gateway: Arc<G>,
        kind: EventKindFilter,
        finality: FinalityPolicy,
        poll_interval: Duration,
        max_block_range: u64,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            gateway,
            kind,
            finality,
            poll_interval,
            max_block_range: max_block_range.max(1),
            store,
        }
    }

    /// Run the polling loop until `shutdown` is cancelled.
    pub async fn run(&self, tx: Sender<BridgeEvent>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(chain_id = %self.gateway.chain_id(), "event source shutting down");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once(&tx).await {
                        warn!(chain_id = %self.gateway.chain_id(), error = %e, "poll cycle failed, will retry next tick");
                    }
                }
            }
        }
    }

    async fn poll_once(&self, tx: &Sender<BridgeEvent>) -> Result<(), GatewayError> {
        let chain_id = self.gateway.chain_id().clone();
        let head = self.gateway.current_height().await?;
        let Some(finalized_head) = self.finality.finalized_height(head) else {
            debug!(%chain_id, head, "chain too young for any confirmed blocks yet");
            return Ok(());
        };

        let cursor = self
            .store
            .cursor(&chain_id, self.kind)
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;
        let mut from_block = cursor.map(|c| c.last_finalized_block + 1).unwrap_or(0);

        // Chunk the catch-up range into windows of at most `max_block_range` blocks,
        // advancing the cursor after each chunk is handed off so a crash mid-catch-up
        // resumes from the last completed window instead of re-querying from scratch.
        while from_block <= finalized_head {
            let to_block = from_block
                .saturating_add(self.max_block_range - 1)
                .min(finalized_head);

            let events = self.gateway.query_events(self.kind, from_block, to_block).await?;

            for event in &events {
                if tx.send(event.clone()).await.is_err() {
                    error!(%chain_id, "dispatcher channel closed, dropping remaining batch");
                    return Ok(());
                }
            }

            self.store
                .advance_cursor(&chain_id, self.kind, Cursor { last_finalized_block: to_block })
                .await
                .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;

            debug!(%chain_id, from_block, to_block, count = events.len(), "polled and handed off batch");
            from_block = to_block + 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relayer_store::MemoryStateStore;
    use relayer_types::{ChainCall, ChainId, GatewayError, PendingTxId, QuoteAmount, TargetTokenId, TxReceipt};
    use std::sync::Mutex;

    #[test]
    fn finalized_height_subtracts_confirmations() {
        assert_eq!(FinalityPolicy::EVM_MAINNET.finalized_height(100), Some(88));
        assert_eq!(FinalityPolicy::TEST_NETWORK.finalized_height(100), Some(99));
    }

    #[test]
    fn finalized_height_is_none_below_confirmation_depth() {
        assert_eq!(FinalityPolicy::EVM_MAINNET.finalized_height(5), None);
    }

    struct FixedHeightGateway {
        chain_id: ChainId,
        head: u64,
        queried_ranges: Mutex<Vec<(u64, u64)>>,
    }

    #[async_trait]
    impl ChainGateway for FixedHeightGateway {
        fn chain_id(&self) -> &ChainId {
            &self.chain_id
        }
        async fn current_height(&self) -> Result<u64, GatewayError> {
            Ok(self.head)
        }
        async fn query_events(
            &self,
            _kind_filter: EventKindFilter,
            from_block: u64,
            to_block: u64,
        ) -> Result<Vec<BridgeEvent>, GatewayError> {
            self.queried_ranges.lock().unwrap().push((from_block, to_block));
            Ok(vec![])
        }
        async fn submit(&self, _call: ChainCall) -> Result<PendingTxId, GatewayError> {
            unimplemented!()
        }
        async fn await_inclusion(&self, _tx_id: &PendingTxId) -> Result<TxReceipt, GatewayError> {
            unimplemented!()
        }
        async fn is_processed(&self, _source_chain_id: &ChainId, _nonce: u64) -> Result<bool, GatewayError> {
            unimplemented!()
        }
        async fn quote(&self, _target_token: &TargetTokenId, _amount: alloy_primitives::U256) -> Result<QuoteAmount, GatewayError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn poll_once_chunks_a_long_catch_up_range() {
        let gateway = Arc::new(FixedHeightGateway {
            chain_id: ChainId::new("eip155", "8453"),
            head: 1_012,
            queried_ranges: Mutex::new(Vec::new()),
        });
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let source = EventSource::new(
            gateway.clone(),
            EventKindFilter::Lock,
            FinalityPolicy::TEST_NETWORK,
            Duration::from_secs(1),
            300,
            store.clone(),
        );
        let (tx, _rx) = tokio::sync::mpsc::channel(16);
        source.poll_once(&tx).await.unwrap();

        let ranges = gateway.queried_ranges.lock().unwrap().clone();
        assert_eq!(ranges, vec![(0, 299), (300, 599), (600, 899), (900, 1_011)]);

        let cursor = store
            .cursor(&ChainId::new("eip155", "8453"), EventKindFilter::Lock)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cursor.last_finalized_block, 1_011);
    }
}
