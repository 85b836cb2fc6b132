//! `EvmNonceManager`: tracks the next nonce to use per signer address.
//!
//! Caches nonces per address, fetching with `.pending()` on first use so a restart
//! with transactions still in the mempool doesn't immediately submit a colliding
//! nonce. `reset_nonce` is called whenever a submission or receipt fetch fails, per
//! `spec.md` §4.1's "nonce too low"/"already known" resync-and-retry-once policy.

use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_provider::fillers::NonceManager;
use alloy_transport::TransportResult;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

const NONE: u64 = u64::MAX;

#[derive(Clone, Debug, Default)]
pub struct EvmNonceManager {
    nonces: Arc<DashMap<Address, Arc<Mutex<u64>>>>,
}

#[async_trait]
impl NonceManager for EvmNonceManager {
    async fn get_next_nonce<P, N>(&self, provider: &P, address: Address) -> TransportResult<u64>
    where
        P: Provider<N>,
        N: alloy_network::Network,
    {
        let nonce = {
            let slot = self
                .nonces
                .entry(address)
                .or_insert_with(|| Arc::new(Mutex::new(NONE)));
            Arc::clone(slot.value())
        };

        let mut nonce = nonce.lock().await;
        let new_nonce = if *nonce == NONE {
            tracing::trace!(%address, "fetching nonce from pending state");
            provider.get_transaction_count(address).pending().await?
        } else {
            *nonce + 1
        };
        *nonce = new_nonce;
        Ok(new_nonce)
    }
}

impl EvmNonceManager {
    pub async fn reset_nonce(&self, address: Address) {
        if let Some(slot) = self.nonces.get(&address) {
            let mut nonce = slot.lock().await;
            *nonce = NONE;
            tracing::debug!(%address, "reset cached nonce, will requery on next use");
        }
    }
}
