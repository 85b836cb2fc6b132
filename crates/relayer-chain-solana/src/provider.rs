//! `SolanaChainGateway`: the `ChainGateway` implementation for Solana.
//!
//! This adapter's at-least-once guarantee is intentionally weaker than the EVM path
//! (`relayer-chain-evm`): Solana exposes confirmation *commitment levels*, not block
//! depth, and this implementation polls recent signatures rather than subscribing to
//! a log stream. See `DESIGN.md` for why this is accepted rather than papered over.

use crate::config::SolanaChainConfig;
use crate::instruction::{self, Discriminant};
use async_trait::async_trait;
use relayer_types::{
    BridgeEvent, ChainGateway, ChainId, EventKindFilter, GatewayError, PendingTxId, QuoteAmount,
    TargetTokenId, TxReceipt, TxStatus,
};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_keypair::Keypair;
use solana_message::Message;
use solana_pubkey::Pubkey;
use solana_signer::Signer as _;
use solana_transaction::Transaction;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

pub struct SolanaChainGateway {
    chain_id: ChainId,
    rpc: RpcClient,
    fee_payer: Keypair,
    program_id: Pubkey,
    commitment: CommitmentConfig,
    receipt_timeout: Duration,
}

impl SolanaChainGateway {
    pub fn from_config(config: &SolanaChainConfig) -> Result<Self, GatewayError> {
        let fee_payer = Keypair::try_from(config.fee_payer.inner().0.as_slice())
            .map_err(|e| GatewayError::InvalidArgument(format!("invalid fee payer keypair: {e}")))?;
        let rpc = RpcClient::new_with_commitment(config.rpc_url.clone(), config.commitment);
        Ok(Self {
            chain_id: config.chain_id.clone(),
            rpc,
            fee_payer,
            program_id: config.program_id,
            commitment: config.commitment,
            receipt_timeout: Duration::from_secs(config.receipt_timeout_secs),
        })
    }

    async fn submit_instruction_data(&self, data: Vec<u8>) -> Result<PendingTxId, GatewayError> {
        let accounts = vec![solana_instruction::AccountMeta::new(self.fee_payer.pubkey(), true)];
        let instruction = solana_instruction::Instruction {
            program_id: self.program_id,
            accounts,
            data,
        };
        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;
        let message = Message::new(&[instruction], Some(&self.fee_payer.pubkey()));
        let transaction = Transaction::new(&[&self.fee_payer], message, blockhash);

        let signature = self
            .rpc
            .send_transaction(&transaction)
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;
        Ok(PendingTxId(signature.to_string()))
    }

    fn processed_marker_pda(&self, source_chain_id: &ChainId, nonce: u64) -> Pubkey {
        let source_chain_id_str = source_chain_id.to_string();
        let seeds: &[&[u8]] = &[b"processed", source_chain_id_str.as_bytes(), &nonce.to_le_bytes()];
        Pubkey::find_program_address(seeds, &self.program_id).0
    }
}

#[async_trait]
impl ChainGateway for SolanaChainGateway {
    fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    async fn current_height(&self) -> Result<u64, GatewayError> {
        self.rpc
            .get_slot_with_commitment(self.commitment)
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))
    }

    /// Fetches the program's most recent signatures and parses `BRIDGE_EVENT` log
    /// lines out of each transaction's logs, keeping only those whose slot falls in
    /// `[from_block, to_block]`.
    ///
    /// Unlike `eth_getLogs`, Solana has no range-filtered log query; this walks
    /// `getSignaturesForAddress`'s most-recent-first page once per poll, which is
    /// adequate at the relayer's poll cadence but does not guarantee completeness
    /// under very high program throughput. Documented, not silently assumed
    /// equivalent to the EVM path.
    async fn query_events(
        &self,
        kind_filter: EventKindFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<BridgeEvent>, GatewayError> {
        let signatures = self
            .rpc
            .get_signatures_for_address(&self.program_id)
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;

        let mut events = Vec::new();
        for (log_index, sig_info) in signatures.iter().enumerate() {
            let slot = sig_info.slot;
            if slot < from_block || slot > to_block {
                continue;
            }
            let signature = match solana_signature::Signature::from_str(&sig_info.signature) {
                Ok(s) => s,
                Err(_) => continue,
            };
            let tx = match self
                .rpc
                .get_transaction(&signature, solana_transaction_status_client_types::UiTransactionEncoding::Json)
                .await
            {
                Ok(tx) => tx,
                Err(e) => {
                    warn!(signature = %sig_info.signature, error = %e, "failed to fetch transaction for log parsing");
                    continue;
                }
            };
            let Some(meta) = tx.transaction.meta else { continue };
            let solana_transaction_status_client_types::option_serializer::OptionSerializer::Some(logs) =
                meta.log_messages
            else {
                continue;
            };
            for line in logs {
                if let Some(event) = instruction::parse_log_line(&line, &self.chain_id, slot, log_index as u64) {
                    let matches_kind = matches!(
                        (kind_filter, &event.kind),
                        (EventKindFilter::Lock, relayer_types::EventKind::Lock { .. })
                            | (EventKindFilter::Burn, relayer_types::EventKind::Burn { .. })
                    );
                    if matches_kind {
                        events.push(event);
                    }
                }
            }
        }
        events.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(events)
    }

    async fn submit(&self, call: relayer_types::ChainCall) -> Result<PendingTxId, GatewayError> {
        use relayer_types::ChainCall;
        match call {
            ChainCall::Mint {
                amount,
                source_chain_id,
                source_nonce,
                auth,
                ..
            } => {
                let data = instruction::encode_mint_or_unlock(Discriminant::Mint, amount, &source_chain_id, source_nonce, &auth)?;
                self.submit_instruction_data(data).await
            }
            ChainCall::Unlock {
                amount,
                source_chain_id,
                source_nonce,
                auth,
                ..
            } => {
                let data = instruction::encode_mint_or_unlock(Discriminant::Unlock, amount, &source_chain_id, source_nonce, &auth)?;
                self.submit_instruction_data(data).await
            }
            ChainCall::MintAndSwap { .. } => Err(GatewayError::InvalidArgument(
                "MintAndSwap is not supported on Solana destinations in this relayer".into(),
            )),
        }
    }

    async fn await_inclusion(&self, tx_id: &PendingTxId) -> Result<TxReceipt, GatewayError> {
        let signature = solana_signature::Signature::from_str(&tx_id.0)
            .map_err(|_| GatewayError::InvalidArgument(format!("malformed signature: {}", tx_id.0)))?;
        let deadline = tokio::time::Instant::now() + self.receipt_timeout;
        loop {
            let statuses = self
                .rpc
                .get_signature_statuses(&[signature])
                .await
                .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;
            if let Some(Some(status)) = statuses.value.first() {
                if status.satisfies_commitment(self.commitment) {
                    let tx_status = if status.err.is_some() {
                        TxStatus::Reverted
                    } else {
                        TxStatus::Confirmed
                    };
                    return Ok(TxReceipt {
                        tx_id: tx_id.clone(),
                        status: tx_status,
                        block_number: status.slot,
                        revert_reason: status.err.as_ref().map(|e| e.to_string()),
                    });
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(GatewayError::DeadlineExceeded(self.receipt_timeout));
            }
            debug!(tx_id = %tx_id, "signature not yet at required commitment, polling again");
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    async fn is_processed(&self, source_chain_id: &ChainId, nonce: u64) -> Result<bool, GatewayError> {
        let pda = self.processed_marker_pda(source_chain_id, nonce);
        match self.rpc.get_account(&pda).await {
            Ok(_) => Ok(true),
            Err(e) if e.to_string().contains("AccountNotFound") => Ok(false),
            Err(e) => Err(GatewayError::TransientNetwork(e.to_string())),
        }
    }

    async fn quote(&self, _target_token: &TargetTokenId, _amount: alloy_primitives::U256) -> Result<QuoteAmount, GatewayError> {
        Err(GatewayError::InvalidArgument(
            "swap quoting is not supported on Solana destinations in this relayer".into(),
        ))
    }
}
