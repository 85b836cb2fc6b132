//! Action Executor (`spec.md` §4.6): retries a destination-chain submission according
//! to a [`RetryPolicy`], classifying terminal outcomes against the special revert
//! reasons `spec.md` §4.6/§7 name.

use relayer_types::{ChainCall, ChainGateway, GatewayError, RelayError, RetryPolicy, TxReceipt, TxStatus};
use tracing::{info, warn};

/// Revert reason strings with dedicated handling, per `spec.md` §4.6/§7. Matched
/// verbatim against `GatewayError::Revert { reason }` / `TxReceipt::revert_reason`.
mod revert_reasons {
    pub const ALREADY_PROCESSED: &str = "Already processed";
    pub const SLIPPAGE: &str = "Amount out below minimum";
}

/// What happened to a submitted call, after retrying and classifying.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// The call landed and the destination chain confirmed it.
    Confirmed(TxReceipt),
    /// The destination bridge already recorded this nonce as processed — not a
    /// failure; the caller should mark the record `Done`.
    AlreadyProcessed,
    /// The swap's `minOut` bound was violated on-chain.
    SwapProtectionTriggered(String),
}

/// Retries [`ChainGateway::submit`] + [`ChainGateway::await_inclusion`] according to
/// `policy`, applying the special-case classification of `spec.md` §4.6 before giving
/// up.
pub struct ActionExecutor<'g, G: ChainGateway + ?Sized> {
    gateway: &'g G,
    policy: RetryPolicy,
}

impl<'g, G: ChainGateway + ?Sized> ActionExecutor<'g, G> {
    pub fn new(gateway: &'g G, policy: RetryPolicy) -> Self {
        Self { gateway, policy }
    }

    /// Submit `call`, retrying transient failures up to `policy.max_attempts`.
    pub async fn execute(&self, call: ChainCall) -> Result<ExecutionOutcome, RelayError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_once(&call).await {
                Ok(outcome) => return Ok(outcome),
                Err(ClassifiedError::Terminal(relay_err)) => return Err(relay_err),
                Err(ClassifiedError::Transient(gateway_err)) => {
                    if self.policy.is_exhausted(attempt) {
                        warn!(
                            nonce = call.source_nonce(),
                            attempt,
                            error = %gateway_err,
                            "retries exhausted"
                        );
                        return Err(RelayError::RetriesExhausted(gateway_err));
                    }
                    let delay = self.policy.delay_for(attempt);
                    info!(
                        nonce = call.source_nonce(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %gateway_err,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_once(&self, call: &ChainCall) -> Result<ExecutionOutcome, ClassifiedError> {
        let tx_id = self
            .gateway
            .submit(call.clone())
            .await
            .map_err(Self::classify)?;
        let receipt = self
            .gateway
            .await_inclusion(&tx_id)
            .await
            .map_err(Self::classify)?;
        match receipt.status {
            TxStatus::Confirmed => Ok(ExecutionOutcome::Confirmed(receipt)),
            TxStatus::Reverted => Self::classify_revert(receipt.revert_reason.as_deref()),
        }
    }

    fn classify_revert(reason: Option<&str>) -> Result<ExecutionOutcome, ClassifiedError> {
        match reason {
            Some(revert_reasons::ALREADY_PROCESSED) => Ok(ExecutionOutcome::AlreadyProcessed),
            Some(revert_reasons::SLIPPAGE) => Ok(ExecutionOutcome::SwapProtectionTriggered(
                revert_reasons::SLIPPAGE.to_string(),
            )),
            Some(other) => Err(ClassifiedError::Terminal(RelayError::InvariantViolation(
                format!("unhandled revert reason: {other}"),
            ))),
            None => Err(ClassifiedError::Terminal(RelayError::InvariantViolation(
                "transaction reverted with no reason".into(),
            ))),
        }
    }

    fn classify(err: GatewayError) -> ClassifiedError {
        if let Some(reason) = err.revert_reason() {
            match Self::classify_revert(Some(reason)) {
                Ok(ExecutionOutcome::AlreadyProcessed) => {
                    return ClassifiedError::Terminal(RelayError::AlreadyProcessed);
                }
                Ok(ExecutionOutcome::SwapProtectionTriggered(reason)) => {
                    return ClassifiedError::Terminal(RelayError::SwapProtectionTriggered(reason));
                }
                _ => {}
            }
        }
        if err.is_transient() {
            ClassifiedError::Transient(err)
        } else {
            ClassifiedError::Terminal(RelayError::InvariantViolation(err.to_string()))
        }
    }
}

enum ClassifiedError {
    Transient(GatewayError),
    Terminal(RelayError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relayer_types::{
        BridgeEvent, ChainId, EventKindFilter, PendingTxId, QuoteAmount, TargetTokenId,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// A fake gateway whose `submit`/`await_inclusion` behavior is scripted per test.
    struct FakeGateway {
        chain_id: ChainId,
        submit_calls: AtomicU32,
        script: Mutex<Vec<Result<TxReceipt, GatewayError>>>,
    }

    impl FakeGateway {
        fn new(script: Vec<Result<TxReceipt, GatewayError>>) -> Self {
            Self {
                chain_id: ChainId::new("eip155", "1"),
                submit_calls: AtomicU32::new(0),
                script: Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl ChainGateway for FakeGateway {
        fn chain_id(&self) -> &ChainId {
            &self.chain_id
        }

        async fn current_height(&self) -> Result<u64, GatewayError> {
            Ok(0)
        }

        async fn query_events(
            &self,
            _kind_filter: EventKindFilter,
            _from_block: u64,
            _to_block: u64,
        ) -> Result<Vec<BridgeEvent>, GatewayError> {
            Ok(vec![])
        }

        async fn submit(&self, _call: ChainCall) -> Result<PendingTxId, GatewayError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            Ok(PendingTxId("0xtx".into()))
        }

        async fn await_inclusion(&self, _tx_id: &PendingTxId) -> Result<TxReceipt, GatewayError> {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                panic!("script exhausted");
            }
            script.remove(0)
        }

        async fn is_processed(&self, _source_chain_id: &ChainId, _nonce: u64) -> Result<bool, GatewayError> {
            Ok(false)
        }

        async fn quote(&self, _target_token: &TargetTokenId, _amount: alloy_primitives::U256) -> Result<QuoteAmount, GatewayError> {
            Ok(QuoteAmount { expected_out: alloy_primitives::U256::ZERO })
        }
    }

    fn sample_call() -> ChainCall {
        ChainCall::Mint {
            recipient: "0xabc".into(),
            amount: alloy_primitives::U256::from(1u64),
            source_chain_id: ChainId::new("eip155", "8453"),
            source_nonce: 1,
            auth: vec![],
        }
    }

    fn confirmed_receipt() -> TxReceipt {
        TxReceipt {
            tx_id: PendingTxId("0xtx".into()),
            status: TxStatus::Confirmed,
            block_number: 10,
            revert_reason: None,
        }
    }

    #[tokio::test]
    async fn succeeds_on_first_try() {
        let gateway = FakeGateway::new(vec![Ok(confirmed_receipt())]);
        let executor = ActionExecutor::new(&gateway, RetryPolicy::new(Duration::from_millis(1), 3, false));
        let outcome = executor.execute(sample_call()).await.unwrap();
        assert!(matches!(outcome, ExecutionOutcome::Confirmed(_)));
        assert_eq!(gateway.submit_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_error_then_succeeds() {
        let gateway = FakeGateway::new(vec![
            Err(GatewayError::TransientNetwork("timeout".into())),
            Ok(confirmed_receipt()),
        ]);
        let executor = ActionExecutor::new(&gateway, RetryPolicy::new(Duration::from_millis(1), 3, false));
        let outcome = executor.execute(sample_call()).await.unwrap();
        assert!(matches!(outcome, ExecutionOutcome::Confirmed(_)));
        assert_eq!(gateway.submit_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausts_retries_and_surfaces_error() {
        let gateway = FakeGateway::new(vec![
            Err(GatewayError::TransientNetwork("e1".into())),
            Err(GatewayError::TransientNetwork("e2".into())),
            Err(GatewayError::TransientNetwork("e3".into())),
        ]);
        let executor = ActionExecutor::new(&gateway, RetryPolicy::new(Duration::from_millis(1), 3, false));
        let result = executor.execute(sample_call()).await;
        assert!(matches!(result, Err(RelayError::RetriesExhausted(_))));
    }

    #[tokio::test]
    async fn already_processed_revert_is_not_a_failure() {
        let receipt = TxReceipt {
            revert_reason: Some("Already processed".into()),
            status: TxStatus::Reverted,
            ..confirmed_receipt()
        };
        let gateway = FakeGateway::new(vec![Ok(receipt)]);
        let executor = ActionExecutor::new(&gateway, RetryPolicy::new(Duration::from_millis(1), 3, false));
        let outcome = executor.execute(sample_call()).await.unwrap();
        assert!(matches!(outcome, ExecutionOutcome::AlreadyProcessed));
    }

    #[tokio::test]
    async fn slippage_revert_triggers_swap_protection_outcome() {
        let receipt = TxReceipt {
            revert_reason: Some("Amount out below minimum".into()),
            status: TxStatus::Reverted,
            ..confirmed_receipt()
        };
        let gateway = FakeGateway::new(vec![Ok(receipt)]);
        let executor = ActionExecutor::new(&gateway, RetryPolicy::new(Duration::from_millis(1), 3, false));
        let outcome = executor.execute(sample_call()).await.unwrap();
        assert!(matches!(outcome, ExecutionOutcome::SwapProtectionTriggered(_)));
    }

    #[tokio::test]
    async fn nonce_race_from_submit_is_retried() {
        struct RaceThenOk {
            inner: FakeGateway,
            submit_attempts: AtomicU32,
        }

        #[async_trait]
        impl ChainGateway for RaceThenOk {
            fn chain_id(&self) -> &ChainId {
                self.inner.chain_id()
            }
            async fn current_height(&self) -> Result<u64, GatewayError> {
                self.inner.current_height().await
            }
            async fn query_events(
                &self,
                k: EventKindFilter,
                f: u64,
                t: u64,
            ) -> Result<Vec<BridgeEvent>, GatewayError> {
                self.inner.query_events(k, f, t).await
            }
            async fn submit(&self, call: ChainCall) -> Result<PendingTxId, GatewayError> {
                let n = self.submit_attempts.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(GatewayError::NonceRace("nonce too low".into()))
                } else {
                    self.inner.submit(call).await
                }
            }
            async fn await_inclusion(&self, tx_id: &PendingTxId) -> Result<TxReceipt, GatewayError> {
                self.inner.await_inclusion(tx_id).await
            }
            async fn is_processed(&self, c: &ChainId, n: u64) -> Result<bool, GatewayError> {
                self.inner.is_processed(c, n).await
            }
            async fn quote(&self, t: &TargetTokenId, a: alloy_primitives::U256) -> Result<QuoteAmount, GatewayError> {
                self.inner.quote(t, a).await
            }
        }

        let gateway = RaceThenOk {
            inner: FakeGateway::new(vec![Ok(confirmed_receipt())]),
            submit_attempts: AtomicU32::new(0),
        };
        let executor = ActionExecutor::new(&gateway, RetryPolicy::new(Duration::from_millis(1), 3, false));
        let outcome = executor.execute(sample_call()).await.unwrap();
        assert!(matches!(outcome, ExecutionOutcome::Confirmed(_)));
    }
}
