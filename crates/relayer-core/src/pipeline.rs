//! Per-direction wiring: one [`crate::event_source::EventSource`] feeding a fixed pool
//! of workers that run Dedup-check -> Dispatch -> Action Executor -> mark done/failed,
//! per `spec.md` §5.

use crate::auth::AuthSigner;
use crate::dispatcher::Dispatcher;
use crate::event_source::{EventSource, FinalityPolicy};
use crate::executor::{ActionExecutor, ExecutionOutcome};
use relayer_store::{ClaimOutcome, StateStore};
use relayer_types::{BridgeEvent, ChainGateway, EventKindFilter, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Configuration for one A->B (or B->A) pipeline direction.
pub struct DirectionConfig {
    pub event_kind: EventKindFilter,
    pub finality: FinalityPolicy,
    pub poll_interval: Duration,
    pub max_block_range: u64,
    pub worker_pool_size: usize,
    pub slippage_bps: u16,
    pub retry_policy: RetryPolicy,
    pub channel_capacity: usize,
}

impl Default for DirectionConfig {
    fn default() -> Self {
        Self {
            event_kind: EventKindFilter::Lock,
            finality: FinalityPolicy::EVM_MAINNET,
            poll_interval: Duration::from_secs(15),
            max_block_range: 500,
            worker_pool_size: 4,
            slippage_bps: 100,
            retry_policy: RetryPolicy::default(),
            channel_capacity: 256,
        }
    }
}

/// Spawns the Event Source task and `worker_pool_size` worker tasks for one
/// direction, registering them all with `tracker` so the Supervisor can wait for a
/// clean shutdown.
pub fn spawn_direction<S, D>(
    source_gateway: Arc<S>,
    dest_gateway: Arc<D>,
    auth_signer: Arc<dyn AuthSigner>,
    store: Arc<dyn StateStore>,
    config: DirectionConfig,
    tracker: &TaskTracker,
    shutdown: CancellationToken,
) where
    S: ChainGateway + ?Sized + 'static,
    D: ChainGateway + ?Sized + 'static,
{
    let (tx, rx) = mpsc::channel::<BridgeEvent>(config.channel_capacity);

    let source = EventSource::new(
        source_gateway,
        config.event_kind,
        config.finality,
        config.poll_interval,
        config.max_block_range,
        store.clone(),
    );
    let source_shutdown = shutdown.clone();
    tracker.spawn(async move {
        source.run(tx, source_shutdown).await;
    });

    let dispatcher = Arc::new(Dispatcher::new(dest_gateway.clone(), auth_signer, config.slippage_bps));
    let rx = Arc::new(tokio::sync::Mutex::new(rx));

    for worker_id in 0..config.worker_pool_size.max(1) {
        let rx = rx.clone();
        let dispatcher = dispatcher.clone();
        let dest_gateway = dest_gateway.clone();
        let store = store.clone();
        let retry_policy = config.retry_policy;
        let shutdown = shutdown.clone();
        tracker.spawn(async move {
            worker_loop(worker_id, rx, dispatcher, dest_gateway, store, retry_policy, shutdown).await;
        });
    }
}

async fn worker_loop<D: ChainGateway + ?Sized>(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<BridgeEvent>>>,
    dispatcher: Arc<Dispatcher<D>>,
    dest_gateway: Arc<D>,
    store: Arc<dyn StateStore>,
    retry_policy: RetryPolicy,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => {
                info!(worker_id, "worker shutting down");
                return;
            }
            event = async {
                let mut rx = rx.lock().await;
                rx.recv().await
            } => match event {
                Some(event) => event,
                None => {
                    info!(worker_id, "channel closed, worker exiting");
                    return;
                }
            },
        };

        if let Err(e) = process_event(&event, &dispatcher, dest_gateway.as_ref(), store.as_ref(), retry_policy).await {
            error!(
                kind = ?event.kind,
                nonce = event.nonce,
                error = %e,
                "event processing failed"
            );
        }
    }
}

async fn process_event<D: ChainGateway + ?Sized>(
    event: &BridgeEvent,
    dispatcher: &Dispatcher<D>,
    dest_gateway: &D,
    store: &dyn StateStore,
    retry_policy: RetryPolicy,
) -> Result<(), relayer_types::RelayError> {
    let claim = store
        .begin_processing(&event.source_chain_id, event.nonce)
        .await
        .map_err(|e| relayer_types::RelayError::InvariantViolation(e.to_string()))?;

    match claim {
        ClaimOutcome::InFlight(_) | ClaimOutcome::AlreadyTerminal(_) => {
            return Ok(());
        }
        ClaimOutcome::Claimed(_) => {}
    }

    store
        .mark_dispatching(&event.source_chain_id, event.nonce)
        .await
        .map_err(|e| relayer_types::RelayError::InvariantViolation(e.to_string()))?;

    let already_processed = dest_gateway
        .is_processed(&event.source_chain_id, event.nonce)
        .await
        .map_err(|e| relayer_types::RelayError::InvariantViolation(e.to_string()))?;
    if already_processed {
        store
            .mark_done(&event.source_chain_id, event.nonce)
            .await
            .map_err(|e| relayer_types::RelayError::InvariantViolation(e.to_string()))?;
        info!(nonce = event.nonce, decision = "already_processed", "destination already processed nonce before dispatch");
        return Ok(());
    }

    let call = dispatcher.route(event).await?;
    let executor = ActionExecutor::new(dest_gateway, retry_policy);

    match executor.execute(call).await {
        Ok(ExecutionOutcome::Confirmed(receipt)) => {
            store
                .mark_submitted(&event.source_chain_id, event.nonce, receipt.tx_id.clone())
                .await
                .map_err(|e| relayer_types::RelayError::InvariantViolation(e.to_string()))?;
            store
                .mark_done(&event.source_chain_id, event.nonce)
                .await
                .map_err(|e| relayer_types::RelayError::InvariantViolation(e.to_string()))?;
            info!(nonce = event.nonce, dest_tx_id = %receipt.tx_id, decision = "done", "event processed");
            Ok(())
        }
        Ok(ExecutionOutcome::AlreadyProcessed) => {
            store
                .mark_done(&event.source_chain_id, event.nonce)
                .await
                .map_err(|e| relayer_types::RelayError::InvariantViolation(e.to_string()))?;
            info!(nonce = event.nonce, decision = "already_processed", "event already processed on destination");
            Ok(())
        }
        Ok(ExecutionOutcome::SwapProtectionTriggered(reason)) => {
            store
                .mark_failed(&event.source_chain_id, event.nonce, reason.clone())
                .await
                .map_err(|e| relayer_types::RelayError::InvariantViolation(e.to_string()))?;
            warn!(nonce = event.nonce, reason, decision = "failed", "swap protection triggered");
            Err(relayer_types::RelayError::SwapProtectionTriggered(reason))
        }
        Err(err) => {
            store
                .mark_failed(&event.source_chain_id, event.nonce, err.to_string())
                .await
                .map_err(|e| relayer_types::RelayError::InvariantViolation(e.to_string()))?;
            error!(nonce = event.nonce, reason = %err, decision = "failed", "action executor failed permanently");
            Err(err)
        }
    }
}
