//! Boot sequence and periodic duties (`spec.md` §4.8), grounded on
//! `facilitator/src/run.rs`'s shape: load config -> open providers -> open state ->
//! start workers -> install signal handlers.

use crate::config::{ChainConfig, Config, DirectionEntry};
use crate::sig_down::SigDown;
use alloy_signer_local::PrivateKeySigner;
use relayer_chain_evm::EvmChainGateway;
use relayer_chain_solana::SolanaChainGateway;
use relayer_core::auth::{AuthSigner, EcdsaAuthSigner};
use relayer_core::event_source::FinalityPolicy;
use relayer_core::pipeline::{spawn_direction, DirectionConfig};
use relayer_store::{MemoryStateStore, SledStateStore, StateStore};
use relayer_types::{ChainGateway, ChainId, RetryPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("failed to build gateway for {0}: {1}")]
    Gateway(ChainId, relayer_types::GatewayError),
    #[error("direction names unknown chain id: {0}")]
    UnknownChain(ChainId),
    #[error("failed to open state store at {0}: {1}")]
    StateStore(String, relayer_store::StoreError),
    #[error("failed to install signal handlers: {0}")]
    Signal(#[from] std::io::Error),
    #[error("invalid auth signer key: {0}")]
    AuthSignerKey(String),
}

/// Builds every configured `ChainGateway`, keyed by its chain id, boxed as a trait
/// object so directions pairing an EVM source with a Solana destination (or vice
/// versa) share the same pipeline wiring.
async fn build_gateways(
    config: &Config,
) -> Result<HashMap<ChainId, Arc<dyn ChainGateway>>, SupervisorError> {
    let mut gateways: HashMap<ChainId, Arc<dyn ChainGateway>> = HashMap::new();
    for chain_config in config.chains.iter() {
        let chain_id = chain_config.chain_id().clone();
        let gateway: Arc<dyn ChainGateway> = match chain_config {
            ChainConfig::Evm(evm_config) => {
                let gateway = EvmChainGateway::from_config(evm_config)
                    .await
                    .map_err(|e| SupervisorError::Gateway(chain_id.clone(), e))?;
                Arc::new(gateway)
            }
            ChainConfig::Solana(solana_config) => {
                let gateway = SolanaChainGateway::from_config(solana_config)
                    .map_err(|e| SupervisorError::Gateway(chain_id.clone(), e))?;
                Arc::new(gateway)
            }
        };
        gateways.insert(chain_id, gateway);
    }
    Ok(gateways)
}

/// Resolves every `Submitted` record left over from a prior process exit by asking
/// the record's destination chain whether the call actually landed (`spec.md` §7
/// `ShutdownInterrupt`): `Done` if it did, `reclaim`ed back to `Dispatching` for the
/// worker pool to retry if it didn't.
async fn reconcile_on_boot(
    store: &Arc<dyn StateStore>,
    gateways: &HashMap<ChainId, Arc<dyn ChainGateway>>,
    directions: &[DirectionEntry],
) -> Result<(), SupervisorError> {
    let submitted = store
        .submitted_records()
        .await
        .map_err(|e| SupervisorError::StateStore("submitted_records".into(), e))?;
    if submitted.is_empty() {
        return Ok(());
    }
    info!(count = submitted.len(), "reconciling submitted records left over from a prior run");

    let mut dest_for_source: HashMap<ChainId, ChainId> = HashMap::new();
    for direction in directions {
        dest_for_source
            .entry(direction.source.clone())
            .or_insert_with(|| direction.dest.clone());
    }

    for record in submitted {
        let Some(dest_chain_id) = dest_for_source.get(&record.source_chain_id) else {
            warn!(
                source_chain_id = %record.source_chain_id,
                nonce = record.nonce,
                "submitted record's source chain names no configured direction, leaving as-is"
            );
            continue;
        };
        let Some(dest) = gateways.get(dest_chain_id) else {
            warn!(
                source_chain_id = %record.source_chain_id,
                nonce = record.nonce,
                dest_chain_id = %dest_chain_id,
                "submitted record's destination chain has no configured gateway, leaving as-is"
            );
            continue;
        };
        let landed = dest
            .is_processed(&record.source_chain_id, record.nonce)
            .await
            .map_err(|e| SupervisorError::Gateway(dest_chain_id.clone(), e))?;
        if landed {
            store
                .mark_done(&record.source_chain_id, record.nonce)
                .await
                .map_err(|e| SupervisorError::StateStore("mark_done".into(), e))?;
            info!(source_chain_id = %record.source_chain_id, nonce = record.nonce, "reconciled as already landed");
        } else {
            store
                .reclaim(&record.source_chain_id, record.nonce)
                .await
                .map_err(|e| SupervisorError::StateStore("reclaim".into(), e))?;
            info!(source_chain_id = %record.source_chain_id, nonce = record.nonce, "reconciled as not landed, reclaimed for retry");
        }
    }
    Ok(())
}

fn open_state_store(config: &Config) -> Result<Arc<dyn StateStore>, SupervisorError> {
    match &config.state_store_path {
        Some(path) => {
            let store = SledStateStore::open(path)
                .map_err(|e| SupervisorError::StateStore(path.clone(), e))?;
            info!(%path, "opened durable state store");
            Ok(Arc::new(store))
        }
        None => {
            info!("no stateStorePath configured, using in-memory state store");
            Ok(Arc::new(MemoryStateStore::new()))
        }
    }
}

/// Runs the relayer until a shutdown signal arrives, then waits up to
/// `shutdown_grace_ms` for in-flight work to land.
pub async fn run(config: Config) -> Result<(), SupervisorError> {
    let gateways = build_gateways(&config).await?;
    let store = open_state_store(&config)?;
    reconcile_on_boot(&store, &gateways, &config.directions).await?;

    let auth_key = PrivateKeySigner::from_bytes(&config.auth_signer_key.inner().0)
        .map_err(|e| SupervisorError::AuthSignerKey(e.to_string()))?;
    let auth_signer: Arc<dyn AuthSigner> = Arc::new(EcdsaAuthSigner::new(auth_key));

    let sig_down = SigDown::try_new()?;
    let shutdown = sig_down.cancellation_token();
    let tracker = TaskTracker::new();

    for direction in &config.directions {
        let source = gateways
            .get(&direction.source)
            .cloned()
            .ok_or_else(|| SupervisorError::UnknownChain(direction.source.clone()))?;
        let dest = gateways
            .get(&direction.dest)
            .cloned()
            .ok_or_else(|| SupervisorError::UnknownChain(direction.dest.clone()))?;

        let direction_config = DirectionConfig {
            event_kind: direction.event_kind,
            finality: FinalityPolicy {
                required_confirmations: direction.required_confirmations,
            },
            poll_interval: Duration::from_secs(direction.poll_interval_secs),
            max_block_range: direction.max_block_range,
            worker_pool_size: direction.worker_pool_size,
            slippage_bps: direction.slippage_bps,
            retry_policy: RetryPolicy::default(),
            channel_capacity: 256,
        };

        info!(
            source = %direction.source,
            dest = %direction.dest,
            kind = ?direction.event_kind,
            "starting direction"
        );
        spawn_direction(
            source,
            dest,
            auth_signer.clone(),
            store.clone(),
            direction_config,
            &tracker,
            shutdown.clone(),
        );
    }

    tracker.close();
    spawn_periodic_duties(store.clone(), shutdown.clone());

    sig_down.recv().await;
    info!("shutdown signal received, waiting for in-flight work");

    let grace = Duration::from_millis(config.shutdown_grace_ms);
    if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
        error!(grace_ms = config.shutdown_grace_ms, "shutdown grace period elapsed with tasks still running");
    }

    Ok(())
}

/// Hourly state-store cleanup and a five-minute stats snapshot, per `spec.md` §4.8.
fn spawn_periodic_duties(store: Arc<dyn StateStore>, shutdown: tokio_util::sync::CancellationToken) {
    tokio::spawn(async move {
        let mut cleanup_interval = tokio::time::interval(Duration::from_secs(3600));
        let mut stats_interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = cleanup_interval.tick() => {
                    match store.cleanup(7 * 24 * 3600).await {
                        Ok(removed) => info!(removed, "periodic state-store cleanup"),
                        Err(e) => error!(error = %e, "state-store cleanup failed"),
                    }
                }
                _ = stats_interval.tick() => {
                    match store.stats().await {
                        Ok(stats) => info!(?stats, "state-store stats snapshot"),
                        Err(e) => error!(error = %e, "failed to read state-store stats"),
                    }
                }
            }
        }
    });
}
