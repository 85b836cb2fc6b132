//! Dispatcher (`spec.md` §4.5): routes a normalized `BridgeEvent` to the destination
//! `ChainCall` the routing table names, running the mint-and-swap sequencing (quote ->
//! Swap Protection -> build call) in the same pipeline step as submission.

use crate::auth::{AuthBinding, AuthSigner};
use crate::swap;
use relayer_types::{BridgeEvent, ChainGateway, EventKind, GatewayError, RelayError};
use std::sync::Arc;
use tracing::info;

/// Routes events to destination calls and attaches authorization, per the routing
/// table of `spec.md` §4.5:
///
/// - `Lock` with no `target_token` -> `Mint`
/// - `Lock` with a `target_token` -> quote, compute `minOut` (`spec.md` §4.7), -> `MintAndSwap`
/// - `Burn` -> `Unlock`
pub struct Dispatcher<G: ChainGateway + ?Sized> {
    dest_gateway: Arc<G>,
    auth_signer: Arc<dyn AuthSigner>,
    slippage_bps: u16,
}

impl<G: ChainGateway + ?Sized> Dispatcher<G> {
    pub fn new(dest_gateway: Arc<G>, auth_signer: Arc<dyn AuthSigner>, slippage_bps: u16) -> Self {
        Self {
            dest_gateway,
            auth_signer,
            slippage_bps,
        }
    }

    /// Builds the fully-authorized `ChainCall` for `event`, performing a fresh quote
    /// immediately before returning when the route is `MintAndSwap` (`spec.md` §4.7
    /// "Staleness": never cache a quote across calls).
    pub async fn route(&self, event: &BridgeEvent) -> Result<relayer_types::ChainCall, RelayError> {
        use relayer_types::ChainCall;

        let recipient = parse_recipient(&event.recipient)?;
        let mut binding = AuthBinding {
            source_chain_id: event.source_chain_id.clone(),
            source_nonce: event.nonce,
            dest_chain_id: self.dest_gateway.chain_id().clone(),
            recipient,
            amount: event.amount,
            target_token: None,
            min_out: None,
        };

        // Assemble every argument the call carries, including the swap bound for
        // `MintAndSwap`, before signing — the authorization must cover the full call,
        // not just the fields common to all three routes.
        let call_without_auth = match &event.kind {
            EventKind::Lock { target_token: None, .. } => CallShape::Mint,
            EventKind::Lock {
                target_token: Some(target_token),
                ..
            } => {
                let quote = self
                    .dest_gateway
                    .quote(target_token, event.amount)
                    .await
                    .map_err(Self::map_gateway_error)?;
                let min_out = swap::min_out(quote.expected_out, self.slippage_bps);
                info!(
                    nonce = event.nonce,
                    expected_out = %quote.expected_out,
                    min_out = %min_out,
                    "computed swap protection bound"
                );
                binding.target_token = Some(target_token.clone());
                binding.min_out = Some(min_out);
                CallShape::MintAndSwap { min_out }
            }
            EventKind::Burn { .. } => CallShape::Unlock,
        };

        let auth = self
            .auth_signer
            .authorize(&binding)
            .await
            .map_err(|e| RelayError::InvariantViolation(e.to_string()))?;

        let call = match call_without_auth {
            CallShape::Mint => ChainCall::Mint {
                recipient: event.recipient.clone(),
                amount: event.amount,
                source_chain_id: event.source_chain_id.clone(),
                source_nonce: event.nonce,
                auth,
            },
            CallShape::MintAndSwap { min_out } => ChainCall::MintAndSwap {
                recipient: event.recipient.clone(),
                amount: event.amount,
                min_out,
                source_chain_id: event.source_chain_id.clone(),
                source_nonce: event.nonce,
                auth,
            },
            CallShape::Unlock => ChainCall::Unlock {
                recipient: event.recipient.clone(),
                amount: event.amount,
                source_chain_id: event.source_chain_id.clone(),
                source_nonce: event.nonce,
                auth,
            },
        };
        Ok(call)
    }

    fn map_gateway_error(err: GatewayError) -> RelayError {
        RelayError::InvariantViolation(format!("quote failed: {err}"))
    }
}

/// The call variant to build, decided before the authorization is signed so the
/// `auth` field can be attached to an already-fully-assembled shape.
enum CallShape {
    Mint,
    MintAndSwap { min_out: alloy_primitives::U256 },
    Unlock,
}

fn parse_recipient(addr: &relayer_types::ChainAddress) -> Result<alloy_primitives::Address, RelayError> {
    addr.0
        .parse()
        .map_err(|_| RelayError::InvariantViolation(format!("malformed recipient address: {addr}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;
    use async_trait::async_trait;
    use relayer_types::{
        ChainAddress, ChainId, EventKindFilter, PendingTxId, QuoteAmount, TargetTokenId, TxReceipt,
    };

    struct NullAuthSigner;

    #[async_trait]
    impl AuthSigner for NullAuthSigner {
        async fn authorize(&self, _binding: &AuthBinding) -> Result<Vec<u8>, AuthError> {
            Ok(vec![0xAA])
        }
    }

    /// Records the last binding it was asked to sign, so tests can assert on what
    /// the dispatcher actually authorized.
    struct SpyAuthSigner {
        last_binding: std::sync::Mutex<Option<AuthBinding>>,
    }

    impl SpyAuthSigner {
        fn new() -> Self {
            Self { last_binding: std::sync::Mutex::new(None) }
        }
    }

    #[async_trait]
    impl AuthSigner for SpyAuthSigner {
        async fn authorize(&self, binding: &AuthBinding) -> Result<Vec<u8>, AuthError> {
            *self.last_binding.lock().unwrap() = Some(binding.clone());
            Ok(vec![0xAA])
        }
    }

    struct FakeDestGateway {
        chain_id: ChainId,
    }

    #[async_trait]
    impl ChainGateway for FakeDestGateway {
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
        async fn submit(&self, _call: relayer_types::ChainCall) -> Result<PendingTxId, GatewayError> {
            Ok(PendingTxId("0xtx".into()))
        }
        async fn await_inclusion(&self, _tx_id: &PendingTxId) -> Result<TxReceipt, GatewayError> {
            unimplemented!()
        }
        async fn is_processed(&self, _source_chain_id: &ChainId, _nonce: u64) -> Result<bool, GatewayError> {
            Ok(false)
        }
        async fn quote(&self, _target_token: &TargetTokenId, amount: alloy_primitives::U256) -> Result<QuoteAmount, GatewayError> {
            Ok(QuoteAmount { expected_out: amount })
        }
    }

    fn sample_event(kind: EventKind) -> BridgeEvent {
        BridgeEvent {
            source_chain_id: ChainId::new("eip155", "8453"),
            nonce: 1,
            kind,
            sender: ChainAddress("0x1111111111111111111111111111111111111111".into()),
            recipient: ChainAddress("0x2222222222222222222222222222222222222222".into()),
            amount: alloy_primitives::U256::from(1_000u64),
            block_number: 100,
            log_index: 0,
        }
    }

    #[tokio::test]
    async fn lock_without_target_token_routes_to_mint() {
        let dest = Arc::new(FakeDestGateway { chain_id: ChainId::new("eip155", "1") });
        let dispatcher = Dispatcher::new(dest, Arc::new(NullAuthSigner), 100);
        let event = sample_event(EventKind::Lock {
            target_token: None,
            target_chain: ChainId::new("eip155", "1"),
        });
        let call = dispatcher.route(&event).await.unwrap();
        assert!(matches!(call, relayer_types::ChainCall::Mint { .. }));
    }

    #[tokio::test]
    async fn burn_routes_to_unlock() {
        let dest = Arc::new(FakeDestGateway { chain_id: ChainId::new("eip155", "1") });
        let dispatcher = Dispatcher::new(dest, Arc::new(NullAuthSigner), 100);
        let event = sample_event(EventKind::Burn {
            target_chain: ChainId::new("eip155", "1"),
        });
        let call = dispatcher.route(&event).await.unwrap();
        assert!(matches!(call, relayer_types::ChainCall::Unlock { .. }));
    }

    #[tokio::test]
    async fn lock_with_target_token_routes_to_mint_and_swap_with_bounded_min_out() {
        let dest = Arc::new(FakeDestGateway { chain_id: ChainId::new("eip155", "1") });
        let dispatcher = Dispatcher::new(dest, Arc::new(NullAuthSigner), 100);
        let event = sample_event(EventKind::Lock {
            target_token: Some(TargetTokenId("USDC".into())),
            target_chain: ChainId::new("eip155", "1"),
        });
        let call = dispatcher.route(&event).await.unwrap();
        match call {
            relayer_types::ChainCall::MintAndSwap { min_out, amount, .. } => {
                assert!(min_out < amount || min_out == amount);
                assert_eq!(min_out, swap::min_out(amount, 100));
            }
            other => panic!("expected MintAndSwap, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mint_and_swap_binds_auth_to_target_token_and_min_out() {
        let dest = Arc::new(FakeDestGateway { chain_id: ChainId::new("eip155", "1") });
        let signer = Arc::new(SpyAuthSigner::new());
        let dispatcher = Dispatcher::new(dest, signer.clone(), 100);
        let event = sample_event(EventKind::Lock {
            target_token: Some(TargetTokenId("USDC".into())),
            target_chain: ChainId::new("eip155", "1"),
        });
        dispatcher.route(&event).await.unwrap();
        let binding = signer.last_binding.lock().unwrap().clone().unwrap();
        assert_eq!(binding.target_token, Some(TargetTokenId("USDC".into())));
        assert_eq!(binding.min_out, Some(swap::min_out(event.amount, 100)));
    }

    #[tokio::test]
    async fn mint_does_not_bind_a_swap_bound() {
        let dest = Arc::new(FakeDestGateway { chain_id: ChainId::new("eip155", "1") });
        let signer = Arc::new(SpyAuthSigner::new());
        let dispatcher = Dispatcher::new(dest, signer.clone(), 100);
        let event = sample_event(EventKind::Lock {
            target_token: None,
            target_chain: ChainId::new("eip155", "1"),
        });
        dispatcher.route(&event).await.unwrap();
        let binding = signer.last_binding.lock().unwrap().clone().unwrap();
        assert!(binding.target_token.is_none());
        assert!(binding.min_out.is_none());
    }
}
