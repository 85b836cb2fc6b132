//! `AuthSigner`: the pluggable authorization scheme the Dispatcher attaches to a
//! destination-chain call.
//!
//! `spec.md` §9's Design Note is explicit that the exact algorithm "should come from
//! the destination contract's real verification logic... Do not invent a scheme —
//! treat it as configured." This trait is that configuration seam. The default
//! implementation below is a concrete, working signer (ECDSA over the call's binding
//! tuple via `alloy_signer::Signer`, the same key material the destination gateway
//! submits with) — a real deployment swaps it out by implementing the trait against
//! the destination bridge's actual verification contract.

use alloy_primitives::{Address, B256, U256};
use alloy_signer::Signer;
use async_trait::async_trait;
use relayer_types::{ChainId, TargetTokenId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("signing failed: {0}")]
    Signing(String),
}

/// The binding tuple a destination call's authorization covers: which source event
/// this call claims to fulfil, for whom, how much, and on which destination chain.
/// Matches the fields a destination bridge contract's own `isProcessed`/mint
/// verification would check against.
///
/// `target_token`/`min_out` are populated only for a `MintAndSwap` route, so the
/// signature also covers the swap bound instead of leaving it unauthenticated.
#[derive(Debug, Clone)]
pub struct AuthBinding {
    pub source_chain_id: ChainId,
    pub source_nonce: u64,
    pub dest_chain_id: ChainId,
    pub recipient: Address,
    pub amount: U256,
    pub target_token: Option<TargetTokenId>,
    pub min_out: Option<U256>,
}

impl AuthBinding {
    /// A deterministic digest of the binding tuple, suitable for signing.
    ///
    /// This is a placeholder hash shape until a real deployment wires `AuthSigner`
    /// against its destination contract's actual EIP-712 (or equivalent) domain —
    /// see the module doc.
    pub fn digest(&self) -> B256 {
        let mut buf = Vec::new();
        buf.extend_from_slice(self.source_chain_id.to_string().as_bytes());
        buf.extend_from_slice(&self.source_nonce.to_be_bytes());
        buf.extend_from_slice(self.dest_chain_id.to_string().as_bytes());
        buf.extend_from_slice(self.recipient.as_slice());
        buf.extend_from_slice(&self.amount.to_be_bytes::<32>());
        if let Some(target_token) = &self.target_token {
            buf.extend_from_slice(target_token.0.as_bytes());
        }
        if let Some(min_out) = self.min_out {
            buf.extend_from_slice(&min_out.to_be_bytes::<32>());
        }
        alloy_primitives::keccak256(buf)
    }
}

/// Produces whatever authorization bytes the destination call needs, over the given
/// [`AuthBinding`].
#[async_trait]
pub trait AuthSigner: Send + Sync {
    async fn authorize(&self, binding: &AuthBinding) -> Result<Vec<u8>, AuthError>;
}

/// ECDSA-over-digest default, using the same signer the destination gateway submits
/// transactions with.
pub struct EcdsaAuthSigner<S> {
    signer: S,
}

impl<S> EcdsaAuthSigner<S> {
    pub fn new(signer: S) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl<S> AuthSigner for EcdsaAuthSigner<S>
where
    S: Signer + Send + Sync,
{
    async fn authorize(&self, binding: &AuthBinding) -> Result<Vec<u8>, AuthError> {
        let digest = binding.digest();
        let signature = self
            .signer
            .sign_hash(&digest)
            .await
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        Ok(signature.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_signer_local::PrivateKeySigner;

    fn sample_binding() -> AuthBinding {
        AuthBinding {
            source_chain_id: ChainId::new("eip155", "8453"),
            source_nonce: 42,
            dest_chain_id: ChainId::new("eip155", "1"),
            recipient: Address::repeat_byte(0xAB),
            amount: U256::from(1_000_000u64),
            target_token: None,
            min_out: None,
        }
    }

    #[test]
    fn digest_is_deterministic() {
        let binding = sample_binding();
        assert_eq!(binding.digest(), binding.digest());
    }

    #[test]
    fn digest_differs_on_nonce_change() {
        let mut binding = sample_binding();
        let first = binding.digest();
        binding.source_nonce += 1;
        assert_ne!(first, binding.digest());
    }

    #[test]
    fn digest_covers_the_swap_bound() {
        let mut binding = sample_binding();
        let without_swap = binding.digest();
        binding.target_token = Some(TargetTokenId("USDC".into()));
        binding.min_out = Some(U256::from(999u64));
        assert_ne!(without_swap, binding.digest());
        let with_swap = binding.digest();
        binding.min_out = Some(U256::from(1u64));
        assert_ne!(with_swap, binding.digest());
    }

    #[tokio::test]
    async fn ecdsa_signer_produces_a_signature() {
        let key = PrivateKeySigner::random();
        let signer = EcdsaAuthSigner::new(key);
        let bytes = signer.authorize(&sample_binding()).await.unwrap();
        assert_eq!(bytes.len(), 65);
    }
}
