//! The relayer-wide error taxonomy (`spec.md` §7).
//!
//! Two layers: [`GatewayError`] is what a [`crate::gateway::ChainGateway`]
//! implementation returns from a single RPC-bound call, and [`RelayError`] is what
//! the pipeline (Event Source, Dispatcher, Action Executor) surfaces once it has
//! classified a `GatewayError` against the policy table in `spec.md` §7.

use thiserror::Error;

/// Errors a [`crate::gateway::ChainGateway`] call can fail with.
///
/// Every variant maps to one row of `spec.md` §7's taxonomy. Classification lives on
/// this type (`is_transient`) so the Action Executor's retry loop never has to pattern
/// match on error text itself.
#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    /// RPC timeout, DNS failure, 5xx, connection reset. Retried with backoff.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// Destination-side "nonce too low" / "already known" during submission.
    /// The gateway resynchronizes and retries once internally; this variant is only
    /// surfaced if that one retry also fails.
    #[error("nonce race: {0}")]
    NonceRace(String),

    /// A revert or simulation failure with a stable, named reason (e.g.
    /// `"Already processed"`, `"Amount out below minimum"`). Never retried blindly —
    /// the reason string is inspected by the Action Executor for the special cases
    /// `spec.md` §4.6 and §7 call out.
    #[error("transaction reverted: {reason}")]
    Revert { reason: String },

    /// Malformed call arguments, bad signature, or another error the chain itself
    /// will never accept no matter how many times it is retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A deadline passed waiting on a suspension point (`spec.md` §5).
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),
}

impl GatewayError {
    /// Whether the Action Executor's retry loop should retry this error.
    ///
    /// `NonceRace` is transient at this layer too: the gateway already tried one
    /// resync-and-resubmit internally (`spec.md` §4.1); if it still surfaced, one more
    /// attempt from a fresh nonce read is still worth it before giving up.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::TransientNetwork(_) | GatewayError::NonceRace(_)
        )
    }

    /// The bare revert reason string, if this is a `Revert`.
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            GatewayError::Revert { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Pipeline-level errors, after a [`GatewayError`] (or a local validation failure) has
/// been classified against a `ProcessingRecord`.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Retries exhausted on an otherwise-transient error.
    #[error("retries exhausted: {0}")]
    RetriesExhausted(GatewayError),

    /// The destination bridge reports the nonce already went through. Not a failure —
    /// the caller should mark the record `Done`.
    #[error("nonce already processed on-chain")]
    AlreadyProcessed,

    /// `minOut` was not met, or the receipt carried a `SwapFailed` outcome event.
    /// Marked `Failed`, never retried automatically; an operator may re-queue after
    /// adjusting slippage tolerance.
    #[error("swap protection triggered: {0}")]
    SwapProtectionTriggered(String),

    /// Event schema didn't parse, amount <= 0, or address malformed. A bug or
    /// chain-side tampering, not a transient condition — never retried.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Missing endpoint, bad signer, unreachable chain, or invalid config at boot.
    /// Maps to process exit code 1.
    #[error("configuration error: {0}")]
    FatalConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_network_is_transient() {
        assert!(GatewayError::TransientNetwork("timeout".into()).is_transient());
    }

    #[test]
    fn nonce_race_is_transient() {
        assert!(GatewayError::NonceRace("nonce too low".into()).is_transient());
    }

    #[test]
    fn revert_and_invalid_argument_are_not_transient() {
        assert!(!GatewayError::Revert { reason: "Already processed".into() }.is_transient());
        assert!(!GatewayError::InvalidArgument("bad address".into()).is_transient());
    }

    #[test]
    fn revert_reason_extracts_string() {
        let err = GatewayError::Revert {
            reason: "Amount out below minimum".into(),
        };
        assert_eq!(err.revert_reason(), Some("Amount out below minimum"));
        assert_eq!(GatewayError::TransientNetwork("x".into()).revert_reason(), None);
    }
}
