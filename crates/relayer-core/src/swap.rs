//! Swap Protection (`spec.md` §4.7): a pure, uncached slippage-bounded floor on the
//! minimum acceptable swap output, computed fresh at each submission.

use alloy_primitives::U256;
use thiserror::Error;

/// The maximum `slippageBps` the relayer will accept, per `spec.md` §4.7. Above this,
/// a single bad quote could let an attacker drain value through the swap step, so it
/// is rejected at configuration load time, not per-request.
pub const MAX_SLIPPAGE_BPS: u16 = 1_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlippageConfigError {
    #[error("slippageBps {0} exceeds the maximum of {max}", max = MAX_SLIPPAGE_BPS)]
    TooHigh(u16),
}

/// Validates a configured slippage tolerance. Called once at boot (`spec.md` §7
/// `FatalConfig`), never per-event.
pub fn validate_slippage_bps(slippage_bps: u16) -> Result<(), SlippageConfigError> {
    if slippage_bps > MAX_SLIPPAGE_BPS {
        return Err(SlippageConfigError::TooHigh(slippage_bps));
    }
    Ok(())
}

/// `minOut = floor(expectedOut * (10_000 - slippageBps) / 10_000)`.
///
/// `slippage_bps` must already have passed [`validate_slippage_bps`]; this function
/// does not re-validate it, since it is called in the hot submission path immediately
/// before dispatch (`spec.md` §4.7 "Staleness": no caching, quote immediately
/// precedes use).
pub fn min_out(expected_out: U256, slippage_bps: u16) -> U256 {
    let retained_bps = U256::from(10_000u32 - slippage_bps as u32);
    expected_out
        .saturating_mul(retained_bps)
        .wrapping_div(U256::from(10_000u32))
}
