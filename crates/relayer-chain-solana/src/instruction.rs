//! Instruction encoding and program-log event parsing for the bridge program.
//!
//! Solana has no generic ABI the way EVM does, so this module defines the wire
//! convention this relayer assumes the destination program emits and accepts. A real
//! deployment's program defines the authoritative layout; this mirrors the minimal
//! surface `spec.md` §6 names (mint/unlock, Lock/Burn events).

use relayer_types::{ChainAddress, ChainId, EventKind, GatewayError, TargetTokenId};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Discriminant {
    Mint = 0,
    Unlock = 1,
}

/// Encodes `(discriminant, amount, source_chain_id, source_nonce, auth)` into
/// instruction data: `[u8 discriminant][u64 amount LE][u32 len][chain id bytes][u64
/// nonce LE][u32 len][auth bytes]`.
///
/// `amount` is truncated from `U256` to `u64` lamports; bridged amounts on the Solana
/// side are expected to already be lamport-denominated, so overflow here indicates a
/// configuration or upstream decoding error, not a legitimate large transfer.
pub fn encode_mint_or_unlock(
    discriminant: Discriminant,
    amount: alloy_primitives::U256,
    source_chain_id: &ChainId,
    source_nonce: u64,
    auth: &[u8],
) -> Result<Vec<u8>, GatewayError> {
    let amount_u64: u64 = amount
        .try_into()
        .map_err(|_| GatewayError::InvalidArgument("amount exceeds u64 lamports".into()))?;
    let mut data = Vec::new();
    data.push(discriminant as u8);
    data.extend_from_slice(&amount_u64.to_le_bytes());
    let chain_id_bytes = source_chain_id.to_string().into_bytes();
    data.extend_from_slice(&(chain_id_bytes.len() as u32).to_le_bytes());
    data.extend_from_slice(&chain_id_bytes);
    data.extend_from_slice(&source_nonce.to_le_bytes());
    data.extend_from_slice(&(auth.len() as u32).to_le_bytes());
    data.extend_from_slice(auth);
    Ok(data)
}

/// A `Lock`/`Burn`-equivalent event, parsed from a `Program log:` line of the form
/// `BRIDGE_EVENT|<LOCK|BURN>|<sender>|<recipient>|<amount>|<nonce>|<targetChain>|<targetToken-or-empty>`.
pub fn parse_log_line(
    line: &str,
    source_chain_id: &ChainId,
    block_number: u64,
    log_index: u64,
) -> Option<relayer_types::BridgeEvent> {
    let rest = line.strip_prefix("Program log: BRIDGE_EVENT|")?;
    let fields: Vec<&str> = rest.split('|').collect();
    if fields.len() != 7 {
        return None;
    }
    let [kind_tag, sender, recipient, amount, nonce, target_chain, target_token] = fields[..] else {
        return None;
    };
    let nonce: u64 = nonce.parse().ok()?;
    let amount = alloy_primitives::U256::from_str(amount).ok()?;
    let target_chain = ChainId::from_str(target_chain).ok()?;
    let kind = match kind_tag {
        "LOCK" => EventKind::Lock {
            target_token: (!target_token.is_empty()).then(|| TargetTokenId(target_token.to_string())),
            target_chain,
        },
        "BURN" => EventKind::Burn { target_chain },
        _ => return None,
    };
    Some(relayer_types::BridgeEvent {
        source_chain_id: source_chain_id.clone(),
        nonce,
        kind,
        sender: ChainAddress(sender.to_string()),
        recipient: ChainAddress(recipient.to_string()),
        amount,
        block_number,
        log_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> ChainId {
        ChainId::new("solana", "mainnet")
    }

    #[test]
    fn parses_a_lock_log_line() {
        let line = "Program log: BRIDGE_EVENT|LOCK|Sender111|Recipient222|1000|7|eip155:8453|USDC";
        let event = parse_log_line(line, &chain(), 100, 0).unwrap();
        assert_eq!(event.nonce, 7);
        assert!(matches!(event.kind, EventKind::Lock { target_token: Some(_), .. }));
    }

    #[test]
    fn parses_a_burn_log_line_without_target_token() {
        let line = "Program log: BRIDGE_EVENT|BURN|Sender111|Recipient222|1000|8|eip155:8453|";
        let event = parse_log_line(line, &chain(), 100, 1).unwrap();
        assert_eq!(event.nonce, 8);
        assert!(matches!(event.kind, EventKind::Burn { .. }));
    }

    #[test]
    fn ignores_unrelated_log_lines() {
        assert!(parse_log_line("Program log: something else", &chain(), 0, 0).is_none());
    }

    #[test]
    fn encodes_mint_instruction_data() {
        let data = encode_mint_or_unlock(
            Discriminant::Mint,
            alloy_primitives::U256::from(42u64),
            &chain(),
            5,
            &[0xAA],
        )
        .unwrap();
        assert_eq!(data[0], Discriminant::Mint as u8);
    }

    #[test]
    fn rejects_amounts_too_large_for_u64() {
        let huge = alloy_primitives::U256::MAX;
        assert!(encode_mint_or_unlock(Discriminant::Mint, huge, &chain(), 1, &[]).is_err());
    }
}
