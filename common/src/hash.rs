//! Canonical encoding and chain digest for ledger records.
//!
//! Each committed signal stores `sha256 = SHA-256(canonical || previous_hash)`
//! where `canonical` is a fixed-order, delimiter-joined rendering of the
//! immutable fields. The ledger computes it once at append time and the
//! integrity monitor recomputes it during verification, so both must go
//! through this module.

use crate::types::SignalCandidate;
use chrono::SecondsFormat;
use sha2::{Digest, Sha256};

/// `previous_hash` of the record at chain index 0.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Render the immutable fields of a signal in canonical form.
///
/// Field order is fixed; decimals are normalized (no trailing zeros),
/// confidence uses four decimal places, timestamps are RFC 3339 with
/// microsecond precision. Changing any of this invalidates every stored
/// hash, so it never changes.
pub fn canonical_content(candidate: &SignalCandidate, chain_index: u64) -> String {
    let retention = candidate
        .retention_expires_at
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
        .unwrap_or_default();

    [
        candidate.signal_id.to_string(),
        candidate.symbol.clone(),
        candidate.action.as_str().to_string(),
        candidate.entry_price.normalize().to_string(),
        candidate.stop_price.normalize().to_string(),
        candidate.target_price.normalize().to_string(),
        format!("{:.4}", candidate.confidence),
        candidate.asset_type.as_str().to_string(),
        candidate.service_type.as_str().to_string(),
        candidate.strategy.clone(),
        candidate.regime.clone(),
        candidate.reasoning.clone(),
        candidate.generated_by.clone(),
        candidate
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Micros, true),
        retention,
        chain_index.to_string(),
    ]
    .join("|")
}

/// Compute the hex-encoded chain digest for a record.
pub fn chain_digest(candidate: &SignalCandidate, chain_index: u64, previous_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_content(candidate, chain_index).as_bytes());
    hasher.update(previous_hash.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetType, ServiceType, SignalAction};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn candidate() -> SignalCandidate {
        SignalCandidate {
            signal_id: Uuid::new_v4(),
            symbol: "AAPL".to_string(),
            action: SignalAction::Buy,
            entry_price: dec!(187.50),
            stop_price: dec!(183.75),
            target_price: dec!(195.00),
            confidence: 82.5,
            asset_type: AssetType::Equity,
            service_type: ServiceType::All,
            strategy: "consensus".to_string(),
            regime: "trending".to_string(),
            reasoning: "3 of 4 sources agree".to_string(),
            generated_by: "generator-1".to_string(),
            timestamp: Utc::now(),
            retention_expires_at: None,
        }
    }

    #[test]
    fn test_digest_is_deterministic() {
        let c = candidate();
        let a = chain_digest(&c, 0, GENESIS_HASH);
        let b = chain_digest(&c, 0, GENESIS_HASH);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_digest_depends_on_content() {
        let c = candidate();
        let original = chain_digest(&c, 0, GENESIS_HASH);

        let mut tampered = c.clone();
        tampered.entry_price = dec!(188.00);
        assert_ne!(chain_digest(&tampered, 0, GENESIS_HASH), original);

        // Same content at a different chain position hashes differently too.
        assert_ne!(chain_digest(&c, 1, GENESIS_HASH), original);
    }

    #[test]
    fn test_digest_depends_on_previous_hash() {
        let c = candidate();
        let a = chain_digest(&c, 5, GENESIS_HASH);
        let b = chain_digest(&c, 5, &"ab".repeat(32));
        assert_ne!(a, b);
    }

    #[test]
    fn test_normalized_decimals_hash_equal() {
        let mut a = candidate();
        let mut b = a.clone();
        a.entry_price = dec!(187.50);
        b.entry_price = dec!(187.5000);
        assert_eq!(
            chain_digest(&a, 0, GENESIS_HASH),
            chain_digest(&b, 0, GENESIS_HASH)
        );
    }
}
