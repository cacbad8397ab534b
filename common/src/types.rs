use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trade direction carried by a signal or a source vote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SignalAction {
    Buy,
    Sell,
    Neutral,
}

impl SignalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::Neutral => "NEUTRAL",
        }
    }
}

/// Asset class of the traded instrument.
///
/// Crypto venues never close; everything else is bound to an exchange
/// session unless the executor account opts into all-hours operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AssetType {
    Equity,
    Crypto,
    Forex,
    Future,
}

impl AssetType {
    /// Whether this asset class trades around the clock.
    pub fn trades_all_hours(&self) -> bool {
        matches!(self, AssetType::Crypto)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Equity => "equity",
            AssetType::Crypto => "crypto",
            AssetType::Forex => "forex",
            AssetType::Future => "future",
        }
    }
}

/// Which executor pool(s) may consume a signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ServiceType {
    Standard,
    PropFirm,
    All,
}

impl ServiceType {
    /// Whether a signal tagged with `self` may be consumed by a pool of `pool` type.
    pub fn allows(&self, pool: ServiceType) -> bool {
        matches!(self, ServiceType::All) || *self == pool
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Standard => "standard",
            ServiceType::PropFirm => "prop_firm",
            ServiceType::All => "all",
        }
    }
}

/// A generated trading decision before it is committed to the ledger.
///
/// These are the immutable content fields of a [`Signal`]; the ledger adds
/// the chain fields (`chain_index`, `previous_hash`, `sha256`) exactly once
/// at append time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalCandidate {
    pub signal_id: Uuid,
    pub symbol: String,
    pub action: SignalAction,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub target_price: Decimal,
    /// Consensus confidence, 0 to 100.
    pub confidence: f64,
    pub asset_type: AssetType,
    pub service_type: ServiceType,
    pub strategy: String,
    pub regime: String,
    pub reasoning: String,
    pub generated_by: String,
    pub timestamp: DateTime<Utc>,
    /// Soft retention marker consumed by an external archival job.
    /// Never triggers deletion inside the pipeline.
    pub retention_expires_at: Option<DateTime<Utc>>,
}

/// A committed, hash-chained signal. The system of record.
///
/// Once the ledger returns one of these, every field is permanently fixed.
/// Execution outcomes are attached as separate [`AuditRow`]s, never by
/// mutating the signal itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub signal_id: Uuid,
    pub symbol: String,
    pub action: SignalAction,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub target_price: Decimal,
    pub confidence: f64,
    pub asset_type: AssetType,
    pub service_type: ServiceType,
    pub strategy: String,
    pub regime: String,
    pub reasoning: String,
    pub generated_by: String,
    pub timestamp: DateTime<Utc>,
    pub retention_expires_at: Option<DateTime<Utc>>,
    /// Position in the ledger. Strictly increasing, gap-free.
    pub chain_index: u64,
    /// The previous record's `sha256`; [`crate::GENESIS_HASH`] at index 0.
    pub previous_hash: String,
    /// `SHA-256(canonical(immutable fields) || previous_hash)`, hex-encoded.
    pub sha256: String,
}

impl Signal {
    /// Build a committed signal from its candidate, computing the content hash.
    pub fn from_candidate(candidate: SignalCandidate, chain_index: u64, previous_hash: String) -> Self {
        let sha256 = crate::hash::chain_digest(&candidate, chain_index, &previous_hash);
        Self {
            signal_id: candidate.signal_id,
            symbol: candidate.symbol,
            action: candidate.action,
            entry_price: candidate.entry_price,
            stop_price: candidate.stop_price,
            target_price: candidate.target_price,
            confidence: candidate.confidence,
            asset_type: candidate.asset_type,
            service_type: candidate.service_type,
            strategy: candidate.strategy,
            regime: candidate.regime,
            reasoning: candidate.reasoning,
            generated_by: candidate.generated_by,
            timestamp: candidate.timestamp,
            retention_expires_at: candidate.retention_expires_at,
            chain_index,
            previous_hash,
            sha256,
        }
    }

    /// View of the immutable content fields, used to re-verify the chain.
    pub fn as_candidate(&self) -> SignalCandidate {
        SignalCandidate {
            signal_id: self.signal_id,
            symbol: self.symbol.clone(),
            action: self.action,
            entry_price: self.entry_price,
            stop_price: self.stop_price,
            target_price: self.target_price,
            confidence: self.confidence,
            asset_type: self.asset_type,
            service_type: self.service_type,
            strategy: self.strategy.clone(),
            regime: self.regime.clone(),
            reasoning: self.reasoning.clone(),
            generated_by: self.generated_by.clone(),
            timestamp: self.timestamp,
            retention_expires_at: self.retention_expires_at,
        }
    }
}

/// One appended execution-outcome fact referencing a signal.
///
/// Audit rows are append-only: later facts (order placed, position exited)
/// are recorded as additional rows rather than edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRow {
    pub audit_id: Uuid,
    pub signal_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub order_id: Option<String>,
    pub executor_id: Option<String>,
    pub outcome: Option<String>,
    pub exit_price: Option<Decimal>,
    pub profit_loss_pct: Option<Decimal>,
}

/// The writable subset of outcome fields accepted by `append_outcome`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutcomeUpdate {
    pub order_id: Option<String>,
    pub executor_id: Option<String>,
    pub outcome: Option<String>,
    pub exit_price: Option<Decimal>,
    pub profit_loss_pct: Option<Decimal>,
}

impl OutcomeUpdate {
    /// Outcome for an order accepted by the brokerage.
    pub fn order_submitted(executor_id: &str, order_id: &str) -> Self {
        Self {
            order_id: Some(order_id.to_string()),
            executor_id: Some(executor_id.to_string()),
            outcome: Some("order_submitted".to_string()),
            ..Default::default()
        }
    }

    /// Outcome for a signal an executor declined or could not place.
    pub fn rejection(executor_id: &str, reason: &str) -> Self {
        Self {
            executor_id: Some(executor_id.to_string()),
            outcome: Some(reason.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_type_pool_matching() {
        assert!(ServiceType::All.allows(ServiceType::Standard));
        assert!(ServiceType::All.allows(ServiceType::PropFirm));
        assert!(ServiceType::PropFirm.allows(ServiceType::PropFirm));
        assert!(!ServiceType::Standard.allows(ServiceType::PropFirm));
    }

    #[test]
    fn test_crypto_trades_all_hours() {
        assert!(AssetType::Crypto.trades_all_hours());
        assert!(!AssetType::Equity.trades_all_hours());
        assert!(!AssetType::Future.trades_all_hours());
    }
}
