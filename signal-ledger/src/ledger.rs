//! Ledger trait and read-side record view.

use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use common::{AuditRow, OutcomeUpdate, Signal, SignalCandidate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A committed signal together with its appended audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRecord {
    pub signal: Signal,
    pub outcomes: Vec<AuditRow>,
}

impl SignalRecord {
    /// The order id from the most recent audit row that carries one.
    pub fn order_id(&self) -> Option<&str> {
        self.outcomes
            .iter()
            .rev()
            .find_map(|row| row.order_id.as_deref())
    }

    /// The most recently recorded outcome description.
    pub fn latest_outcome(&self) -> Option<&str> {
        self.outcomes
            .iter()
            .rev()
            .find_map(|row| row.outcome.as_deref())
    }
}

/// Trait for ledger backends.
///
/// `append` is the single serialization point of the pipeline: chain order
/// is a global invariant, so implementations commit atomically and reject a
/// lost race with [`LedgerError::ChainConflict`]. Everything else may run
/// fully in parallel.
#[async_trait::async_trait]
pub trait SignalLedger: Send + Sync {
    /// Commit a candidate: assign the next `chain_index`, link `previous_hash`,
    /// compute `sha256` and store the record. Once this returns Ok, the
    /// signal's immutable fields are permanently fixed.
    async fn append(&self, candidate: SignalCandidate) -> Result<Signal, LedgerError>;

    /// Attach outcome facts to a committed signal as a new audit row.
    /// The signal row itself is never touched.
    async fn append_outcome(
        &self,
        signal_id: Uuid,
        update: OutcomeUpdate,
    ) -> Result<AuditRow, LedgerError>;

    /// Fetch a signal and its audit trail by id.
    async fn get(&self, signal_id: Uuid) -> Result<Option<SignalRecord>, LedgerError>;

    /// Signals with `from <= chain_index <= to`, ascending.
    async fn range_by_index(&self, from: u64, to: u64) -> Result<Vec<Signal>, LedgerError>;

    /// Signals generated within `[from, to]`, ascending by chain index.
    async fn range_by_time(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Signal>, LedgerError>;

    /// Per-symbol time-range query for the external read surface.
    async fn range_by_symbol(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Signal>, LedgerError>;

    /// Chain index of the last committed signal, if any.
    async fn tail_index(&self) -> Option<u64>;
}
