//! In-memory ledger backend.
//!
//! Stores the chain as an index-addressed arena (`Vec<Signal>` where the
//! vector position is the chain index) plus lookup maps. Appends are
//! optimistic: the digest is computed against a snapshot of the tail and
//! committed only if the tail has not moved, otherwise the caller gets a
//! `ChainConflict` and retries against the new tail.

use crate::error::LedgerError;
use crate::ledger::{SignalLedger, SignalRecord};
use chrono::{DateTime, Utc};
use common::{AuditRow, OutcomeUpdate, Signal, SignalCandidate, GENESIS_HASH};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    rows: Vec<Signal>,
    by_id: HashMap<Uuid, usize>,
    outcomes: HashMap<Uuid, Vec<AuditRow>>,
}

impl Inner {
    fn tail(&self) -> (u64, String) {
        match self.rows.last() {
            Some(last) => (last.chain_index + 1, last.sha256.clone()),
            None => (0, GENESIS_HASH.to_string()),
        }
    }
}

pub struct InMemoryLedger {
    inner: RwLock<Inner>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Total number of committed signals.
    pub async fn len(&self) -> u64 {
        self.inner.read().await.rows.len() as u64
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.rows.is_empty()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SignalLedger for InMemoryLedger {
    async fn append(&self, candidate: SignalCandidate) -> Result<Signal, LedgerError> {
        // Snapshot the tail, then hash outside any lock. The write lock is
        // only held for the compare-and-swap commit.
        let (next_index, previous_hash) = {
            let inner = self.inner.read().await;
            if inner.by_id.contains_key(&candidate.signal_id) {
                return Err(LedgerError::DuplicateSignal(candidate.signal_id));
            }
            inner.tail()
        };

        let signal = Signal::from_candidate(candidate, next_index, previous_hash);

        let mut inner = self.inner.write().await;
        let current_tail = inner.rows.len() as u64;
        if current_tail != next_index {
            return Err(LedgerError::ChainConflict {
                expected: next_index,
                found: current_tail,
            });
        }
        if inner.by_id.contains_key(&signal.signal_id) {
            return Err(LedgerError::DuplicateSignal(signal.signal_id));
        }

        debug!(
            signal_id = %signal.signal_id,
            chain_index = signal.chain_index,
            symbol = %signal.symbol,
            "Committed signal to ledger"
        );

        inner.by_id.insert(signal.signal_id, signal.chain_index as usize);
        inner.rows.push(signal.clone());
        Ok(signal)
    }

    async fn append_outcome(
        &self,
        signal_id: Uuid,
        update: OutcomeUpdate,
    ) -> Result<AuditRow, LedgerError> {
        let mut inner = self.inner.write().await;
        if !inner.by_id.contains_key(&signal_id) {
            return Err(LedgerError::UnknownSignal(signal_id));
        }

        let row = AuditRow {
            audit_id: Uuid::new_v4(),
            signal_id,
            recorded_at: Utc::now(),
            order_id: update.order_id,
            executor_id: update.executor_id,
            outcome: update.outcome,
            exit_price: update.exit_price,
            profit_loss_pct: update.profit_loss_pct,
        };

        debug!(
            signal_id = %signal_id,
            outcome = row.outcome.as_deref().unwrap_or("-"),
            "Appended audit row"
        );

        inner.outcomes.entry(signal_id).or_default().push(row.clone());
        Ok(row)
    }

    async fn get(&self, signal_id: Uuid) -> Result<Option<SignalRecord>, LedgerError> {
        let inner = self.inner.read().await;
        let record = inner.by_id.get(&signal_id).map(|&idx| SignalRecord {
            signal: inner.rows[idx].clone(),
            outcomes: inner.outcomes.get(&signal_id).cloned().unwrap_or_default(),
        });
        Ok(record)
    }

    async fn range_by_index(&self, from: u64, to: u64) -> Result<Vec<Signal>, LedgerError> {
        let inner = self.inner.read().await;
        let start = from.min(inner.rows.len() as u64) as usize;
        let end = to.saturating_add(1).min(inner.rows.len() as u64) as usize;
        if start >= end {
            return Ok(Vec::new());
        }
        Ok(inner.rows[start..end].to_vec())
    }

    async fn range_by_time(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Signal>, LedgerError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .iter()
            .filter(|s| s.timestamp >= from && s.timestamp <= to)
            .cloned()
            .collect())
    }

    async fn range_by_symbol(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Signal>, LedgerError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .iter()
            .filter(|s| s.symbol == symbol && s.timestamp >= from && s.timestamp <= to)
            .cloned()
            .collect())
    }

    async fn tail_index(&self) -> Option<u64> {
        let inner = self.inner.read().await;
        inner.rows.last().map(|s| s.chain_index)
    }
}
