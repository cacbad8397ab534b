//! Hash-chain verification.
//!
//! The monitor recomputes each record's digest from its stored immutable
//! fields and the predecessor's stored hash, and compares stored `sha256`,
//! `previous_hash` linkage and `chain_index` continuity. A mismatch is
//! tamper evidence: it is reported and logged, never repaired.

use common::{chain_digest, Signal, GENESIS_HASH};
use serde::{Deserialize, Serialize};
use signal_ledger::SignalLedger;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info};

/// One detected discrepancy at a chain position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mismatch {
    pub chain_index: u64,
    pub expected: String,
    pub found: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportRange {
    pub from: u64,
    pub to: u64,
}

/// Structured verification report, serialized to JSON for external
/// alerting and compliance automation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub range: ReportRange,
    /// Number of records actually checked (all of them for a full pass,
    /// the sample size for a sampled pass).
    pub verified: u64,
    pub mismatches: Vec<Mismatch>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Fatal, page-worthy condition when mismatches exist. Requires
    /// manual remediation; there is no auto-repair path.
    pub fn into_result(self) -> Result<(), IntegrityViolation> {
        match self.mismatches.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(IntegrityViolation {
                chain_index: first.chain_index,
                expected: first.expected,
                found: first.found,
            }),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("integrity violation at chain index {chain_index}: expected {expected}, found {found}")]
pub struct IntegrityViolation {
    pub chain_index: u64,
    pub expected: String,
    pub found: String,
}

/// Verify a contiguous ascending run of ledger rows.
///
/// Pure over the slice so tampered inputs are directly testable. The
/// first row's back-link is checked against the genesis hash only when
/// the slice starts at index 0.
pub fn verify_rows(rows: &[Signal]) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        let recomputed = chain_digest(&row.as_candidate(), row.chain_index, &row.previous_hash);
        if recomputed != row.sha256 {
            mismatches.push(Mismatch {
                chain_index: row.chain_index,
                expected: recomputed,
                found: row.sha256.clone(),
            });
            // The content hash is already wrong; linkage checks against
            // this record would only repeat the same finding.
            continue;
        }

        if i == 0 {
            if row.chain_index == 0 && row.previous_hash != GENESIS_HASH {
                mismatches.push(Mismatch {
                    chain_index: 0,
                    expected: GENESIS_HASH.to_string(),
                    found: row.previous_hash.clone(),
                });
            }
            continue;
        }

        let prev = &rows[i - 1];
        if row.chain_index != prev.chain_index + 1 {
            mismatches.push(Mismatch {
                chain_index: row.chain_index,
                expected: format!("chain_index {}", prev.chain_index + 1),
                found: format!("chain_index {}", row.chain_index),
            });
        }
        if row.previous_hash != prev.sha256 {
            mismatches.push(Mismatch {
                chain_index: row.chain_index,
                expected: prev.sha256.clone(),
                found: row.previous_hash.clone(),
            });
        }
    }

    mismatches
}

pub struct IntegrityMonitor {
    ledger: Arc<dyn SignalLedger>,
}

impl IntegrityMonitor {
    pub fn new(ledger: Arc<dyn SignalLedger>) -> Self {
        Self { ledger }
    }

    /// Recompute and verify the entire chain.
    pub async fn verify_full(&self) -> anyhow::Result<IntegrityReport> {
        let Some(tail) = self.ledger.tail_index().await else {
            return Ok(IntegrityReport {
                range: ReportRange { from: 0, to: 0 },
                verified: 0,
                mismatches: Vec::new(),
            });
        };

        let rows = self.ledger.range_by_index(0, tail).await?;
        let mismatches = verify_rows(&rows);
        let report = IntegrityReport {
            range: ReportRange { from: 0, to: tail },
            verified: rows.len() as u64,
            mismatches,
        };
        self.log_report(&report, "full");
        Ok(report)
    }

    /// Verify `n` randomly sampled records, each against its stored
    /// predecessor.
    pub async fn verify_sample(&self, n: usize) -> anyhow::Result<IntegrityReport> {
        let Some(tail) = self.ledger.tail_index().await else {
            return Ok(IntegrityReport {
                range: ReportRange { from: 0, to: 0 },
                verified: 0,
                mismatches: Vec::new(),
            });
        };

        let population = tail + 1;
        let mut picked = BTreeSet::new();
        if n as u64 >= population {
            picked.extend(0..population);
        } else {
            while picked.len() < n {
                picked.insert(fastrand::u64(0..population));
            }
        }

        let mut mismatches = Vec::new();
        for index in &picked {
            let from = index.saturating_sub(1);
            let pair = self.ledger.range_by_index(from, *index).await?;
            mismatches.extend(verify_rows(&pair));
        }
        mismatches.dedup();

        let report = IntegrityReport {
            range: ReportRange { from: 0, to: tail },
            verified: picked.len() as u64,
            mismatches,
        };
        self.log_report(&report, "sample");
        Ok(report)
    }

    fn log_report(&self, report: &IntegrityReport, mode: &str) {
        if report.is_clean() {
            info!(mode, verified = report.verified, "Chain verification clean");
        } else {
            for mismatch in &report.mismatches {
                error!(
                    mode,
                    chain_index = mismatch.chain_index,
                    expected = %mismatch.expected,
                    found = %mismatch.found,
                    "INTEGRITY VIOLATION: ledger record does not verify"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{AssetType, ServiceType, SignalAction, SignalCandidate};
    use rust_decimal_macros::dec;
    use signal_ledger::InMemoryLedger;
    use uuid::Uuid;

    fn candidate(symbol: &str) -> SignalCandidate {
        SignalCandidate {
            signal_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            action: SignalAction::Buy,
            entry_price: dec!(100),
            stop_price: dec!(98),
            target_price: dec!(104),
            confidence: 75.0,
            asset_type: AssetType::Equity,
            service_type: ServiceType::All,
            strategy: "consensus".to_string(),
            regime: "trending".to_string(),
            reasoning: "test".to_string(),
            generated_by: "test".to_string(),
            timestamp: Utc::now(),
            retention_expires_at: None,
        }
    }

    async fn chain_of(n: usize) -> (Arc<InMemoryLedger>, Vec<Signal>) {
        let ledger = Arc::new(InMemoryLedger::new());
        let mut rows = Vec::new();
        for i in 0..n {
            rows.push(ledger.append(candidate(&format!("SYM{i}"))).await.unwrap());
        }
        (ledger, rows)
    }

    #[tokio::test]
    async fn test_untampered_ledger_verifies_clean() {
        let (ledger, _) = chain_of(20).await;
        let report = IntegrityMonitor::new(ledger).verify_full().await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.verified, 20);
        assert_eq!(report.range, ReportRange { from: 0, to: 19 });
        assert!(report.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_tampered_field_yields_exactly_one_mismatch() {
        let (_, mut rows) = chain_of(10).await;
        rows[4].entry_price = dec!(999);

        let mismatches = verify_rows(&rows);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].chain_index, 4);
        assert_eq!(mismatches[0].found, rows[4].sha256);
    }

    #[tokio::test]
    async fn test_broken_linkage_detected() {
        let (_, mut rows) = chain_of(5).await;
        // Rewrite row 3's back-link without touching its content hash
        // inputs other than previous_hash: the digest check fires there.
        rows[3].previous_hash = "ff".repeat(32);

        let mismatches = verify_rows(&rows);
        assert!(!mismatches.is_empty());
        assert_eq!(mismatches[0].chain_index, 3);
    }

    #[tokio::test]
    async fn test_index_gap_detected() {
        let (_, mut rows) = chain_of(5).await;
        let removed = rows.remove(2);
        let mismatches = verify_rows(&rows);

        assert!(mismatches
            .iter()
            .any(|m| m.chain_index == removed.chain_index + 1
                && m.expected.starts_with("chain_index")));
    }

    #[tokio::test]
    async fn test_genesis_back_link_checked() {
        let (_, mut rows) = chain_of(1).await;
        rows[0].previous_hash = "ab".repeat(32);

        let mismatches = verify_rows(&rows);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].chain_index, 0);
    }

    #[tokio::test]
    async fn test_sampled_verification_on_clean_chain() {
        let (ledger, _) = chain_of(50).await;
        let report = IntegrityMonitor::new(ledger).verify_sample(10).await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.verified, 10);
    }

    #[tokio::test]
    async fn test_sample_larger_than_chain_checks_everything() {
        let (ledger, _) = chain_of(3).await;
        let report = IntegrityMonitor::new(ledger).verify_sample(100).await.unwrap();
        assert_eq!(report.verified, 3);
    }

    #[tokio::test]
    async fn test_report_serializes_for_alerting() {
        let (ledger, _) = chain_of(2).await;
        let report = IntegrityMonitor::new(ledger).verify_full().await.unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["range"]["to"], 1);
        assert!(json["mismatches"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_ledger_is_clean() {
        let ledger = Arc::new(InMemoryLedger::new());
        let report = IntegrityMonitor::new(ledger).verify_full().await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.verified, 0);
    }
}
