//! Append-only log of distribution attempts.
//!
//! Delivery results are never written onto the signal itself; every
//! attempt (including eligibility skips) lands here as its own entry.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AttemptOutcome {
    Accepted { order_id: Option<String> },
    Rejected { reason: String },
    TimedOut,
    TransportError { reason: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionAttempt {
    pub executor_id: String,
    /// 1-based delivery attempt number; 0 for eligibility skips.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub at: DateTime<Utc>,
}

#[derive(Default)]
pub struct DistributionLog {
    entries: DashMap<Uuid, Vec<DistributionAttempt>>,
}

impl DistributionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, signal_id: Uuid, executor_id: &str, attempt: u32, outcome: AttemptOutcome) {
        self.entries
            .entry(signal_id)
            .or_default()
            .push(DistributionAttempt {
                executor_id: executor_id.to_string(),
                attempt,
                outcome,
                at: Utc::now(),
            });
    }

    pub fn attempts_for(&self, signal_id: Uuid) -> Vec<DistributionAttempt> {
        self.entries
            .get(&signal_id)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn signal_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_append_only_per_signal() {
        let log = DistributionLog::new();
        let signal_id = Uuid::new_v4();

        log.record(signal_id, "exec-a", 1, AttemptOutcome::TimedOut);
        log.record(
            signal_id,
            "exec-a",
            2,
            AttemptOutcome::Accepted {
                order_id: Some("X1".to_string()),
            },
        );

        let attempts = log.attempts_for(signal_id);
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].outcome, AttemptOutcome::TimedOut);
        assert_eq!(attempts[1].attempt, 2);
    }
}
