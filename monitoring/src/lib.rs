// Integrity Monitoring (Layer 5)
// Re-verifies the ledger hash chain and reports tamper evidence

pub mod integrity;

pub use integrity::{
    verify_rows, IntegrityMonitor, IntegrityReport, IntegrityViolation, Mismatch, ReportRange,
};
