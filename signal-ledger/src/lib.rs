// Append-only, hash-chained signal ledger
// The system of record: every generated signal lands here exactly once

pub mod error;
pub mod ledger;
pub mod memory;

pub use error::LedgerError;
pub use ledger::{SignalLedger, SignalRecord};
pub use memory::InMemoryLedger;
