use uuid::Uuid;

/// Errors surfaced by ledger operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    /// A concurrent append won the race for the tail. The record was not
    /// committed; the caller retries against the new tail.
    #[error("chain conflict: appended against tail {expected}, ledger tail is now {found}")]
    ChainConflict { expected: u64, found: u64 },

    /// A signal with this id is already committed.
    #[error("signal {0} already exists in the ledger")]
    DuplicateSignal(Uuid),

    /// Outcome append or lookup referenced a signal that was never committed.
    #[error("unknown signal {0}")]
    UnknownSignal(Uuid),
}
