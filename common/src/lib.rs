// Shared domain types for the signal pipeline
// Everything that crosses a crate boundary lives here

pub mod exec;
pub mod hash;
pub mod logging;
pub mod types;

pub use exec::{ExecutionRequest, ExecutionResponse, ExecutionStatus, ExecutorEndpoint};
pub use hash::{canonical_content, chain_digest, GENESIS_HASH};
pub use logging::init_logging;
pub use types::{
    AssetType, AuditRow, OutcomeUpdate, ServiceType, Signal, SignalAction, SignalCandidate,
};
