// Signal Distribution (Layer 3)
// Evaluates per-executor eligibility and fans committed signals out to
// independently risk-governed execution accounts

pub mod distributor;
pub mod error;
pub mod log;
pub mod session;

pub use distributor::{DeliveryOutcome, DistributorConfig, ExecutorProfile, SignalDistributor, SkipReason};
pub use error::DistributionError;
pub use log::{AttemptOutcome, DistributionAttempt, DistributionLog};
pub use session::{SessionCalendar, SessionPolicy};
