/// Delivery failures after retries are exhausted.
///
/// Explicit executor rejections are not errors; they come back as
/// `ExecutionResponse::Rejected` and are terminal without retry.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DistributionError {
    #[error("delivery to {executor_id} timed out after {attempts} attempt(s)")]
    Timeout { executor_id: String, attempts: u32 },

    #[error("transport failure delivering to {executor_id}: {reason}")]
    Transport { executor_id: String, reason: String },
}
