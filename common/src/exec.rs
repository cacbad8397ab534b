//! Wire types for the distributor -> executor boundary.

use crate::types::{AssetType, ServiceType, Signal, SignalAction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request payload carried to an executor. `signal_id` doubles as the
/// idempotency key: redelivering the same id must not act twice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionRequest {
    pub signal_id: Uuid,
    pub symbol: String,
    pub action: SignalAction,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub target_price: Decimal,
    pub confidence: f64,
    pub asset_type: AssetType,
    pub service_type: ServiceType,
}

impl From<&Signal> for ExecutionRequest {
    fn from(signal: &Signal) -> Self {
        Self {
            signal_id: signal.signal_id,
            symbol: signal.symbol.clone(),
            action: signal.action,
            entry_price: signal.entry_price,
            stop_price: signal.stop_price,
            target_price: signal.target_price,
            confidence: signal.confidence,
            asset_type: signal.asset_type,
            service_type: signal.service_type,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    Accepted,
    Rejected,
}

/// Executor response for a delivered signal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResponse {
    pub status: ExecutionStatus,
    pub order_id: Option<String>,
    pub reason: Option<String>,
}

impl ExecutionResponse {
    pub fn accepted(order_id: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Accepted,
            order_id: Some(order_id.into()),
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Rejected,
            order_id: None,
            reason: Some(reason.into()),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == ExecutionStatus::Accepted
    }
}

/// One independently risk-governed execution account.
///
/// An `Err` is a transport-level failure the distributor may retry;
/// an `Ok(Rejected)` response is a terminal decision and is never retried.
#[async_trait::async_trait]
pub trait ExecutorEndpoint: Send + Sync {
    fn executor_id(&self) -> &str;

    async fn execute(&self, request: ExecutionRequest) -> anyhow::Result<ExecutionResponse>;
}
