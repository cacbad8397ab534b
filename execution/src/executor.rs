//! The trading executor: one independently risk-governed account.
//!
//! Per delivered signal the flow is
//! Received -> RiskCheck -> { Accepted -> OrderSubmitted | RejectedByBroker }
//!                        | RejectedByRisk
//! with `signal_id` as the idempotency key: a redelivery returns the
//! settled result, awaiting the original when it is still in flight, and
//! a duplicate can never reach the broker.

use crate::broker::BrokerClient;
use crate::risk::RiskLedger;
use common::{ExecutionRequest, ExecutionResponse, ExecutorEndpoint, OutcomeUpdate};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use signal_ledger::SignalLedger;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lifecycle of a signal inside this executor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionState {
    Received,
    RiskCheck,
    Accepted,
    OrderSubmitted,
    RejectedByRisk,
    RejectedByBroker,
}

enum Slot {
    /// Processing has started; waiters subscribe to the settled response.
    InFlight(watch::Receiver<Option<ExecutionResponse>>),
    Done(ExecutionResponse),
}

/// Outcome of claiming the idempotency slot for a signal id.
enum Claim {
    /// This call owns processing and publishes the result on settle.
    Owner(watch::Sender<Option<ExecutionResponse>>),
    /// Another call is processing; await its published result.
    Waiter(watch::Receiver<Option<ExecutionResponse>>),
    Settled(ExecutionResponse),
}

pub struct TradingExecutor {
    executor_id: String,
    risk: Mutex<RiskLedger>,
    broker: Arc<dyn BrokerClient>,
    ledger: Arc<dyn SignalLedger>,
    results: DashMap<Uuid, Slot>,
}

impl TradingExecutor {
    pub fn new(
        executor_id: impl Into<String>,
        risk: RiskLedger,
        broker: Arc<dyn BrokerClient>,
        ledger: Arc<dyn SignalLedger>,
    ) -> Self {
        Self {
            executor_id: executor_id.into(),
            risk: Mutex::new(risk),
            broker,
            ledger,
            results: DashMap::new(),
        }
    }

    async fn process(&self, request: &ExecutionRequest) -> ExecutionResponse {
        debug!(
            signal_id = %request.signal_id,
            executor_id = %self.executor_id,
            state = ?ExecutionState::RiskCheck,
            "Risk-checking signal"
        );

        // Atomic check-and-reserve: the account lock is held for this call
        // only, never across the broker round trip.
        let reservation = {
            let mut risk = self.risk.lock().await;
            risk.check_and_reserve(request)
        };

        let reservation = match reservation {
            Ok(reservation) => reservation,
            Err(violation) => {
                info!(
                    signal_id = %request.signal_id,
                    executor_id = %self.executor_id,
                    state = ?ExecutionState::RejectedByRisk,
                    reason = %violation,
                    "Signal rejected by risk"
                );
                let reason = format!("rejected_by_risk: {violation}");
                self.write_outcome(request.signal_id, OutcomeUpdate::rejection(&self.executor_id, &reason))
                    .await;
                return ExecutionResponse::rejected(violation.to_string());
            }
        };

        debug!(
            signal_id = %request.signal_id,
            executor_id = %self.executor_id,
            state = ?ExecutionState::Accepted,
            notional = %reservation.notional,
            "Reservation taken; submitting order"
        );

        match self
            .broker
            .place_order(&request.symbol, request.action, reservation.notional)
            .await
        {
            Ok(ticket) => {
                self.risk.lock().await.confirm(reservation.id);
                info!(
                    signal_id = %request.signal_id,
                    executor_id = %self.executor_id,
                    state = ?ExecutionState::OrderSubmitted,
                    order_id = %ticket.order_id,
                    "Order submitted"
                );
                self.write_outcome(
                    request.signal_id,
                    OutcomeUpdate::order_submitted(&self.executor_id, &ticket.order_id),
                )
                .await;
                ExecutionResponse::accepted(ticket.order_id)
            }
            Err(e) => {
                self.risk.lock().await.release(reservation.id);
                warn!(
                    signal_id = %request.signal_id,
                    executor_id = %self.executor_id,
                    state = ?ExecutionState::RejectedByBroker,
                    error = %e,
                    "Broker rejected order; reservation released"
                );
                let reason = format!("rejected_by_broker: {e}");
                self.write_outcome(request.signal_id, OutcomeUpdate::rejection(&self.executor_id, &reason))
                    .await;
                ExecutionResponse::rejected(e.to_string())
            }
        }
    }

    /// Append an outcome fact; a failed write-back is logged, not masked
    /// over the execution result.
    async fn write_outcome(&self, signal_id: Uuid, update: OutcomeUpdate) {
        if let Err(e) = self.ledger.append_outcome(signal_id, update).await {
            error!(
                signal_id = %signal_id,
                executor_id = %self.executor_id,
                error = %e,
                "Failed to append execution outcome"
            );
        }
    }
}

#[async_trait::async_trait]
impl ExecutorEndpoint for TradingExecutor {
    fn executor_id(&self) -> &str {
        &self.executor_id
    }

    async fn execute(&self, request: ExecutionRequest) -> anyhow::Result<ExecutionResponse> {
        debug!(
            signal_id = %request.signal_id,
            executor_id = %self.executor_id,
            state = ?ExecutionState::Received,
            "Received signal"
        );

        // Claim the idempotency slot before doing anything with effects.
        // The map guard is never held across an await.
        let claim = match self.results.entry(request.signal_id) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Done(prior) => Claim::Settled(prior.clone()),
                Slot::InFlight(rx) => Claim::Waiter(rx.clone()),
            },
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None);
                entry.insert(Slot::InFlight(rx));
                Claim::Owner(tx)
            }
        };

        match claim {
            Claim::Settled(prior) => {
                debug!(
                    signal_id = %request.signal_id,
                    executor_id = %self.executor_id,
                    "Duplicate delivery; returning recorded result"
                );
                Ok(prior)
            }
            Claim::Waiter(mut rx) => {
                debug!(
                    signal_id = %request.signal_id,
                    executor_id = %self.executor_id,
                    "Duplicate delivery while original in flight; awaiting its result"
                );
                loop {
                    let settled = rx.borrow_and_update().clone();
                    if let Some(response) = settled {
                        return Ok(response);
                    }
                    if rx.changed().await.is_err() {
                        // Owner dropped without settling (task aborted).
                        return Ok(ExecutionResponse::rejected(
                            "duplicate delivery: original never settled",
                        ));
                    }
                }
            }
            Claim::Owner(tx) => {
                let response = self.process(&request).await;
                self.results
                    .insert(request.signal_id, Slot::Done(response.clone()));
                let _ = tx.send(Some(response.clone()));
                Ok(response)
            }
        }
    }
}
