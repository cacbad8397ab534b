//! Brokerage client boundary.
//!
//! The real wire protocol is external; the pipeline only depends on this
//! trait. `PaperBroker` is the simulated stand-in used by the runner and
//! the test suite.

use chrono::{DateTime, Utc};
use common::SignalAction;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("order rejected by broker: {0}")]
    OrderRejected(String),
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTicket {
    pub order_id: String,
    pub symbol: String,
    pub action: SignalAction,
    pub notional: Decimal,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub notional: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountState {
    pub equity: Decimal,
    pub open_positions: usize,
}

#[async_trait::async_trait]
pub trait BrokerClient: Send + Sync {
    async fn place_order(
        &self,
        symbol: &str,
        action: SignalAction,
        notional: Decimal,
    ) -> Result<OrderTicket, BrokerError>;

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError>;

    async fn get_account_state(&self) -> Result<AccountState, BrokerError>;
}

/// Simulated brokerage: fills every order instantly and tracks positions
/// in memory. `fail_next_order` injects a rejection for failure-path tests.
pub struct PaperBroker {
    equity: Decimal,
    positions: DashMap<String, Decimal>,
    order_counter: AtomicU64,
    fail_next: AtomicBool,
}

impl PaperBroker {
    pub fn new(equity: Decimal) -> Self {
        Self {
            equity,
            positions: DashMap::new(),
            order_counter: AtomicU64::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Make the next `place_order` call fail with a broker rejection.
    pub fn fail_next_order(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of orders actually placed.
    pub fn orders_placed(&self) -> u64 {
        self.order_counter.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BrokerClient for PaperBroker {
    async fn place_order(
        &self,
        symbol: &str,
        action: SignalAction,
        notional: Decimal,
    ) -> Result<OrderTicket, BrokerError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(BrokerError::OrderRejected(
                "simulated broker rejection".to_string(),
            ));
        }

        let seq = self.order_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let signed = match action {
            SignalAction::Sell => -notional,
            _ => notional,
        };
        *self.positions.entry(symbol.to_string()).or_insert(Decimal::ZERO) += signed;

        Ok(OrderTicket {
            order_id: format!("PB-{seq:06}"),
            symbol: symbol.to_string(),
            action,
            notional,
            placed_at: Utc::now(),
        })
    }

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        Ok(self
            .positions
            .iter()
            .map(|entry| BrokerPosition {
                symbol: entry.key().clone(),
                notional: *entry.value(),
            })
            .collect())
    }

    async fn get_account_state(&self) -> Result<AccountState, BrokerError> {
        Ok(AccountState {
            equity: self.equity,
            open_positions: self.positions.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_paper_broker_fills_and_tracks() {
        let broker = PaperBroker::new(dec!(100000));

        let ticket = broker
            .place_order("AAPL", SignalAction::Buy, dec!(5000))
            .await
            .unwrap();
        assert_eq!(ticket.order_id, "PB-000001");

        let positions = broker.get_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].notional, dec!(5000));
    }

    #[tokio::test]
    async fn test_injected_failure_applies_once() {
        let broker = PaperBroker::new(dec!(100000));
        broker.fail_next_order();

        let err = broker
            .place_order("AAPL", SignalAction::Buy, dec!(100))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::OrderRejected(_)));

        // The next order goes through again.
        broker
            .place_order("AAPL", SignalAction::Buy, dec!(100))
            .await
            .unwrap();
        assert_eq!(broker.orders_placed(), 1);
    }
}
