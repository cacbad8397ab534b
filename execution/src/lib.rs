// Trading Execution (Layer 4)
// Account-scoped risk governance and order submission for delivered signals

pub mod broker;
pub mod config;
pub mod executor;
pub mod risk;

pub use broker::{AccountState, BrokerClient, BrokerError, BrokerPosition, OrderTicket, PaperBroker};
pub use config::ExecutorConfig;
pub use executor::{ExecutionState, TradingExecutor};
pub use risk::{PositionSizing, Reservation, RiskLedger, RiskLimits, RiskViolation, SizingRule};
