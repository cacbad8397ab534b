//! Per-account risk ledger with atomic check-and-reserve.
//!
//! The ledger is the account's running exposure/loss state. A signal's
//! intended exposure is reserved in the same step that validates it, so
//! two concurrently accepted signals can never jointly exceed the daily
//! loss or concentration limits. The reservation is settled (confirmed or
//! released) after the broker call; no lock is held across that call.

use common::{AssetType, ExecutionRequest};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Hard limits for one executor account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum tolerated loss per trading day; reserved risk counts
    /// against this headroom until settled.
    pub max_daily_loss: Decimal,
    /// Maximum open notional per symbol.
    pub max_symbol_notional: Decimal,
    /// Maximum number of open plus pending positions.
    pub max_open_positions: usize,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_daily_loss: Decimal::new(1_000, 0),
            max_symbol_notional: Decimal::new(25_000, 0),
            max_open_positions: 10,
        }
    }
}

/// Notional sizing rule for one asset class.
///
/// The exact crypto-vs-equity formula is deliberately a configuration
/// knob: position notional is the smaller of `max_notional` and
/// `account_equity * account_fraction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingRule {
    pub max_notional: Decimal,
    pub account_fraction: Decimal,
}

/// Asset-class-specific position sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSizing {
    pub crypto: SizingRule,
    pub equity: SizingRule,
}

impl Default for PositionSizing {
    fn default() -> Self {
        Self {
            crypto: SizingRule {
                max_notional: Decimal::new(5_000, 0),
                account_fraction: Decimal::new(5, 2), // 5%
            },
            equity: SizingRule {
                max_notional: Decimal::new(10_000, 0),
                account_fraction: Decimal::new(10, 2), // 10%
            },
        }
    }
}

impl PositionSizing {
    pub fn rule_for(&self, asset_type: AssetType) -> &SizingRule {
        match asset_type {
            AssetType::Crypto => &self.crypto,
            _ => &self.equity,
        }
    }
}

/// Why the risk check refused a signal. Terminal for this account.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum RiskViolation {
    #[error("daily loss headroom {headroom} insufficient for intended risk {required}")]
    DailyLossLimit { headroom: Decimal, required: Decimal },

    #[error("symbol {symbol} notional {current} + {proposed} exceeds cap {limit}")]
    SymbolConcentration {
        symbol: String,
        current: Decimal,
        proposed: Decimal,
        limit: Decimal,
    },

    #[error("open position count {current} at limit {limit}")]
    TooManyPositions { current: usize, limit: usize },

    #[error("entry price must be positive")]
    NonPositivePrice,
}

/// Exposure reserved for one accepted signal, pending the broker outcome.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub id: Uuid,
    pub symbol: String,
    pub notional: Decimal,
    pub risk_amount: Decimal,
}

/// Running exposure/loss state for one account within a trading day.
/// The daily reset is driven by an external schedule via [`RiskLedger::reset_day`].
#[derive(Debug)]
pub struct RiskLedger {
    limits: RiskLimits,
    sizing: PositionSizing,
    account_equity: Decimal,
    realized_loss_today: Decimal,
    reserved_risk: Decimal,
    notional_by_symbol: HashMap<String, Decimal>,
    pending: HashMap<Uuid, Reservation>,
    open_positions: usize,
}

impl RiskLedger {
    pub fn new(limits: RiskLimits, sizing: PositionSizing, account_equity: Decimal) -> Self {
        Self {
            limits,
            sizing,
            account_equity,
            realized_loss_today: Decimal::ZERO,
            reserved_risk: Decimal::ZERO,
            notional_by_symbol: HashMap::new(),
            pending: HashMap::new(),
            open_positions: 0,
        }
    }

    /// Validate a request against all limits and, in the same step,
    /// reserve its intended exposure. Callers hold the account lock for
    /// exactly this call.
    pub fn check_and_reserve(&mut self, request: &ExecutionRequest) -> Result<Reservation, RiskViolation> {
        if request.entry_price <= Decimal::ZERO {
            return Err(RiskViolation::NonPositivePrice);
        }

        let rule = self.sizing.rule_for(request.asset_type);
        let notional = rule
            .max_notional
            .min(self.account_equity * rule.account_fraction);

        // Risk to the daily loss budget if the stop is hit.
        let stop_distance = (request.entry_price - request.stop_price).abs();
        let risk_amount = notional * stop_distance / request.entry_price;

        let committed = self.realized_loss_today + self.reserved_risk;
        let headroom = self.limits.max_daily_loss - committed;
        if risk_amount > headroom {
            return Err(RiskViolation::DailyLossLimit {
                headroom,
                required: risk_amount,
            });
        }

        let current = self
            .notional_by_symbol
            .get(&request.symbol)
            .copied()
            .unwrap_or(Decimal::ZERO);
        if current + notional > self.limits.max_symbol_notional {
            return Err(RiskViolation::SymbolConcentration {
                symbol: request.symbol.clone(),
                current,
                proposed: notional,
                limit: self.limits.max_symbol_notional,
            });
        }

        let in_use = self.open_positions + self.pending.len();
        if in_use >= self.limits.max_open_positions {
            return Err(RiskViolation::TooManyPositions {
                current: in_use,
                limit: self.limits.max_open_positions,
            });
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            symbol: request.symbol.clone(),
            notional,
            risk_amount,
        };
        self.reserved_risk += risk_amount;
        *self
            .notional_by_symbol
            .entry(request.symbol.clone())
            .or_insert(Decimal::ZERO) += notional;
        self.pending.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    /// The broker accepted the order: the reservation becomes an open
    /// position. Its risk stays reserved until the position is resolved.
    pub fn confirm(&mut self, reservation_id: Uuid) {
        if self.pending.remove(&reservation_id).is_some() {
            self.open_positions += 1;
        }
    }

    /// The broker call failed: hand the reserved headroom back.
    pub fn release(&mut self, reservation_id: Uuid) {
        if let Some(reservation) = self.pending.remove(&reservation_id) {
            self.reserved_risk -= reservation.risk_amount;
            if let Some(notional) = self.notional_by_symbol.get_mut(&reservation.symbol) {
                *notional -= reservation.notional;
            }
        }
    }

    /// Book a realized loss (positive amount) against today's budget.
    pub fn record_realized_loss(&mut self, amount: Decimal) {
        self.realized_loss_today += amount;
    }

    /// External daily schedule: clears the day's loss and reservations.
    pub fn reset_day(&mut self) {
        self.realized_loss_today = Decimal::ZERO;
        self.reserved_risk = Decimal::ZERO;
        self.pending.clear();
    }

    pub fn reserved_risk(&self) -> Decimal {
        self.reserved_risk
    }

    pub fn daily_headroom(&self) -> Decimal {
        self.limits.max_daily_loss - self.realized_loss_today - self.reserved_risk
    }

    pub fn open_positions(&self) -> usize {
        self.open_positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ServiceType, SignalAction};
    use rust_decimal_macros::dec;

    fn request(symbol: &str, asset_type: AssetType, entry: Decimal, stop: Decimal) -> ExecutionRequest {
        ExecutionRequest {
            signal_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            action: SignalAction::Buy,
            entry_price: entry,
            stop_price: stop,
            target_price: entry * dec!(1.04),
            confidence: 80.0,
            asset_type,
            service_type: ServiceType::All,
        }
    }

    fn ledger(max_daily_loss: Decimal) -> RiskLedger {
        RiskLedger::new(
            RiskLimits {
                max_daily_loss,
                ..Default::default()
            },
            PositionSizing::default(),
            dec!(100000),
        )
    }

    #[test]
    fn test_sizing_differs_by_asset_class() {
        let mut ledger = ledger(dec!(10000));

        let crypto = ledger
            .check_and_reserve(&request("BTC-USD", AssetType::Crypto, dec!(50000), dec!(49000)))
            .unwrap();
        let equity = ledger
            .check_and_reserve(&request("AAPL", AssetType::Equity, dec!(100), dec!(98)))
            .unwrap();

        // Defaults: crypto capped at 5000, equity at 10000.
        assert_eq!(crypto.notional, dec!(5000));
        assert_eq!(equity.notional, dec!(10000));
    }

    #[test]
    fn test_daily_loss_headroom_enforced() {
        // Equity sizing: 10_000 notional, 2% stop => 200 risk per signal.
        let mut ledger = ledger(dec!(500));

        ledger
            .check_and_reserve(&request("AAPL", AssetType::Equity, dec!(100), dec!(98)))
            .unwrap();
        ledger
            .check_and_reserve(&request("MSFT", AssetType::Equity, dec!(100), dec!(98)))
            .unwrap();

        // Third reservation would commit 600 > 500.
        let err = ledger
            .check_and_reserve(&request("NVDA", AssetType::Equity, dec!(100), dec!(98)))
            .unwrap_err();
        assert!(matches!(err, RiskViolation::DailyLossLimit { .. }));
        assert!(ledger.reserved_risk() <= dec!(500));
    }

    #[test]
    fn test_symbol_concentration_cap() {
        let mut ledger = RiskLedger::new(
            RiskLimits {
                max_daily_loss: dec!(100000),
                max_symbol_notional: dec!(15000),
                max_open_positions: 10,
            },
            PositionSizing::default(),
            dec!(100000),
        );

        ledger
            .check_and_reserve(&request("AAPL", AssetType::Equity, dec!(100), dec!(98)))
            .unwrap();
        let err = ledger
            .check_and_reserve(&request("AAPL", AssetType::Equity, dec!(100), dec!(98)))
            .unwrap_err();
        assert!(matches!(err, RiskViolation::SymbolConcentration { .. }));
    }

    #[test]
    fn test_release_restores_headroom() {
        let mut ledger = ledger(dec!(250));

        let reservation = ledger
            .check_and_reserve(&request("AAPL", AssetType::Equity, dec!(100), dec!(98)))
            .unwrap();
        assert_eq!(ledger.daily_headroom(), dec!(50));

        ledger.release(reservation.id);
        assert_eq!(ledger.daily_headroom(), dec!(250));

        // Headroom is usable again after the release.
        ledger
            .check_and_reserve(&request("MSFT", AssetType::Equity, dec!(100), dec!(98)))
            .unwrap();
    }

    #[test]
    fn test_confirm_keeps_risk_reserved() {
        let mut ledger = ledger(dec!(250));

        let reservation = ledger
            .check_and_reserve(&request("AAPL", AssetType::Equity, dec!(100), dec!(98)))
            .unwrap();
        ledger.confirm(reservation.id);

        assert_eq!(ledger.open_positions(), 1);
        assert_eq!(ledger.reserved_risk(), dec!(200));
        assert_eq!(ledger.daily_headroom(), dec!(50));
    }

    #[test]
    fn test_position_count_limit() {
        let mut ledger = RiskLedger::new(
            RiskLimits {
                max_daily_loss: dec!(100000),
                max_symbol_notional: dec!(100000),
                max_open_positions: 2,
            },
            PositionSizing::default(),
            dec!(100000),
        );

        for symbol in ["AAPL", "MSFT"] {
            ledger
                .check_and_reserve(&request(symbol, AssetType::Equity, dec!(100), dec!(98)))
                .unwrap();
        }
        let err = ledger
            .check_and_reserve(&request("NVDA", AssetType::Equity, dec!(100), dec!(98)))
            .unwrap_err();
        assert!(matches!(err, RiskViolation::TooManyPositions { .. }));
    }
}
