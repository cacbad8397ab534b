//! Executor account configuration.

use crate::risk::{PositionSizing, RiskLedger, RiskLimits};
use common::{AssetType, ServiceType};
use distribution::{ExecutorProfile, SessionPolicy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Full configuration for one executor account, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub executor_id: String,
    pub service_type: ServiceType,
    /// Minimum signal confidence (0-100) this account accepts.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    pub supported_assets: Vec<AssetType>,
    pub session_policy: SessionPolicy,
    pub account_equity: Decimal,
    #[serde(default)]
    pub risk_limits: RiskLimits,
    #[serde(default)]
    pub sizing: PositionSizing,
}

fn default_confidence_threshold() -> f64 {
    65.0
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            executor_id: "exec-standard".to_string(),
            service_type: ServiceType::Standard,
            confidence_threshold: default_confidence_threshold(),
            supported_assets: vec![AssetType::Equity, AssetType::Crypto],
            session_policy: SessionPolicy::MarketHoursOnly,
            account_equity: Decimal::new(100_000, 0),
            risk_limits: RiskLimits::default(),
            sizing: PositionSizing::default(),
        }
    }
}

impl ExecutorConfig {
    /// The distributor-facing view of this account.
    pub fn profile(&self) -> ExecutorProfile {
        ExecutorProfile {
            executor_id: self.executor_id.clone(),
            service_type: self.service_type,
            confidence_threshold: self.confidence_threshold,
            supported_assets: self.supported_assets.clone(),
            session_policy: self.session_policy,
        }
    }

    /// A fresh risk ledger for this account.
    pub fn risk_ledger(&self) -> RiskLedger {
        RiskLedger::new(
            self.risk_limits.clone(),
            self.sizing.clone(),
            self.account_equity,
        )
    }
}

/// Load an executor configuration from a TOML file.
pub fn load_config(path: &str) -> anyhow::Result<ExecutorConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ExecutorConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save an executor configuration to a TOML file.
pub fn save_config(config: &ExecutorConfig, path: &str) -> anyhow::Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
