//! Source adapter interface and registry.
//!
//! Every venue feed implements one fixed capability interface and is
//! registered explicitly; the generator never discovers adapters at runtime.

use common::SignalAction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One source's directional opinion for a symbol at one instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceVote {
    pub source: String,
    pub direction: SignalAction,
    /// Directional confidence, 0 to 100.
    pub confidence: f64,
    /// Last observed trade/quote price, when the feed carries one.
    pub last_price: Option<Decimal>,
}

/// Errors a source can surface during a fetch.
///
/// All variants are transient: the source is excluded from the current
/// cycle only and its weight is unaffected (weights track realized-outcome
/// accuracy, not availability).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("source timed out")]
    Timeout,
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed source payload: {0}")]
    Malformed(String),
}

/// Self-reported source health, exposed for operational visibility.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceHealth {
    Healthy,
    Degraded,
    Down,
}

/// A market data source adapter.
#[async_trait::async_trait]
pub trait MarketSource: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a directional vote for the given symbol.
    async fn fetch(&self, symbol: &str) -> Result<SourceVote, SourceError>;

    fn health(&self) -> SourceHealth;
}

/// Explicitly registered set of source adapters.
pub struct SourceRegistry {
    sources: Vec<Arc<dyn MarketSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    pub fn register(mut self, source: Arc<dyn MarketSource>) -> Self {
        tracing::info!(source = source.name(), "Registering market source");
        self.sources.push(source);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn MarketSource>> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource;

    #[async_trait::async_trait]
    impl MarketSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch(&self, _symbol: &str) -> Result<SourceVote, SourceError> {
            Ok(SourceVote {
                source: "fixed".to_string(),
                direction: SignalAction::Buy,
                confidence: 80.0,
                last_price: None,
            })
        }

        fn health(&self) -> SourceHealth {
            SourceHealth::Healthy
        }
    }

    #[tokio::test]
    async fn test_registry_registration() {
        let registry = SourceRegistry::new().register(Arc::new(FixedSource));
        assert_eq!(registry.len(), 1);

        let vote = registry
            .iter()
            .next()
            .unwrap()
            .fetch("AAPL")
            .await
            .unwrap();
        assert_eq!(vote.direction, SignalAction::Buy);
    }
}
