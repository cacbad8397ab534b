//! Signal generator: drives the per-symbol aggregation cycle and commits
//! qualifying candidates to the ledger.

use crate::aggregator::{aggregate, AdaptiveWeights};
use crate::sources::{SourceRegistry, SourceVote};
use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use common::{AssetType, ServiceType, Signal, SignalAction, SignalCandidate};
use futures::future::join_all;
use rust_decimal::Decimal;
use signal_ledger::{LedgerError, SignalLedger};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Configuration for the generation cycle.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Time between cycles for one symbol.
    pub cycle_interval: Duration,
    /// Per-source fetch deadline within a cycle.
    pub source_timeout: Duration,
    /// Minimum consensus confidence (0-100) required to emit a signal.
    pub min_emission_confidence: f64,
    /// Stop distance as a fraction of entry price.
    pub stop_fraction: Decimal,
    /// Target distance as a fraction of entry price.
    pub target_fraction: Decimal,
    /// Bounded retries when an append loses the race for the chain tail.
    pub max_append_retries: u32,
    /// Soft retention marker horizon; None leaves the marker unset.
    pub retention_days: Option<i64>,
    /// Which executor pool(s) emitted signals are addressed to.
    pub service_type: ServiceType,
    pub strategy: String,
    pub regime: String,
    pub generated_by: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(30),
            source_timeout: Duration::from_secs(2),
            min_emission_confidence: 60.0,
            stop_fraction: Decimal::new(2, 2),   // 2%
            target_fraction: Decimal::new(4, 2), // 4%
            max_append_retries: 3,
            retention_days: Some(365),
            service_type: ServiceType::All,
            strategy: "weighted-consensus".to_string(),
            regime: "unclassified".to_string(),
            generated_by: "signal-generator".to_string(),
        }
    }
}

/// Drives one continuous generation cycle per tracked symbol.
pub struct SignalGenerator {
    config: GeneratorConfig,
    registry: Arc<SourceRegistry>,
    weights: Arc<RwLock<AdaptiveWeights>>,
    ledger: Arc<dyn SignalLedger>,
}

impl SignalGenerator {
    pub fn new(
        config: GeneratorConfig,
        registry: Arc<SourceRegistry>,
        weights: Arc<RwLock<AdaptiveWeights>>,
        ledger: Arc<dyn SignalLedger>,
    ) -> Self {
        Self {
            config,
            registry,
            weights,
            ledger,
        }
    }

    /// Run cycles for one symbol until shutdown is requested.
    ///
    /// Shutdown is only observed between cycles: an in-flight cycle always
    /// completes, so a partially built signal is never left behind.
    pub async fn run(
        &self,
        symbol: &str,
        asset_type: AssetType,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(self.config.cycle_interval);
        info!(symbol, "Starting generation cycle");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_cycle(symbol, asset_type).await {
                        error!(symbol, error = %e, "Generation cycle failed");
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() {
                        break;
                    }
                }
            }

            if *shutdown.borrow() {
                break;
            }
        }
        info!(symbol, "Generation cycle stopped");
    }

    /// One cycle: collect votes, aggregate, emit if the consensus clears
    /// the emission floor.
    pub async fn run_cycle(&self, symbol: &str, asset_type: AssetType) -> Result<Option<Signal>> {
        let votes = self.collect_votes(symbol).await;
        if votes.is_empty() {
            debug!(symbol, "No source votes this cycle");
            return Ok(None);
        }

        let consensus = {
            let weights = self.weights.read().await;
            aggregate(&votes, &weights)
        };

        if consensus.direction == SignalAction::Neutral
            || consensus.confidence < self.config.min_emission_confidence
        {
            debug!(
                symbol,
                direction = consensus.direction.as_str(),
                confidence = consensus.confidence,
                "Consensus below emission floor"
            );
            return Ok(None);
        }

        let Some(entry_price) = mean_price(&votes) else {
            warn!(symbol, "No source carried a price; skipping emission");
            return Ok(None);
        };

        let candidate = self.build_candidate(symbol, asset_type, consensus.direction, consensus.confidence, entry_price, &votes);
        let signal = self.append_with_retry(candidate).await?;

        info!(
            symbol,
            signal_id = %signal.signal_id,
            chain_index = signal.chain_index,
            action = signal.action.as_str(),
            confidence = signal.confidence,
            "Emitted signal"
        );
        Ok(Some(signal))
    }

    async fn collect_votes(&self, symbol: &str) -> Vec<SourceVote> {
        let fetches = self.registry.iter().map(|source| {
            let source = source.clone();
            let symbol = symbol.to_string();
            let deadline = self.config.source_timeout;
            async move {
                let name = source.name().to_string();
                match tokio::time::timeout(deadline, source.fetch(&symbol)).await {
                    Ok(Ok(vote)) => Some(vote),
                    Ok(Err(e)) => {
                        // Transient: excluded from this cycle only.
                        warn!(source = %name, symbol, error = %e, "Source excluded from cycle");
                        None
                    }
                    Err(_) => {
                        warn!(source = %name, symbol, "Source timed out; excluded from cycle");
                        None
                    }
                }
            }
        });

        join_all(fetches).await.into_iter().flatten().collect()
    }

    fn build_candidate(
        &self,
        symbol: &str,
        asset_type: AssetType,
        action: SignalAction,
        confidence: f64,
        entry_price: Decimal,
        votes: &[SourceVote],
    ) -> SignalCandidate {
        let (stop_price, target_price) = match action {
            SignalAction::Sell => (
                entry_price * (Decimal::ONE + self.config.stop_fraction),
                entry_price * (Decimal::ONE - self.config.target_fraction),
            ),
            _ => (
                entry_price * (Decimal::ONE - self.config.stop_fraction),
                entry_price * (Decimal::ONE + self.config.target_fraction),
            ),
        };

        let contributors: Vec<&str> = votes.iter().map(|v| v.source.as_str()).collect();
        let now = Utc::now();

        SignalCandidate {
            signal_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            action,
            entry_price,
            stop_price,
            target_price,
            confidence,
            asset_type,
            service_type: self.config.service_type,
            strategy: self.config.strategy.clone(),
            regime: self.config.regime.clone(),
            reasoning: format!(
                "{} consensus from {} source(s): {}",
                action.as_str(),
                votes.len(),
                contributors.join(", ")
            ),
            generated_by: self.config.generated_by.clone(),
            timestamp: now,
            retention_expires_at: self
                .config
                .retention_days
                .map(|days| now + ChronoDuration::days(days)),
        }
    }

    async fn append_with_retry(&self, candidate: SignalCandidate) -> Result<Signal> {
        let mut attempts = 0;
        loop {
            match self.ledger.append(candidate.clone()).await {
                Ok(signal) => return Ok(signal),
                Err(LedgerError::ChainConflict { expected, found })
                    if attempts < self.config.max_append_retries =>
                {
                    attempts += 1;
                    debug!(
                        signal_id = %candidate.signal_id,
                        expected, found, attempts,
                        "Append lost tail race; retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Mean of the prices the votes carry, if any.
fn mean_price(votes: &[SourceVote]) -> Option<Decimal> {
    let prices: Vec<Decimal> = votes.iter().filter_map(|v| v.last_price).collect();
    if prices.is_empty() {
        return None;
    }
    let sum: Decimal = prices.iter().sum();
    Some(sum / Decimal::from(prices.len() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::WeightConfig;
    use crate::sources::{MarketSource, SourceError, SourceHealth};
    use rust_decimal_macros::dec;
    use signal_ledger::InMemoryLedger;

    struct StaticSource {
        name: String,
        direction: SignalAction,
        confidence: f64,
        price: Option<Decimal>,
    }

    #[async_trait::async_trait]
    impl MarketSource for StaticSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self, _symbol: &str) -> Result<SourceVote, SourceError> {
            Ok(SourceVote {
                source: self.name.clone(),
                direction: self.direction,
                confidence: self.confidence,
                last_price: self.price,
            })
        }

        fn health(&self) -> SourceHealth {
            SourceHealth::Healthy
        }
    }

    struct FailingSource;

    #[async_trait::async_trait]
    impl MarketSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch(&self, _symbol: &str) -> Result<SourceVote, SourceError> {
            Err(SourceError::Unavailable("connection refused".to_string()))
        }

        fn health(&self) -> SourceHealth {
            SourceHealth::Down
        }
    }

    struct SlowSource;

    #[async_trait::async_trait]
    impl MarketSource for SlowSource {
        fn name(&self) -> &str {
            "slow"
        }

        async fn fetch(&self, _symbol: &str) -> Result<SourceVote, SourceError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            unreachable!("cut off by the cycle timeout")
        }

        fn health(&self) -> SourceHealth {
            SourceHealth::Degraded
        }
    }

    fn generator(registry: SourceRegistry, ledger: Arc<InMemoryLedger>) -> SignalGenerator {
        let config = GeneratorConfig {
            source_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        SignalGenerator::new(
            config,
            Arc::new(registry),
            Arc::new(RwLock::new(AdaptiveWeights::new(WeightConfig::default()))),
            ledger,
        )
    }

    #[tokio::test]
    async fn test_single_source_emits_unchanged() {
        // A lone BUY/80 source yields a BUY/80 signal, not Neutral.
        let ledger = Arc::new(InMemoryLedger::new());
        let registry = SourceRegistry::new().register(Arc::new(StaticSource {
            name: "alpha".to_string(),
            direction: SignalAction::Buy,
            confidence: 80.0,
            price: Some(dec!(100)),
        }));

        let signal = generator(registry, ledger.clone())
            .run_cycle("AAPL", AssetType::Equity)
            .await
            .unwrap()
            .expect("signal emitted");

        assert_eq!(signal.action, SignalAction::Buy);
        assert_eq!(signal.confidence, 80.0);
        assert_eq!(signal.chain_index, 0);
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_and_slow_sources_excluded() {
        let ledger = Arc::new(InMemoryLedger::new());
        let registry = SourceRegistry::new()
            .register(Arc::new(FailingSource))
            .register(Arc::new(SlowSource))
            .register(Arc::new(StaticSource {
                name: "alpha".to_string(),
                direction: SignalAction::Sell,
                confidence: 90.0,
                price: Some(dec!(250)),
            }));

        let signal = generator(registry, ledger)
            .run_cycle("TSLA", AssetType::Equity)
            .await
            .unwrap()
            .expect("healthy source still emits");

        // Only the healthy vote contributed; sell stop sits above entry.
        assert_eq!(signal.action, SignalAction::Sell);
        assert!(signal.stop_price > signal.entry_price);
        assert!(signal.target_price < signal.entry_price);
    }

    #[tokio::test]
    async fn test_below_floor_is_not_appended() {
        let ledger = Arc::new(InMemoryLedger::new());
        let registry = SourceRegistry::new().register(Arc::new(StaticSource {
            name: "alpha".to_string(),
            direction: SignalAction::Buy,
            confidence: 40.0,
            price: Some(dec!(10)),
        }));

        let result = generator(registry, ledger.clone())
            .run_cycle("DOGE-USD", AssetType::Crypto)
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_tied_consensus_is_not_emitted() {
        let ledger = Arc::new(InMemoryLedger::new());
        let registry = SourceRegistry::new()
            .register(Arc::new(StaticSource {
                name: "alpha".to_string(),
                direction: SignalAction::Buy,
                confidence: 75.0,
                price: Some(dec!(50)),
            }))
            .register(Arc::new(StaticSource {
                name: "beta".to_string(),
                direction: SignalAction::Sell,
                confidence: 75.0,
                price: Some(dec!(50)),
            }));

        let result = generator(registry, ledger.clone())
            .run_cycle("ETH-USD", AssetType::Crypto)
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_priceless_votes_skip_emission() {
        let ledger = Arc::new(InMemoryLedger::new());
        let registry = SourceRegistry::new().register(Arc::new(StaticSource {
            name: "alpha".to_string(),
            direction: SignalAction::Buy,
            confidence: 95.0,
            price: None,
        }));

        let result = generator(registry, ledger.clone())
            .run_cycle("AAPL", AssetType::Equity)
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_run_honors_shutdown() {
        let ledger = Arc::new(InMemoryLedger::new());
        let registry = SourceRegistry::new().register(Arc::new(StaticSource {
            name: "alpha".to_string(),
            direction: SignalAction::Buy,
            confidence: 80.0,
            price: Some(dec!(100)),
        }));

        let config = GeneratorConfig {
            cycle_interval: Duration::from_millis(10),
            source_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let generator = Arc::new(SignalGenerator::new(
            config,
            Arc::new(registry),
            Arc::new(RwLock::new(AdaptiveWeights::default())),
            ledger.clone(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = {
            let generator = generator.clone();
            tokio::spawn(async move {
                generator.run("BTC-USD", AssetType::Crypto, shutdown_rx).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .expect("run loop exits after shutdown")
            .unwrap();

        assert!(ledger.len().await >= 1);
    }

    #[tokio::test]
    async fn test_run_stops_when_shutdown_sender_dropped() {
        let ledger = Arc::new(InMemoryLedger::new());
        let registry = SourceRegistry::new().register(Arc::new(StaticSource {
            name: "alpha".to_string(),
            direction: SignalAction::Buy,
            confidence: 80.0,
            price: Some(dec!(100)),
        }));

        let generator = Arc::new(SignalGenerator::new(
            GeneratorConfig {
                cycle_interval: Duration::from_millis(10),
                source_timeout: Duration::from_millis(50),
                ..Default::default()
            },
            Arc::new(registry),
            Arc::new(RwLock::new(AdaptiveWeights::default())),
            ledger,
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = {
            let generator = generator.clone();
            tokio::spawn(async move {
                generator.run("BTC-USD", AssetType::Crypto, shutdown_rx).await;
            })
        };

        // Dropping the sender without ever signalling must still stop the loop.
        drop(shutdown_tx);
        tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .expect("run loop exits when the channel closes")
            .unwrap();
    }
}
