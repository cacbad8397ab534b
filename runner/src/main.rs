//! Pipeline runner: simulated sources -> generator -> ledger ->
//! distributor -> paper-traded executor accounts, with periodic chain
//! verification.

use common::{AssetType, ServiceType, SignalAction};
use distribution::{DistributorConfig, SessionCalendar, SessionPolicy, SignalDistributor};
use execution::{ExecutorConfig, PaperBroker, TradingExecutor};
use monitoring::IntegrityMonitor;
use rust_decimal::Decimal;
use signal_generation::{
    AdaptiveWeights, GeneratorConfig, MarketSource, SignalGenerator, SourceError, SourceHealth,
    SourceRegistry, SourceVote,
};
use signal_ledger::{InMemoryLedger, SignalLedger};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{error, info};

/// How often the integrity monitor re-verifies the full chain.
const VERIFY_INTERVAL: Duration = Duration::from_secs(60);

/// Simulated market feed with a directional bias, for paper trading.
struct SimulatedFeed {
    name: String,
    buy_bias_pct: u8,
    base_price: Decimal,
}

#[async_trait::async_trait]
impl MarketSource for SimulatedFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _symbol: &str) -> Result<SourceVote, SourceError> {
        let direction = if fastrand::u8(0..100) < self.buy_bias_pct {
            SignalAction::Buy
        } else {
            SignalAction::Sell
        };
        let jitter = Decimal::new(fastrand::i64(-500..=500), 2);
        Ok(SourceVote {
            source: self.name.clone(),
            direction,
            confidence: 55.0 + fastrand::f64() * 40.0,
            last_price: Some(self.base_price + jitter),
        })
    }

    fn health(&self) -> SourceHealth {
        SourceHealth::Healthy
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::init_logging();

    let ledger: Arc<InMemoryLedger> = Arc::new(InMemoryLedger::new());

    let registry = Arc::new(
        SourceRegistry::new()
            .register(Arc::new(SimulatedFeed {
                name: "trend-feed".to_string(),
                buy_bias_pct: 70,
                base_price: Decimal::new(65_000, 0),
            }))
            .register(Arc::new(SimulatedFeed {
                name: "momentum-feed".to_string(),
                buy_bias_pct: 55,
                base_price: Decimal::new(65_000, 0),
            }))
            .register(Arc::new(SimulatedFeed {
                name: "orderflow-feed".to_string(),
                buy_bias_pct: 40,
                base_price: Decimal::new(65_000, 0),
            })),
    );
    let weights = Arc::new(RwLock::new(AdaptiveWeights::default()));

    // Two independently governed accounts: a standard pool and a stricter
    // prop-firm pool on the same simulated brokerage.
    let broker = Arc::new(PaperBroker::new(Decimal::new(250_000, 0)));

    let standard = ExecutorConfig::default();
    let prop_firm = ExecutorConfig {
        executor_id: "exec-prop-firm".to_string(),
        service_type: ServiceType::PropFirm,
        confidence_threshold: 80.0,
        supported_assets: vec![AssetType::Crypto],
        session_policy: SessionPolicy::AllHours,
        ..Default::default()
    };

    let distributor = Arc::new(
        SignalDistributor::new(DistributorConfig::default(), SessionCalendar::default())
            .add_executor(
                standard.profile(),
                Arc::new(TradingExecutor::new(
                    standard.executor_id.clone(),
                    standard.risk_ledger(),
                    broker.clone(),
                    ledger.clone(),
                )),
            )
            .add_executor(
                prop_firm.profile(),
                Arc::new(TradingExecutor::new(
                    prop_firm.executor_id.clone(),
                    prop_firm.risk_ledger(),
                    broker.clone(),
                    ledger.clone(),
                )),
            ),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, initiating shutdown");
                let _ = shutdown_tx.send(true);
            }
        });
    }

    let symbols = [("BTC-USD", AssetType::Crypto), ("ETH-USD", AssetType::Crypto)];
    let mut workers = Vec::new();

    for (symbol, asset_type) in symbols {
        let generator = SignalGenerator::new(
            GeneratorConfig {
                cycle_interval: Duration::from_secs(10),
                min_emission_confidence: 65.0,
                ..Default::default()
            },
            registry.clone(),
            weights.clone(),
            ledger.clone(),
        );
        let distributor = distributor.clone();
        let mut shutdown = shutdown_rx.clone();

        workers.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        // The in-flight cycle and its fan-out always finish
                        // before shutdown is observed.
                        match generator.run_cycle(symbol, asset_type).await {
                            Ok(Some(signal)) => {
                                let outcomes = distributor.distribute(&signal).await;
                                info!(
                                    symbol,
                                    signal_id = %signal.signal_id,
                                    deliveries = outcomes.len(),
                                    "Signal distributed"
                                );
                            }
                            Ok(None) => {}
                            Err(e) => error!(symbol, error = %e, "Generation cycle failed"),
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
        }));
    }

    // Periodic tamper check over the full chain.
    let monitor = IntegrityMonitor::new(ledger.clone() as Arc<dyn SignalLedger>);
    let mut verify_shutdown = shutdown_rx.clone();
    let verifier = tokio::spawn(async move {
        let mut interval = tokio::time::interval(VERIFY_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match monitor.verify_full().await {
                        Ok(report) if !report.is_clean() => {
                            error!(
                                report = %serde_json::to_string(&report).unwrap_or_default(),
                                "Ledger failed verification; manual remediation required"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "Verification pass failed"),
                    }
                }
                changed = verify_shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if *verify_shutdown.borrow() {
                break;
            }
        }
    });

    for worker in workers {
        let _ = worker.await;
    }
    let _ = verifier.await;

    // Final report for the archival/alerting side.
    let monitor = IntegrityMonitor::new(ledger.clone() as Arc<dyn SignalLedger>);
    let report = monitor.verify_full().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    info!(signals = ledger.len().await, "Pipeline stopped");

    Ok(())
}
