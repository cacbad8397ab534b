// Signal Generation (Layer 1)
// Collects per-source market votes, aggregates them into a weighted
// consensus and commits qualifying signals to the ledger

pub mod aggregator;
pub mod generator;
pub mod sources;

pub use aggregator::{aggregate, AdaptiveWeights, Consensus, WeightConfig};
pub use generator::{GeneratorConfig, SignalGenerator};
pub use sources::{MarketSource, SourceError, SourceHealth, SourceRegistry, SourceVote};
