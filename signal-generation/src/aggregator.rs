//! Weighted-consensus aggregation with adaptive per-source weights.

use crate::sources::SourceVote;
use common::SignalAction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Settings for the adaptive weight manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightConfig {
    /// Exponential decay factor applied per realized outcome (0 < decay < 1).
    /// Higher values remember accuracy history longer.
    pub decay: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self { decay: 0.9 }
    }
}

/// Per-source weights driven by realized-outcome accuracy.
///
/// This is an explicit context object handed to the aggregation call;
/// there is no process-wide weight state. Weights move toward sources
/// whose signals turned out correct and are renormalized to sum to 1
/// after every update. A source that merely times out or errors in a
/// cycle is not penalized here.
#[derive(Debug, Clone)]
pub struct AdaptiveWeights {
    config: WeightConfig,
    weights: HashMap<String, f64>,
}

impl AdaptiveWeights {
    pub fn new(config: WeightConfig) -> Self {
        Self {
            config,
            weights: HashMap::new(),
        }
    }

    /// Weight of a source. Sources without recorded outcomes weigh 1.0;
    /// only relative weights matter within one aggregation because the
    /// consensus normalizes by the participating weight sum.
    pub fn weight_of(&self, source: &str) -> f64 {
        self.weights.get(source).copied().unwrap_or(1.0)
    }

    /// Record whether a source's past vote turned out accurate, decay its
    /// weight toward that outcome and renormalize the tracked set to sum 1.
    pub fn record_outcome(&mut self, source: &str, accurate: bool) {
        let decay = self.config.decay;
        let current = self.weight_of(source);
        let target = if accurate { 1.0 } else { 0.0 };
        let updated = decay * current + (1.0 - decay) * target;
        self.weights.insert(source.to_string(), updated.max(f64::MIN_POSITIVE));

        let sum: f64 = self.weights.values().sum();
        if sum > 0.0 {
            for weight in self.weights.values_mut() {
                *weight /= sum;
            }
        }

        debug!(source, accurate, "Updated source weight");
    }

    /// Sum of all tracked weights (1.0 once any outcome has been recorded).
    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }
}

impl Default for AdaptiveWeights {
    fn default() -> Self {
        Self::new(WeightConfig::default())
    }
}

/// The aggregator's combined decision for one symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Consensus {
    pub direction: SignalAction,
    /// Weighted-average confidence of the winning side, 0 to 100.
    pub confidence: f64,
}

impl Consensus {
    fn neutral() -> Self {
        Self {
            direction: SignalAction::Neutral,
            confidence: 0.0,
        }
    }
}

/// Combine per-source votes into one weighted-consensus decision.
///
/// A degenerate single-vote input passes through unchanged: a lone source
/// must never be coerced into Neutral just because it is alone. A Buy/Sell
/// tie of equal weighted confidence resolves to Neutral.
pub fn aggregate(votes: &[SourceVote], weights: &AdaptiveWeights) -> Consensus {
    match votes {
        [] => Consensus::neutral(),
        [only] => Consensus {
            direction: only.direction,
            confidence: only.confidence,
        },
        _ => {
            let mut buy_score = 0.0;
            let mut buy_weight = 0.0;
            let mut sell_score = 0.0;
            let mut sell_weight = 0.0;

            for vote in votes {
                let weight = weights.weight_of(&vote.source);
                match vote.direction {
                    SignalAction::Buy => {
                        buy_score += weight * vote.confidence;
                        buy_weight += weight;
                    }
                    SignalAction::Sell => {
                        sell_score += weight * vote.confidence;
                        sell_weight += weight;
                    }
                    // Neutral votes express no direction and carry no score.
                    SignalAction::Neutral => {}
                }
            }

            if buy_score == sell_score {
                return Consensus::neutral();
            }

            let (direction, score, weight) = if buy_score > sell_score {
                (SignalAction::Buy, buy_score, buy_weight)
            } else {
                (SignalAction::Sell, sell_score, sell_weight)
            };

            Consensus {
                direction,
                confidence: score / weight,
            }
        }
    }
}
