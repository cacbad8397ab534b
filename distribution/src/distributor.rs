//! Fan-out of committed signals to executor accounts.
//!
//! Each eligible executor gets its own bounded, individually timed-out
//! delivery task; one account's failure or slowness never delays the
//! others. Transport failures and timeouts are retried with bounded
//! exponential backoff, explicit rejections are terminal.

use crate::error::DistributionError;
use crate::log::{AttemptOutcome, DistributionLog};
use crate::session::{SessionCalendar, SessionPolicy};
use chrono::{DateTime, Utc};
use common::{AssetType, ExecutionRequest, ExecutionResponse, ExecutorEndpoint, ServiceType, Signal};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Static description of one executor account known to the distributor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorProfile {
    pub executor_id: String,
    /// Pool type of this account; a signal's `service_type` must allow it.
    pub service_type: ServiceType,
    /// Minimum signal confidence (0-100) this account accepts.
    pub confidence_threshold: f64,
    pub supported_assets: Vec<AssetType>,
    pub session_policy: SessionPolicy,
}

/// Why an executor was skipped without a delivery attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error("asset type not supported")]
    UnsupportedAsset,
    #[error("confidence {confidence} below threshold {threshold}")]
    BelowThreshold { confidence: f64, threshold: f64 },
    #[error("signal addressed to a different executor pool")]
    WrongPool,
    #[error("venue session closed and account has no all-hours override")]
    SessionClosed,
}

#[derive(Debug, Clone)]
pub struct DistributorConfig {
    /// Upper bound on concurrent delivery tasks.
    pub max_concurrent: usize,
    /// Deadline for each individual delivery attempt.
    pub request_timeout: Duration,
    /// Delivery attempts per executor before the failure is surfaced.
    pub max_attempts: u32,
    /// First backoff delay; doubles per retry.
    pub initial_backoff: Duration,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            request_timeout: Duration::from_secs(5),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

/// Delivery result for one executor.
#[derive(Debug)]
pub struct DeliveryOutcome {
    pub executor_id: String,
    pub result: Result<ExecutionResponse, DistributionError>,
}

pub struct SignalDistributor {
    config: DistributorConfig,
    calendar: SessionCalendar,
    executors: Vec<(ExecutorProfile, Arc<dyn ExecutorEndpoint>)>,
    log: Arc<DistributionLog>,
}

impl SignalDistributor {
    pub fn new(config: DistributorConfig, calendar: SessionCalendar) -> Self {
        Self {
            config,
            calendar,
            executors: Vec::new(),
            log: Arc::new(DistributionLog::new()),
        }
    }

    pub fn add_executor(
        mut self,
        profile: ExecutorProfile,
        endpoint: Arc<dyn ExecutorEndpoint>,
    ) -> Self {
        info!(executor_id = %profile.executor_id, "Registering executor");
        self.executors.push((profile, endpoint));
        self
    }

    pub fn log(&self) -> Arc<DistributionLog> {
        self.log.clone()
    }

    /// Eligibility of one executor for a signal at a given instant.
    pub fn eligibility(
        &self,
        profile: &ExecutorProfile,
        signal: &Signal,
        at: DateTime<Utc>,
    ) -> Result<(), SkipReason> {
        if !profile.supported_assets.contains(&signal.asset_type) {
            return Err(SkipReason::UnsupportedAsset);
        }
        if signal.confidence < profile.confidence_threshold {
            return Err(SkipReason::BelowThreshold {
                confidence: signal.confidence,
                threshold: profile.confidence_threshold,
            });
        }
        if !signal.service_type.allows(profile.service_type) {
            return Err(SkipReason::WrongPool);
        }
        let in_session = profile.session_policy == SessionPolicy::AllHours
            || self.calendar.asset_in_session(signal.asset_type, at);
        if !in_session {
            return Err(SkipReason::SessionClosed);
        }
        Ok(())
    }

    /// Fan a signal out to every eligible executor and wait for all
    /// deliveries to settle.
    pub async fn distribute(&self, signal: &Signal) -> Vec<DeliveryOutcome> {
        self.distribute_at(signal, Utc::now()).await
    }

    /// `distribute` with an explicit session-evaluation instant.
    pub async fn distribute_at(&self, signal: &Signal, at: DateTime<Utc>) -> Vec<DeliveryOutcome> {
        let request = ExecutionRequest::from(signal);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let mut tasks = Vec::new();

        for (profile, endpoint) in &self.executors {
            if let Err(skip) = self.eligibility(profile, signal, at) {
                debug!(
                    signal_id = %signal.signal_id,
                    executor_id = %profile.executor_id,
                    reason = %skip,
                    "Executor skipped"
                );
                self.log.record(
                    signal.signal_id,
                    &profile.executor_id,
                    0,
                    AttemptOutcome::Skipped {
                        reason: skip.to_string(),
                    },
                );
                continue;
            }

            let executor_id = profile.executor_id.clone();
            let endpoint = endpoint.clone();
            let request = request.clone();
            let config = self.config.clone();
            let log = self.log.clone();
            let semaphore = semaphore.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await;
                let result = deliver_with_retry(endpoint, &executor_id, request, &config, &log).await;
                DeliveryOutcome {
                    executor_id,
                    result,
                }
            }));
        }

        let mut outcomes = Vec::new();
        for task in join_all(tasks).await {
            match task {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "Delivery task panicked"),
            }
        }
        outcomes
    }
}

/// Deliver one request to one executor with per-attempt deadlines and
/// bounded exponential backoff. Every attempt is recorded in the log.
async fn deliver_with_retry(
    endpoint: Arc<dyn ExecutorEndpoint>,
    executor_id: &str,
    request: ExecutionRequest,
    config: &DistributorConfig,
    log: &DistributionLog,
) -> Result<ExecutionResponse, DistributionError> {
    let signal_id = request.signal_id;
    let mut backoff = config.initial_backoff;
    let mut last_failure: Option<DistributionError> = None;

    for attempt in 1..=config.max_attempts {
        match tokio::time::timeout(config.request_timeout, endpoint.execute(request.clone())).await
        {
            Ok(Ok(response)) => {
                let outcome = if response.is_accepted() {
                    AttemptOutcome::Accepted {
                        order_id: response.order_id.clone(),
                    }
                } else {
                    AttemptOutcome::Rejected {
                        reason: response
                            .reason
                            .clone()
                            .unwrap_or_else(|| "unspecified".to_string()),
                    }
                };
                log.record(signal_id, executor_id, attempt, outcome);
                // Rejections are a decision, not a failure: never retried.
                return Ok(response);
            }
            Ok(Err(e)) => {
                let reason = e.to_string();
                warn!(
                    signal_id = %signal_id,
                    executor_id,
                    attempt,
                    error = %reason,
                    "Delivery transport failure"
                );
                log.record(
                    signal_id,
                    executor_id,
                    attempt,
                    AttemptOutcome::TransportError {
                        reason: reason.clone(),
                    },
                );
                last_failure = Some(DistributionError::Transport {
                    executor_id: executor_id.to_string(),
                    reason,
                });
            }
            Err(_) => {
                warn!(signal_id = %signal_id, executor_id, attempt, "Delivery attempt timed out");
                log.record(signal_id, executor_id, attempt, AttemptOutcome::TimedOut);
                last_failure = Some(DistributionError::Timeout {
                    executor_id: executor_id.to_string(),
                    attempts: attempt,
                });
            }
        }

        if attempt < config.max_attempts {
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }

    // Surface whatever the final attempt ran into.
    Err(last_failure.unwrap_or_else(|| DistributionError::Timeout {
        executor_id: executor_id.to_string(),
        attempts: config.max_attempts,
    }))
}
