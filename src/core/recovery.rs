//! Bounded, delayed re-initialization after faults
//!
//! # Architecture
//!
//! ```text
//! fault channel ──► handle(error)
//!                     │ Error alert
//!                     │ attempts >= max ──► swallowed (operator must act)
//!                     │ attempts += 1, persist
//!                     │ attempts == max ──► Manual Intervention alert (once)
//!                     │ sleep(retry delay)
//!                     ▼
//!             ServiceInitializer::initialize ──err──► loop with the new error
//! ```
//!
//! `recovery_attempts` is only reset by a successful full initialization,
//! which is the initializer's job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use crate::adapters::traits::Notifier;
use crate::adapters::types::AlertCategory;
use crate::config::RecoveryConfig;
use crate::core::channels::EngineFault;
use crate::core::state::StateHandle;
use crate::error::AppError;

/// Full service (re)initialization
#[async_trait]
pub trait ServiceInitializer: Send + Sync {
    async fn initialize(&self) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Recovered,
    /// Retries exhausted; the fault was alerted and dropped
    Exhausted,
}

pub struct RecoverySupervisor {
    initializer: Arc<dyn ServiceInitializer>,
    state: StateHandle,
    notifier: Arc<dyn Notifier>,
    max_retries: u32,
    retry_delay: Duration,
}

impl RecoverySupervisor {
    pub fn new(
        config: &RecoveryConfig,
        initializer: Arc<dyn ServiceInitializer>,
        state: StateHandle,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            initializer,
            state,
            notifier,
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        }
    }

    pub async fn handle(&self, err: AppError) -> RecoveryOutcome {
        let mut err = err;
        loop {
            error!(error = %err, "[RECOVERY] Handling fault");
            self.notifier
                .notify(AlertCategory::Error, &err.to_string())
                .await;

            let max = self.max_retries;
            let attempt = self
                .state
                .update(|s| {
                    if s.recovery_attempts >= max {
                        None
                    } else {
                        s.recovery_attempts += 1;
                        Some(s.recovery_attempts)
                    }
                })
                .await;

            let Some(attempt) = attempt else {
                warn!(max_retries = max, "[RECOVERY] Retries exhausted, waiting for operator");
                return RecoveryOutcome::Exhausted;
            };

            if attempt == max {
                self.notifier
                    .notify(
                        AlertCategory::ManualIntervention,
                        &format!(
                            "Recovery attempt {}/{} in progress; automatic recovery stops after this one. Last error: {}",
                            attempt, max, err
                        ),
                    )
                    .await;
            }

            info!(
                attempt = attempt,
                max_retries = max,
                delay_secs = self.retry_delay.as_secs(),
                "[RECOVERY] Re-initializing after delay"
            );
            tokio::time::sleep(self.retry_delay).await;

            match self.initializer.initialize().await {
                Ok(()) => {
                    info!(attempt = attempt, "[RECOVERY] Re-initialization succeeded");
                    return RecoveryOutcome::Recovered;
                }
                Err(e) => err = e,
            }
        }
    }

    /// Consume faults until shutdown
    pub async fn run(
        self: Arc<Self>,
        mut faults: mpsc::Receiver<EngineFault>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!(max_retries = self.max_retries, "[RECOVERY] Supervisor started");
        loop {
            let fault = tokio::select! {
                _ = shutdown_rx.recv() => break,
                fault = faults.recv() => match fault {
                    Some(fault) => fault,
                    None => break,
                },
            };

            warn!(origin = fault.origin, "[RECOVERY] Fault received");
            let outcome = tokio::select! {
                _ = shutdown_rx.recv() => break,
                outcome = self.handle(fault.error) => outcome,
            };

            if outcome == RecoveryOutcome::Recovered {
                // Faults queued during recovery describe the old session
                let mut stale = 0;
                while faults.try_recv().is_ok() {
                    stale += 1;
                }
                if stale > 0 {
                    info!(dropped = stale, "[RECOVERY] Dropped faults raised before re-initialization");
                }
            }
        }
        info!("[RECOVERY] Supervisor stopped");
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
