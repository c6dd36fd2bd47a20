//! Channel bundle for inter-task communication
//!
//! Tick loops and the order scheduler never propagate failures up a call
//! stack; they report them as `EngineFault`s to the recovery supervisor.

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::config::constants::fault_channel_capacity;
use crate::error::AppError;

/// Failure raised by a background routine
#[derive(Debug)]
pub struct EngineFault {
    /// Routine that failed (e.g. "price_monitor")
    pub origin: &'static str,
    pub error: AppError,
}

impl EngineFault {
    pub fn new(origin: &'static str, error: impl Into<AppError>) -> Self {
        Self {
            origin,
            error: error.into(),
        }
    }
}

/// Bundle of all inter-task communication channels
#[derive(Debug)]
pub struct ChannelBundle {
    /// Routines -> RecoverySupervisor: faults
    pub fault_tx: mpsc::Sender<EngineFault>,
    pub fault_rx: mpsc::Receiver<EngineFault>,

    /// Shutdown broadcast: main -> all tasks
    pub shutdown_tx: broadcast::Sender<()>,
}

impl ChannelBundle {
    /// `capacity` is raised to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (fault_tx, fault_rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            fault_tx,
            fault_rx,
            shutdown_tx,
        }
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new(fault_channel_capacity())
    }
}

/// Forward a fault; a closed channel means the engine is shutting down.
pub async fn report_fault(faults: &mpsc::Sender<EngineFault>, origin: &'static str, error: AppError) {
    warn!(origin = origin, error = %error, "[FAULT] Routine failed");
    if faults.send(EngineFault::new(origin, error)).await.is_err() {
        debug!(origin = origin, "[FAULT] Supervisor gone, fault dropped");
    }
}
