//! Engine state and its JSON persistence
//!
//! `EngineState` is the single persisted aggregate. It is owned by a
//! `StateHandle`; every mutation goes through `StateHandle::update`, which
//! saves the new snapshot before returning (persist-after-mutate).
//!
//! # Architecture
//!
//! ```text
//! price tick ──┐
//! breaker ─────┤
//! scheduler ───┼──► StateHandle::update ──► StateStore::save (temp file + rename)
//! recovery ────┤            │
//! volume reset ┘            └── save failure ──► Notifier (Persistence alert)
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use ethers::types::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::adapters::traits::Notifier;
use crate::adapters::types::{AlertCategory, TradeSide};

/// Errors for state persistence
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("State serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Swap submitted but not yet confirmed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub wallet: Address,
    pub side: TradeSide,
    pub amount: Decimal,
    pub submitted_at: DateTime<Utc>,
}

/// Persisted engine aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineState {
    /// Traded amount since the last UTC-midnight reset
    pub daily_volume: Decimal,
    pub last_price: Option<Decimal>,
    pub last_price_update_time: DateTime<Utc>,
    pub is_circuit_broken: bool,
    /// Consecutive recovery attempts since the last successful initialization
    pub recovery_attempts: u32,
    /// In-flight swaps keyed by order id
    pub active_orders: HashMap<String, OrderRecord>,
    /// Rehydrated from the wallet pool at every initialization
    pub wallets: Vec<Address>,
    /// UTC date `daily_volume` belongs to
    pub volume_day: NaiveDate,
}

impl Default for EngineState {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            daily_volume: Decimal::ZERO,
            last_price: None,
            last_price_update_time: now,
            is_circuit_broken: false,
            recovery_attempts: 0,
            active_orders: HashMap::new(),
            wallets: Vec::new(),
            volume_day: now.date_naive(),
        }
    }
}

impl EngineState {
    /// Move the volume counter to `today`, zeroing it when the day changed.
    ///
    /// Returns true if a reset happened.
    pub fn roll_volume_day(&mut self, today: NaiveDate) -> bool {
        if self.volume_day == today {
            return false;
        }
        self.daily_volume = Decimal::ZERO;
        self.volume_day = today;
        true
    }
}

// ============================================================================
// StateStore
// ============================================================================

/// JSON file holding the last saved `EngineState`
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved state. An absent or unreadable file yields defaults.
    pub fn load(&self) -> EngineState {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "[STATE] No state file, starting from defaults");
                return EngineState::default();
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "[STATE] State file unreadable, starting from defaults");
                return EngineState::default();
            }
        };

        match serde_json::from_str(&data) {
            Ok(state) => {
                debug!(path = %self.path.display(), "[STATE] State loaded");
                state
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "[STATE] State file corrupt, starting from defaults");
                EngineState::default()
            }
        }
    }

    /// Overwrite the state file: write a sibling temp file, fsync, rename.
    pub fn save(&self, state: &EngineState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(state)?;
        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

// ============================================================================
// StateHandle
// ============================================================================

/// Shared owner of the live `EngineState`
#[derive(Clone)]
pub struct StateHandle {
    state: Arc<RwLock<EngineState>>,
    store: Arc<StateStore>,
    notifier: Arc<dyn Notifier>,
}

impl StateHandle {
    pub fn new(initial: EngineState, store: StateStore, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial)),
            store: Arc::new(store),
            notifier,
        }
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> EngineState {
        self.state.read().await.clone()
    }

    /// Read a value out of the current state
    pub async fn read<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
        f(&*self.state.read().await)
    }

    /// Mutate the state, then persist it.
    ///
    /// A failed save raises a Persistence alert; the in-memory state stays
    /// authoritative and the caller is not interrupted.
    pub async fn update<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> R {
        let (result, snapshot) = {
            let mut guard = self.state.write().await;
            let result = f(&mut guard);
            (result, guard.clone())
        };
        self.persist(&snapshot).await;
        result
    }

    async fn persist(&self, snapshot: &EngineState) {
        if let Err(e) = self.store.save(snapshot) {
            warn!(path = %self.store.path().display(), error = %e, "[STATE] Save failed");
            self.notifier
                .notify(
                    AlertCategory::Persistence,
                    &format!("Failed to save engine state: {}", e),
                )
                .await;
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_utils::RecordingNotifier;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[test]
    fn test_absent_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let state = store.load();
        assert_eq!(state.daily_volume, Decimal::ZERO);
        assert!(!state.is_circuit_broken);
        assert_eq!(state.recovery_attempts, 0);
        assert!(state.last_price.is_none());
    }

    #[test]
    fn test_corrupt_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let state = StateStore::new(&path).load();
        assert_eq!(state.daily_volume, Decimal::ZERO);
    }

    #[test]
    fn test_save_then_load_preserves_fields() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested").join("state.json"));

        let mut state = EngineState::default();
        state.daily_volume = dec!(12.5);
        state.last_price = Some(dec!(1.12));
        state.is_circuit_broken = true;
        state.recovery_attempts = 2;
        state.wallets = vec![Address::from_low_u64_be(1)];
        store.save(&state).unwrap();

        assert_eq!(store.load(), state);
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }

    #[test]
    fn test_file_uses_camel_case_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        StateStore::new(&path).save(&EngineState::default()).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"dailyVolume\""));
        assert!(raw.contains("\"isCircuitBroken\""));
        assert!(raw.contains("\"lastPriceUpdateTime\""));
    }

    #[test]
    fn test_partial_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"dailyVolume":"3.5","isCircuitBroken":true}"#).unwrap();
        let state = StateStore::new(&path).load();
        assert_eq!(state.daily_volume, dec!(3.5));
        assert!(state.is_circuit_broken);
        assert!(state.active_orders.is_empty());
    }

    #[test]
    fn test_roll_volume_day() {
        let mut state = EngineState::default();
        state.daily_volume = dec!(4);
        let today = state.volume_day;
        assert!(!state.roll_volume_day(today));
        assert_eq!(state.daily_volume, dec!(4));

        let tomorrow = today.succ_opt().unwrap();
        assert!(state.roll_volume_day(tomorrow));
        assert_eq!(state.daily_volume, Decimal::ZERO);
        assert_eq!(state.volume_day, tomorrow);
    }

    #[tokio::test]
    async fn test_update_persists_after_mutation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let notifier = Arc::new(RecordingNotifier::default());
        let handle = StateHandle::new(EngineState::default(), StateStore::new(&path), notifier.clone());

        let attempts = handle
            .update(|s| {
                s.recovery_attempts += 1;
                s.recovery_attempts
            })
            .await;

        assert_eq!(attempts, 1);
        assert_eq!(StateStore::new(&path).load().recovery_attempts, 1);
        assert_eq!(notifier.count(AlertCategory::Persistence), 0);
    }

    #[tokio::test]
    async fn test_save_failure_alerts_but_keeps_memory_state() {
        let dir = tempdir().unwrap();
        // A directory in place of the file makes the rename fail
        let path = dir.path().join("state.json");
        fs::create_dir_all(path.join("occupied")).unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let handle = StateHandle::new(EngineState::default(), StateStore::new(&path), notifier.clone());
        handle.update(|s| s.daily_volume = dec!(1)).await;

        assert_eq!(handle.read(|s| s.daily_volume).await, dec!(1));
        assert_eq!(notifier.count(AlertCategory::Persistence), 1);
    }
}
