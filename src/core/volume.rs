//! UTC-midnight reset of the daily volume counter

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::info;

use crate::core::state::StateHandle;

/// Time left until the next 00:00 UTC after `now`
pub fn duration_until_next_utc_midnight(now: DateTime<Utc>) -> Duration {
    let next_midnight = now
        .date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc());

    match next_midnight {
        Some(midnight) => (midnight - now).to_std().unwrap_or(Duration::ZERO),
        // Only reachable at the end of chrono's calendar
        None => Duration::from_secs(24 * 60 * 60),
    }
}

/// Zero the counter if it belongs to a day before `now`.
///
/// Returns the volume that was discarded, if any.
pub async fn roll_if_stale(state: &StateHandle, now: DateTime<Utc>) -> Option<Decimal> {
    let today = now.date_naive();
    let stale = state.read(|s| s.volume_day != today).await;
    if !stale {
        return None;
    }
    let previous = state
        .update(|s| {
            let previous = s.daily_volume;
            s.roll_volume_day(today).then_some(previous)
        })
        .await;
    if let Some(volume) = previous {
        info!(previous_volume = %volume, day = %today, "[VOLUME] Daily volume reset");
    }
    previous
}

/// Reset the counter at every UTC midnight until shutdown
pub async fn run_midnight_reset(state: StateHandle, mut shutdown_rx: broadcast::Receiver<()>) {
    loop {
        let wait = duration_until_next_utc_midnight(Utc::now());
        info!(in_secs = wait.as_secs(), "[VOLUME] Next daily volume reset scheduled");

        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(wait) => {
                // The sleep may wake a hair early; target the day it was meant for
                let now = Utc::now() + chrono::Duration::seconds(1);
                roll_if_stale(&state, now).await;
            }
        }
    }
}
