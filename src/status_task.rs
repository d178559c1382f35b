use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Timer};
use log::{info, warn};

use hive_shared::time_sync::{format_date, format_time, INVALID_STATUS_LINE};

use crate::settings::request_time_resync;
use crate::system_clock::current_epoch;
use crate::system_state::{TimeSyncEvent, SYSTEM_STATE, TIME_SYNC_EVENT_SIGNAL};

// Status reporting cadence and the retry policy after both time sources failed
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);
const RESYNC_AFTER_FAILURE: Duration = Duration::from_secs(15 * 60);

/// Local `DD-MM-YYYY HH:MM:SS`, or the placeholder while time is not valid
pub async fn status_line() -> String {
    let (time_valid, offset) = {
        let state = SYSTEM_STATE.lock().await;
        (state.time_valid, state.utc_offset_secs)
    };

    if time_valid {
        let now = current_epoch();
        format!("{} {}", format_date(now, offset), format_time(now, offset))
    } else {
        INVALID_STATUS_LINE.to_string()
    }
}

#[embassy_executor::task]
pub async fn status_task() {
    info!("Status task started - time sync reporter");

    let mut failed_at: Option<Instant> = None;
    let mut last_report = Instant::now();

    loop {
        match select(TIME_SYNC_EVENT_SIGNAL.wait(), Timer::after(Duration::from_secs(1))).await {
            Either::First(TimeSyncEvent::Synchronized(source)) => {
                failed_at = None;
                info!("🕒 Clock valid ({}): {}", source.label(), status_line().await);
            }
            Either::First(TimeSyncEvent::Failed) => {
                warn!(
                    "⚠️ Time sync failed, retrying in {} minutes",
                    RESYNC_AFTER_FAILURE.as_secs() / 60
                );
                failed_at = Some(Instant::now());
            }
            Either::First(TimeSyncEvent::StateChanged(state)) => {
                failed_at = None;
                info!("🕒 Time sync state: {:?}", state);
            }
            Either::Second(()) => {}
        }

        // Nothing retries a failed session on its own
        if let Some(at) = failed_at {
            if at.elapsed() >= RESYNC_AFTER_FAILURE {
                failed_at = None;
                request_time_resync();
            }
        }

        if last_report.elapsed() >= STATUS_LOG_INTERVAL {
            last_report = Instant::now();
            let state = SYSTEM_STATE.lock().await.clone();
            info!(
                "📊 {} | SRC: {} | LINK: {} (mode {})",
                status_line().await,
                state.time_source.label(),
                state.active_link.label(),
                state.preference.label()
            );
        }
    }
}
