use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;

use hive_shared::{ActiveLink, NetworkPreference, TimeSource, TimeSyncState};

// Time sync progress events
#[derive(Clone, Debug)]
pub enum TimeSyncEvent {
    StateChanged(TimeSyncState), // State machine moved to a new state
    Synchronized(TimeSource),    // Wall clock set from this source
    Failed,                      // Both sources exhausted, waiting for a resync request
}

// Global signals for task coordination (static, allocated at compile time)
// Using CriticalSectionRawMutex for interrupt-safe access in embedded systems
pub static TIME_SYNC_EVENT_SIGNAL: Signal<CriticalSectionRawMutex, TimeSyncEvent> = Signal::new();

// Shared system state - protected by mutex for safe concurrent access
pub static SYSTEM_STATE: Mutex<CriticalSectionRawMutex, SystemState> =
    Mutex::new(SystemState::new());

// System state structure
#[derive(Clone, Debug)]
pub struct SystemState {
    pub wifi_connected: bool,
    pub lte_registered: bool,
    pub preference: NetworkPreference,
    pub active_link: ActiveLink,
    pub time_state: TimeSyncState,
    pub time_valid: bool,
    pub time_source: TimeSource,
    pub utc_offset_secs: i64, // Local offset used for displayed times
}

impl SystemState {
    pub const fn new() -> Self {
        Self {
            wifi_connected: false,
            lte_registered: false,
            preference: NetworkPreference::Auto,
            active_link: ActiveLink::None,
            time_state: TimeSyncState::Idle,
            time_valid: false,
            time_source: TimeSource::None,
            utc_offset_secs: 0,
        }
    }
}
