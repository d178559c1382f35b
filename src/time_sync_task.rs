// Time Sync Task
// Embassy task that owns the time sync controller and with it the modem and Wi-Fi radio.
// Keeping every AT command and radio call on this task serializes access to both.

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Timer};
use log::{error, info, warn};

use hive_shared::{
    select_link, ActiveLink, LinkStatus, NetworkAssociation, NetworkPreference, StateWatch,
    TimeSyncController, TimeSyncState,
};

use crate::modem::UartModem;
use crate::settings::{ConnectivityRequest, SettingsStorage, CONNECTIVITY_REQUEST_CHANNEL};
use crate::system_clock::EspSystemClock;
use crate::system_state::{TimeSyncEvent, SYSTEM_STATE, TIME_SYNC_EVENT_SIGNAL};
use crate::wifi_client::WifiAssociation;
use crate::wifi_storage::WiFiStorage;

// Task timing constants
const POLL_INTERVAL_MS: u64 = 50; // Cooperative poll cadence
const LINK_CHECK_INTERVAL_MS: u64 = 10_000; // Registration / association refresh

pub type HiveTimeSync = TimeSyncController<UartModem, WifiAssociation, EspSystemClock>;

fn now_ms() -> u64 {
    Instant::now().as_millis()
}

#[embassy_executor::task]
pub async fn time_sync_task(
    mut controller: HiveTimeSync,
    mut settings: SettingsStorage,
    mut wifi_storage: WiFiStorage,
    preference: NetworkPreference,
) {
    info!("🕒 Time sync task started");

    {
        let mut state = SYSTEM_STATE.lock().await;
        state.preference = preference;
        state.utc_offset_secs = controller.zone().total_offset_secs();
    }

    controller.initialize(now_ms());

    // Observers hear about each state once, whether a poll or a request caused it
    let mut watch = StateWatch::new();
    publish_if_changed(&controller, &mut watch).await;

    let mut last_link_check = 0u64;

    loop {
        let tick = Timer::after(Duration::from_millis(POLL_INTERVAL_MS));
        if let Either::First(request) = select(CONNECTIVITY_REQUEST_CHANNEL.receive(), tick).await {
            handle_request(request, &mut controller, &mut settings, &mut wifi_storage).await;
            publish_if_changed(&controller, &mut watch).await;
        }

        controller.poll(now_ms());
        publish_if_changed(&controller, &mut watch).await;

        // The cellular check owns the modem for its whole window
        let now = now_ms();
        if controller.state() != TimeSyncState::CheckingCellularClock
            && now.saturating_sub(last_link_check) >= LINK_CHECK_INTERVAL_MS
        {
            last_link_check = now;
            refresh_links(&mut controller).await;
        }
    }
}

async fn handle_request(
    request: ConnectivityRequest,
    controller: &mut HiveTimeSync,
    settings: &mut SettingsStorage,
    wifi_storage: &mut WiFiStorage,
) {
    info!("🔧 Processing connectivity request: {:?}", request);

    match request {
        ConnectivityRequest::SetPreference(new_preference) => {
            if let Err(e) = settings.save_preference(new_preference) {
                error!("❌ {}", e);
            }
            SYSTEM_STATE.lock().await.preference = new_preference;

            // A mode change restarts time acquisition from the cellular clock
            controller.initialize(now_ms());
        }

        ConnectivityRequest::SetOffsets {
            gmt_offset_secs,
            dst_offset_secs,
        } => {
            let mut zone = controller.zone().clone();
            zone.gmt_offset_secs = gmt_offset_secs;
            zone.dst_offset_secs = dst_offset_secs;

            if let Err(e) = settings.save_time_zone(&zone) {
                error!("❌ {}", e);
            }
            SYSTEM_STATE.lock().await.utc_offset_secs = zone.total_offset_secs();

            controller.set_zone(zone);
            controller.initialize(now_ms());
        }

        ConnectivityRequest::StoreNetwork { slot, credentials } => {
            match wifi_storage.store_slot(slot, &credentials) {
                Ok(()) => controller.set_known_networks(wifi_storage.known_networks()),
                Err(e) => error!("❌ Failed to store WiFi slot {}: {:?}", slot + 1, e),
            }
        }

        ConnectivityRequest::ClearNetworks => {
            if let Err(e) = wifi_storage.clear_credentials() {
                error!("❌ Failed to clear WiFi credentials: {:?}", e);
            }
            controller.set_known_networks(wifi_storage.known_networks());
        }

        ConnectivityRequest::Resync => {
            controller.initialize(now_ms());
        }
    }
}

async fn publish_if_changed(controller: &HiveTimeSync, watch: &mut StateWatch) {
    let Some(time_state) = watch.changed(controller.state()) else {
        return;
    };
    let time_valid = controller.is_time_valid();
    let time_source = controller.source();

    {
        let mut state = SYSTEM_STATE.lock().await;
        state.time_state = time_state;
        state.time_valid = time_valid;
        state.time_source = time_source;
    }

    let event = match time_state {
        TimeSyncState::Done if time_valid => TimeSyncEvent::Synchronized(time_source),
        TimeSyncState::Failed => TimeSyncEvent::Failed,
        other => TimeSyncEvent::StateChanged(other),
    };

    if let TimeSyncEvent::Synchronized(source) = &event {
        info!(
            "✅ Time synchronized via {}: {}",
            source.label(),
            controller.status_line()
        );
    }

    TIME_SYNC_EVENT_SIGNAL.signal(event);
}

async fn refresh_links(controller: &mut HiveTimeSync) {
    let status = LinkStatus {
        lte_registered: controller.modem_mut().is_network_registered(),
        wifi_connected: controller.network_mut().is_connected(),
    };

    let mut state = SYSTEM_STATE.lock().await;
    let active_link = select_link(state.preference, status);

    if active_link != state.active_link {
        match active_link {
            ActiveLink::Wifi => info!(
                "📶 Active link: WIFI ({})",
                controller
                    .network_mut()
                    .ssid_summary()
                    .unwrap_or_else(|| "unknown SSID".to_string())
            ),
            ActiveLink::None => warn!(
                "⚠️ No connectivity (mode {})",
                state.preference.label()
            ),
            link => info!("📡 Active link: {}", link.label()),
        }
    }

    state.lte_registered = status.lte_registered;
    state.wifi_connected = status.wifi_connected;
    state.active_link = active_link;
}
