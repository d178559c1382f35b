// Beehive monitor connectivity and time firmware
// Brings up the modem, Wi-Fi and clock, then hands them to the time sync task

// Import Embassy async executor for task management
use embassy_executor::Spawner;

// Import ESP-IDF service layer: peripherals, event loop and NVS
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use anyhow::Result;
use log::{error, info, warn};

use hive_shared::{NetworkPreference, TimeSyncController};

mod modem;
mod serial_commands;
mod settings;
mod status_task;
mod system_clock;
mod system_state;
mod time_sync_task;
mod wifi_client;
mod wifi_storage;

use modem::UartModem;
use settings::SettingsStorage;
use status_task::status_task;
use system_clock::EspSystemClock;
use time_sync_task::{time_sync_task, HiveTimeSync};
use wifi_client::WifiAssociation;
use wifi_storage::WiFiStorage;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("🐝 Beehive monitor starting");

    let (controller, settings_storage, wifi_storage, preference) = match setup() {
        Ok(parts) => parts,
        Err(e) => {
            error!("❌ Startup failed: {:?}", e);
            return;
        }
    };

    if let Err(_) = spawner.spawn(time_sync_task(
        controller,
        settings_storage,
        wifi_storage,
        preference,
    )) {
        error!("❌ Failed to spawn time sync task");
        return;
    } else {
        info!("✅ Time sync task spawned successfully");
    }

    if let Err(_) = spawner.spawn(status_task()) {
        error!("❌ Failed to spawn status task");
    } else {
        info!("✅ Status task spawned successfully");
    }

    if let Err(e) = serial_commands::start_console() {
        warn!("⚠️ Serial console unavailable: {:?}", e);
    }
}

fn setup() -> Result<(HiveTimeSync, SettingsStorage, WiFiStorage, NetworkPreference)> {
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let mut settings_storage = SettingsStorage::new_with_partition(nvs.clone())?;
    let settings = settings_storage.load();

    let mut wifi_storage = WiFiStorage::new_with_partition(nvs.clone())?;
    let known_networks = wifi_storage.known_networks();
    info!("📶 {} known WiFi networks", known_networks.len());

    let mut modem = UartModem::new(
        peripherals.uart2,
        peripherals.pins.gpio26,
        peripherals.pins.gpio27,
        peripherals.pins.gpio4,
    )?;
    if modem.power_on()? {
        modem.enable_radio();
    } else {
        // The state machine still tries the cellular clock; a silent modem just times out
        warn!("⚠️ Modem did not answer AT after power on");
    }

    let wifi = WifiAssociation::new(peripherals.modem, sys_loop, nvs)?;
    let clock = EspSystemClock::new();

    let controller = TimeSyncController::new(
        modem,
        wifi,
        clock,
        known_networks,
        settings.time_zone.clone(),
    );

    Ok((controller, settings_storage, wifi_storage, settings.preference))
}
