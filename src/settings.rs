// Connectivity Settings Module
// Network mode preference and time zone persisted in NVS, plus the request channel
// other subsystems (menu, SMS commands) use to change them at runtime

// Import ESP-IDF's NVS (Non-Volatile Storage) functionality
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

// Import Embassy synchronization primitives for async coordination
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

// Import logging macros with consistent emoji prefixes
use log::{debug, info, warn};

// Import anyhow for error handling following existing patterns
use anyhow::{anyhow, Result};

use hive_shared::{NetworkCredentials, NetworkPreference, TimeZoneConfig};

// Settings configuration constants
const NVS_NAMESPACE: &str = "beehive_app";
const CONNECTIVITY_CHANNEL_SIZE: usize = 8;

// NVS storage keys for individual settings
const NET_PREF_KEY: &str = "net_pref";
const TIME_ZONE_KEY: &str = "tz_config"; // JSON encoded TimeZoneConfig

/// Persisted connectivity configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectivitySettings {
    pub preference: NetworkPreference,
    pub time_zone: TimeZoneConfig,
}

/// Runtime requests handled by the time sync task
#[derive(Debug, Clone)]
pub enum ConnectivityRequest {
    SetPreference(NetworkPreference),
    SetOffsets {
        gmt_offset_secs: i32,
        dst_offset_secs: i32,
    },
    StoreNetwork {
        slot: usize,
        credentials: NetworkCredentials,
    },
    ClearNetworks,
    Resync,
}

// Global connectivity request channel
pub static CONNECTIVITY_REQUEST_CHANNEL: Channel<
    CriticalSectionRawMutex,
    ConnectivityRequest,
    CONNECTIVITY_CHANNEL_SIZE,
> = Channel::new();

/// Settings storage - handles the NVS side of connectivity configuration
pub struct SettingsStorage {
    nvs: EspNvs<NvsDefault>,
}

impl SettingsStorage {
    pub fn new_with_partition(nvs_partition: EspDefaultNvsPartition) -> Result<Self> {
        info!("🔧 Initializing connectivity settings storage");

        let nvs = EspNvs::new(nvs_partition, NVS_NAMESPACE, true)
            .map_err(|e| anyhow!("Failed to open settings NVS namespace: {}", e))?;

        Ok(Self { nvs })
    }

    /// Stored settings, with defaults for anything missing or unreadable
    pub fn load(&mut self) -> ConnectivitySettings {
        let preference = match self.nvs.get_i32(NET_PREF_KEY) {
            Ok(Some(code)) => NetworkPreference::from_code(code),
            Ok(None) => NetworkPreference::default(),
            Err(e) => {
                warn!("⚠️ Failed to read network preference: {}", e);
                NetworkPreference::default()
            }
        };

        let time_zone = self.load_time_zone().unwrap_or_else(|e| {
            debug!("🔧 Using default time zone: {}", e);
            TimeZoneConfig::default()
        });

        let settings = ConnectivitySettings {
            preference,
            time_zone,
        };
        info!(
            "✅ Connectivity settings loaded: mode {}, {}",
            settings.preference.label(),
            settings.time_zone.posix_tz()
        );
        settings
    }

    fn load_time_zone(&mut self) -> Result<TimeZoneConfig> {
        let mut buffer = [0u8; 256];
        let json = self
            .nvs
            .get_str(TIME_ZONE_KEY, &mut buffer)
            .map_err(|e| anyhow!("Failed to read time zone: {}", e))?
            .ok_or_else(|| anyhow!("No time zone stored"))?;

        serde_json::from_str(json).map_err(|e| anyhow!("Invalid stored time zone: {}", e))
    }

    pub fn save_preference(&mut self, preference: NetworkPreference) -> Result<()> {
        self.nvs
            .set_i32(NET_PREF_KEY, preference.code())
            .map_err(|e| anyhow!("Failed to save net_pref: {}", e))?;

        info!("✅ Network mode saved: {}", preference.label());
        Ok(())
    }

    pub fn save_time_zone(&mut self, time_zone: &TimeZoneConfig) -> Result<()> {
        let json = serde_json::to_string(time_zone)
            .map_err(|e| anyhow!("Failed to serialize time zone: {}", e))?;

        self.nvs
            .set_str(TIME_ZONE_KEY, &json)
            .map_err(|e| anyhow!("Failed to save time zone: {}", e))?;

        info!("✅ Time zone saved: {}", time_zone.posix_tz());
        Ok(())
    }
}

/// Change the network mode (non-blocking)
pub fn request_preference_change(preference: NetworkPreference) {
    send_request(ConnectivityRequest::SetPreference(preference));
}

/// Change the UTC and daylight saving offsets, keeping the NTP servers (non-blocking)
pub fn request_offset_change(gmt_offset_secs: i32, dst_offset_secs: i32) {
    send_request(ConnectivityRequest::SetOffsets {
        gmt_offset_secs,
        dst_offset_secs,
    });
}

/// Store provisioned Wi-Fi credentials in a slot (non-blocking)
pub fn request_network_store(slot: usize, credentials: NetworkCredentials) {
    send_request(ConnectivityRequest::StoreNetwork { slot, credentials });
}

/// Forget all provisioned Wi-Fi credentials (non-blocking)
pub fn request_network_clear() {
    send_request(ConnectivityRequest::ClearNetworks);
}

/// Restart time acquisition from the cellular clock (non-blocking)
pub fn request_time_resync() {
    send_request(ConnectivityRequest::Resync);
}

fn send_request(request: ConnectivityRequest) {
    if let Err(_) = CONNECTIVITY_REQUEST_CHANNEL.try_send(request) {
        warn!("⚠️ Connectivity request channel full, dropping request");
    }
}
