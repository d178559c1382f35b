// Import ESP-IDF's NVS (Non-Volatile Storage) functionality
// NVS is a key-value storage system that persists data in flash memory
// Data stored in NVS survives device reboots and power cycles
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

// Import ESP-IDF error type for operation results
use esp_idf_svc::sys::EspError;

// Import logging macros for debug output
use log::{info, warn};

use hive_shared::{KnownNetworks, NetworkCredentials};

// NVS storage keys - the provisioning form writes two SSID/passphrase slots
const NVS_NAMESPACE: &str = "beehive";
const SLOT_KEYS: [(&str, &str); 2] = [("wifi_ssid1", "wifi_psk1"), ("wifi_ssid2", "wifi_psk2")];

const SSID_MAX_LEN: usize = 32;
const PASSPHRASE_MAX_LEN: usize = 63;

// WiFi storage manager - provisioned networks tried before the built-in hotspots
pub struct WiFiStorage {
    nvs: EspNvs<NvsDefault>, // ESP-IDF NVS handle for flash storage operations
}

impl WiFiStorage {
    /// Create WiFi storage using provided NVS partition (avoids singleton conflicts)
    pub fn new_with_partition(nvs_partition: EspDefaultNvsPartition) -> Result<Self, EspError> {
        info!("Initializing WiFi storage (NVS) with provided partition");

        let nvs = EspNvs::new(nvs_partition, NVS_NAMESPACE, true)?;

        info!("WiFi storage initialized successfully with provided partition");

        Ok(Self { nvs })
    }

    /// Provisioned slots in slot order; empty or unreadable slots are skipped
    pub fn load_provisioned(&mut self) -> Vec<NetworkCredentials> {
        let mut provisioned = Vec::new();

        for (ssid_key, psk_key) in SLOT_KEYS {
            let mut ssid_buffer = [0u8; 64];
            let mut psk_buffer = [0u8; 96];

            let ssid = match self.nvs.get_str(ssid_key, &mut ssid_buffer) {
                Ok(Some(ssid)) if !ssid.is_empty() => ssid.to_string(),
                Ok(_) => continue,
                Err(e) => {
                    warn!("Error reading {}: {:?}", ssid_key, e);
                    continue;
                }
            };

            // Open networks have no passphrase stored
            let passphrase = match self.nvs.get_str(psk_key, &mut psk_buffer) {
                Ok(Some(psk)) => psk.to_string(),
                Ok(None) => String::new(),
                Err(e) => {
                    warn!("Error reading {}: {:?}", psk_key, e);
                    continue;
                }
            };

            let credentials = NetworkCredentials::new(ssid, passphrase);
            if validate_credentials(&credentials) {
                info!("Loaded provisioned network: {}", credentials_summary(&credentials));
                provisioned.push(credentials);
            }
        }

        provisioned
    }

    /// Provisioned networks followed by the built-in hotspots
    pub fn known_networks(&mut self) -> KnownNetworks {
        KnownNetworks::merged(self.load_provisioned())
    }

    /// Write one slot (0 or 1); an empty SSID clears it
    pub fn store_slot(&mut self, slot: usize, credentials: &NetworkCredentials) -> Result<(), EspError> {
        let Some((ssid_key, psk_key)) = SLOT_KEYS.get(slot).copied() else {
            return Err(EspError::from_infallible::<
                { esp_idf_svc::sys::ESP_ERR_INVALID_ARG },
            >());
        };

        if credentials.ssid.is_empty() {
            let _ = self.nvs.remove(ssid_key);
            let _ = self.nvs.remove(psk_key);
            info!("Cleared WiFi slot {}", slot + 1);
            return Ok(());
        }

        if !validate_credentials(credentials) {
            return Err(EspError::from_infallible::<
                { esp_idf_svc::sys::ESP_ERR_INVALID_ARG },
            >());
        }

        self.nvs.set_str(ssid_key, &credentials.ssid)?;
        if credentials.passphrase.is_empty() {
            let _ = self.nvs.remove(psk_key);
        } else {
            self.nvs.set_str(psk_key, &credentials.passphrase)?;
        }

        info!("Stored WiFi slot {}: {}", slot + 1, credentials_summary(credentials));
        Ok(())
    }

    pub fn clear_credentials(&mut self) -> Result<(), EspError> {
        info!("Clearing stored WiFi credentials");

        for (ssid_key, psk_key) in SLOT_KEYS {
            let _ = self.nvs.remove(ssid_key);
            let _ = self.nvs.remove(psk_key);
        }

        Ok(())
    }
}

fn validate_credentials(credentials: &NetworkCredentials) -> bool {
    if credentials.ssid.len() > SSID_MAX_LEN {
        warn!(
            "SSID too long: {} characters (max {})",
            credentials.ssid.len(),
            SSID_MAX_LEN
        );
        return false;
    }

    if credentials.passphrase.len() > PASSPHRASE_MAX_LEN {
        warn!(
            "Password too long: {} characters (max {})",
            credentials.passphrase.len(),
            PASSPHRASE_MAX_LEN
        );
        return false;
    }

    true
}

pub fn credentials_summary(credentials: &NetworkCredentials) -> String {
    format!(
        "SSID: '{}', Password: [{}chars]",
        credentials.ssid,
        credentials.passphrase.len()
    )
}
