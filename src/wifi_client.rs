// Import ESP-IDF event loop for handling system events
// The event loop manages WiFi connection events, IP assignment, etc.
use esp_idf_svc::eventloop::EspSystemEventLoop;

// Import peripheral trait for hardware access
use esp_idf_svc::hal::peripheral::Peripheral;

// Import NVS partition for WiFi driver storage needs
use esp_idf_svc::nvs::EspDefaultNvsPartition;

// Import ESP-IDF error type
use esp_idf_svc::sys::EspError;

// Import WiFi-related types from ESP-IDF
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

// Import logging macros
use log::{debug, error, info, warn};

use hive_shared::NetworkAssociation;

// Station-mode Wi-Fi used for the NTP fallback
// Connects are started without waiting; the time sync state machine polls for the link
pub struct WifiAssociation {
    wifi: BlockingWifi<EspWifi<'static>>, // ESP-IDF WiFi driver wrapper
}

impl WifiAssociation {
    pub fn new(
        modem: impl Peripheral<P = esp_idf_svc::hal::modem::Modem> + 'static,
        sys_loop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self, EspError> {
        info!("Initializing WiFi client");

        let wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs))?;
        let wifi = BlockingWifi::wrap(wifi, sys_loop)?;

        info!("WiFi client initialized successfully");

        Ok(Self { wifi })
    }

    fn ensure_started(&mut self) -> Result<(), EspError> {
        if !self.wifi.is_started()? {
            self.wifi
                .set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
            self.wifi.start()?;
            info!("WiFi started in station mode");
        }
        Ok(())
    }

    fn try_begin_connect(&mut self, ssid: &str, passphrase: &str) -> Result<(), EspError> {
        let wifi_config = Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| {
                error!("Invalid SSID format");
                EspError::from_infallible::<{ esp_idf_svc::sys::ESP_ERR_INVALID_ARG }>()
            })?,
            password: passphrase.try_into().map_err(|_| {
                error!("Invalid password format");
                EspError::from_infallible::<{ esp_idf_svc::sys::ESP_ERR_INVALID_ARG }>()
            })?,
            channel: None,
            auth_method: determine_auth_method(passphrase),
            ..Default::default()
        });

        self.wifi.set_configuration(&wifi_config)?;
        self.ensure_started()?;

        // Non-blocking connect on the inner driver; BlockingWifi::connect would wait for the link
        self.wifi.wifi_mut().connect()?;
        Ok(())
    }

    pub fn ssid_summary(&self) -> Option<String> {
        match self.wifi.get_configuration() {
            Ok(Configuration::Client(client)) if !client.ssid.is_empty() => {
                Some(client.ssid.to_string())
            }
            _ => None,
        }
    }
}

impl NetworkAssociation for WifiAssociation {
    fn set_station_mode(&mut self) {
        if let Err(e) = self.ensure_started() {
            warn!("Failed to start WiFi in station mode: {:?}", e);
        }
    }

    fn disconnect(&mut self) {
        if let Err(e) = self.wifi.wifi_mut().disconnect() {
            debug!("WiFi disconnect ignored: {:?}", e);
        }
    }

    fn scan_networks(&mut self) -> Vec<String> {
        info!("Scanning for available WiFi networks...");

        match self.wifi.scan() {
            Ok(access_points) => {
                let ssids: Vec<String> = access_points
                    .iter()
                    .map(|ap| ap.ssid.to_string())
                    .collect();
                info!("Found {} networks", ssids.len());
                ssids
            }
            Err(e) => {
                warn!("WiFi scan failed: {:?}", e);
                Vec::new()
            }
        }
    }

    fn begin_connect(&mut self, ssid: &str, passphrase: &str) {
        info!("Attempting to connect to WiFi network: {}", ssid);

        if let Err(e) = self.try_begin_connect(ssid, passphrase) {
            warn!("WiFi connect could not be started: {:?}", e);
        }
    }

    fn is_connected(&mut self) -> bool {
        // Associated and holding an IP, otherwise NTP cannot run
        let associated = self.wifi.is_connected().unwrap_or(false);
        associated && self.wifi.wifi().sta_netif().is_up().unwrap_or(false)
    }
}

fn determine_auth_method(password: &str) -> AuthMethod {
    if password.is_empty() {
        AuthMethod::None
    } else if password.len() >= 8 {
        AuthMethod::WPA2Personal
    } else {
        warn!("Password length suggests WEP, but using WPA2");
        AuthMethod::WPA2Personal
    }
}
