// System Clock Module
// Wall clock access for the time sync core: TZ handling, background SNTP and settimeofday

use std::time::{SystemTime, UNIX_EPOCH};

use esp_idf_svc::sntp::{EspSntp, SntpConf};
use log::{info, warn};

use hive_shared::{SystemClock, TimeZoneConfig};

/// libc clock plus the ESP-IDF SNTP client that disciplines it in the background
pub struct EspSystemClock {
    sntp: Option<EspSntp<'static>>, // Kept alive for periodic re-sync
}

impl EspSystemClock {
    pub fn new() -> Self {
        Self { sntp: None }
    }

    fn apply_tz(zone: &TimeZoneConfig) {
        let tz = zone.posix_tz();
        // Safety: set from the single control loop before any other task reads local time
        unsafe {
            std::env::set_var("TZ", &tz);
            esp_idf_svc::sys::tzset();
        }
        info!("🌍 Timezone set to {}", tz);
    }

    fn restart_sntp(&mut self, zone: &TimeZoneConfig) {
        // Only one SNTP instance may exist at a time
        self.sntp = None;

        let mut conf = SntpConf::default();
        let hosts = [zone.ntp_primary.as_str(), zone.ntp_secondary.as_str()];
        // The IDF build decides how many server slots exist
        for (slot, host) in conf.servers.iter_mut().zip(hosts) {
            *slot = host;
        }

        match EspSntp::new(&conf) {
            Ok(sntp) => {
                info!("⏱️ SNTP started against {} / {}", zone.ntp_primary, zone.ntp_secondary);
                self.sntp = Some(sntp);
            }
            Err(e) => warn!("⚠️ Failed to start SNTP: {:?}", e),
        }
    }
}

impl Default for EspSystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock for EspSystemClock {
    fn configure_timezone(&mut self, zone: &TimeZoneConfig) {
        Self::apply_tz(zone);
        self.restart_sntp(zone);
    }

    fn now(&self) -> i64 {
        current_epoch()
    }

    fn set_clock(&mut self, epoch_secs: i64) {
        let tv = esp_idf_svc::sys::timeval {
            tv_sec: epoch_secs as _,
            tv_usec: 0,
        };

        let rc = unsafe { esp_idf_svc::sys::settimeofday(&tv, core::ptr::null()) };
        if rc == 0 {
            info!("🕒 System clock set to epoch {}", epoch_secs);
        } else {
            warn!("⚠️ settimeofday failed with {}", rc);
        }
    }
}

/// Seconds since the epoch; 0-based while the clock has never been set
pub fn current_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
