// Capability traits the time sync core drives
// The firmware implements them over the UART modem, the ESP-IDF Wi-Fi driver and the libc clock

use serde::{Deserialize, Serialize};

/// AT command transport of the cellular modem.
pub trait ModemClock {
    /// Send a command without the leading `AT` (e.g. `+CCLK?`). Fire and forget.
    fn send_command(&mut self, command: &str);

    /// Whatever text arrived since the last command, read within the transport's own window.
    fn read_raw_response(&mut self) -> String;
}

/// Station-mode control of the Wi-Fi radio.
pub trait NetworkAssociation {
    fn set_station_mode(&mut self);
    fn disconnect(&mut self);
    /// Visible SSIDs in scan order.
    fn scan_networks(&mut self) -> Vec<String>;
    /// Start associating; must not wait for the link to come up.
    fn begin_connect(&mut self, ssid: &str, passphrase: &str);
    fn is_connected(&mut self) -> bool;
}

/// Wall clock of the device.
pub trait SystemClock {
    /// Apply the zone and (re)start background NTP against the configured servers.
    fn configure_timezone(&mut self, zone: &TimeZoneConfig);
    /// Seconds since the Unix epoch, UTC.
    fn now(&self) -> i64;
    fn set_clock(&mut self, epoch_secs: i64);
}

/// Fixed-offset local time plus the NTP servers used to discipline the clock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeZoneConfig {
    pub gmt_offset_secs: i32, // Standard offset east of UTC
    pub dst_offset_secs: i32, // Daylight saving added on top
    pub ntp_primary: String,
    pub ntp_secondary: String,
}

impl Default for TimeZoneConfig {
    fn default() -> Self {
        // Greece: GMT+2, DST +1
        Self {
            gmt_offset_secs: 2 * 3600,
            dst_offset_secs: 3600,
            ntp_primary: "pool.ntp.org".to_string(),
            ntp_secondary: "time.google.com".to_string(),
        }
    }
}

impl TimeZoneConfig {
    pub fn total_offset_secs(&self) -> i64 {
        i64::from(self.gmt_offset_secs) + i64::from(self.dst_offset_secs)
    }

    /// POSIX `TZ` value for the fixed offset. POSIX counts west as positive.
    pub fn posix_tz(&self) -> String {
        let offset = self.total_offset_secs();
        let sign = if offset > 0 { '-' } else { '+' };
        let abs = offset.unsigned_abs();
        let hours = abs / 3600;
        let minutes = (abs % 3600) / 60;

        if minutes == 0 {
            format!("UTC{}{}", sign, hours)
        } else {
            format!("UTC{}{}:{:02}", sign, hours, minutes)
        }
    }
}
