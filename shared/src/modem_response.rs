// Parsers for the modem replies the time sync and link checks depend on

use chrono::{NaiveDate, NaiveDateTime};

use crate::platform::TimeZoneConfig;

const CCLK_MARKER: &str = "+CCLK:";
const REGISTRATION_MARKERS: [&str; 2] = ["+CEREG:", "+CREG:"];

/// Network clock as reported by `AT+CCLK?`: `+CCLK: "YY/MM/DD,HH:MM:SS±QQ"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellularTimestamp {
    pub local: NaiveDateTime, // Wall time in the network's zone
    pub quarter_hours: i8,    // UTC offset in 15 minute steps
}

impl CellularTimestamp {
    /// Find and parse the `+CCLK` payload anywhere in a raw response.
    /// Anything short of a complete, calendar-valid timestamp yields `None`.
    pub fn parse(response: &str) -> Option<Self> {
        let start = response.find(CCLK_MARKER)?;
        let rest = &response[start + CCLK_MARKER.len()..];
        let body = &rest[rest.find('"')? + 1..];
        let payload = match body.find('"') {
            Some(end) => &body[..end],
            None => body.trim_end(),
        };

        let (date, time_and_zone) = payload.split_once(',')?;
        let sign_at = time_and_zone.rfind(|c: char| c == '+' || c == '-')?;
        let (time, zone) = time_and_zone.split_at(sign_at);

        let [year, month, day] = split_fields(date, '/')?;
        let [hour, minute, second] = split_fields(time, ':')?;
        if year > 99 {
            return None;
        }

        let quarters: i8 = zone[1..].parse().ok()?;
        let quarter_hours = if zone.starts_with('-') { -quarters } else { quarters };

        let local = NaiveDate::from_ymd_opt(2000 + year as i32, month, day)?
            .and_hms_opt(hour, minute, second)?;

        Some(Self {
            local,
            quarter_hours,
        })
    }

    /// Epoch seconds, reading the fields as wall time in the configured zone.
    pub fn to_epoch(&self, zone: &TimeZoneConfig) -> i64 {
        self.local.and_utc().timestamp() - zone.total_offset_secs()
    }

    pub fn utc_offset_minutes(&self) -> i32 {
        i32::from(self.quarter_hours) * 15
    }
}

fn split_fields(text: &str, separator: char) -> Option<[u32; 3]> {
    let mut parts = text.trim().split(separator);
    let mut fields = [0u32; 3];
    for field in fields.iter_mut() {
        *field = parts.next()?.trim().parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(fields)
}

/// Registration status from a `+CREG:`/`+CEREG:` reply or URC.
pub fn parse_registration_status(response: &str) -> Option<u8> {
    let (marker, start) = REGISTRATION_MARKERS
        .iter()
        .find_map(|marker| response.find(marker).map(|at| (*marker, at)))?;

    let line = response[start + marker.len()..].lines().next()?;
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();

    // Query replies carry "<n>,<stat>", unsolicited codes only "<stat>"
    let stat = if fields.len() >= 2 { fields[1] } else { fields[0] };
    stat.parse().ok()
}

/// Registered on the home network (1) or roaming (5).
pub fn is_registered(stat: u8) -> bool {
    stat == 1 || stat == 5
}
