// Time Synchronization Module
// Cooperative state machine that sets the wall clock from the cellular network clock,
// falling back to a known Wi-Fi hotspot plus NTP when the modem cannot provide one

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::known_networks::KnownNetworks;
use crate::modem_response::CellularTimestamp;
use crate::platform::{ModemClock, NetworkAssociation, SystemClock, TimeZoneConfig};

// Timing constants (milliseconds of the monotonic clock handed to poll)
pub const CELLULAR_QUERY_INTERVAL_MS: u64 = 3000; // Quiet period before the +CCLK query
pub const WIFI_SCAN_INTERVAL_MS: u64 = 5000; // Quiet period before a scan
pub const WIFI_CONNECT_TIMEOUT_MS: u64 = 8000; // Association deadline
pub const NTP_RETRY_INTERVAL_MS: u64 = 5000; // Re-kick the NTP client this often

/// Clock values at or below this many epoch seconds mean NTP has not landed yet
pub const NTP_SANITY_EPOCH_SECS: i64 = 100_000;

const CCLK_QUERY: &str = "+CCLK?";
pub const INVALID_STATUS_LINE: &str = "01-01-1970  00:00:00";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSyncState {
    Idle,
    CheckingCellularClock,
    ScanningWifi,
    ConnectingWifi,
    RequestingNetworkTime,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeSource {
    #[default]
    None,
    Wifi,
    Cellular,
}

impl TimeSource {
    pub fn label(self) -> &'static str {
        match self {
            TimeSource::None => "NONE",
            TimeSource::Wifi => "WIFI",
            TimeSource::Cellular => "LTE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTimings {
    pub cellular_query_interval_ms: u64,
    pub wifi_scan_interval_ms: u64,
    pub wifi_connect_timeout_ms: u64,
    pub ntp_retry_interval_ms: u64,
}

impl Default for SyncTimings {
    fn default() -> Self {
        Self {
            cellular_query_interval_ms: CELLULAR_QUERY_INTERVAL_MS,
            wifi_scan_interval_ms: WIFI_SCAN_INTERVAL_MS,
            wifi_connect_timeout_ms: WIFI_CONNECT_TIMEOUT_MS,
            ntp_retry_interval_ms: NTP_RETRY_INTERVAL_MS,
        }
    }
}

/// Mutable part of a synchronization attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSession {
    pub state: TimeSyncState,
    pub last_action_at: u64, // Monotonic ms of state entry or last rate-limited action
    pub time_valid: bool,    // Sticky once set
    pub source: TimeSource,
}

impl SyncSession {
    const fn idle() -> Self {
        Self {
            state: TimeSyncState::Idle,
            last_action_at: 0,
            time_valid: false,
            source: TimeSource::None,
        }
    }
}

/// Owns the collaborators and the session; advanced by `poll` from the control loop
pub struct TimeSyncController<M, N, C> {
    modem: M,
    network: N,
    clock: C,
    networks: KnownNetworks,
    zone: TimeZoneConfig,
    timings: SyncTimings,
    session: SyncSession,
}

impl<M, N, C> TimeSyncController<M, N, C>
where
    M: ModemClock,
    N: NetworkAssociation,
    C: SystemClock,
{
    pub fn new(modem: M, network: N, clock: C, networks: KnownNetworks, zone: TimeZoneConfig) -> Self {
        Self {
            modem,
            network,
            clock,
            networks,
            zone,
            timings: SyncTimings::default(),
            session: SyncSession::idle(),
        }
    }

    pub fn with_timings(mut self, timings: SyncTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Start a fresh session at the cellular check. Also the only way out of `Failed`.
    pub fn initialize(&mut self, now_ms: u64) {
        self.clock.configure_timezone(&self.zone);

        self.session = SyncSession {
            state: TimeSyncState::CheckingCellularClock,
            last_action_at: now_ms,
            time_valid: false,
            source: TimeSource::None,
        };

        info!(
            "🕒 Time sync initialized ({}, NTP {} / {})",
            self.zone.posix_tz(),
            self.zone.ntp_primary,
            self.zone.ntp_secondary
        );
    }

    /// Advance by at most one transition. No-op once time is valid.
    pub fn poll(&mut self, now_ms: u64) {
        if self.session.time_valid {
            return;
        }

        let elapsed = now_ms.saturating_sub(self.session.last_action_at);

        match self.session.state {
            TimeSyncState::Idle => {}

            TimeSyncState::CheckingCellularClock => {
                if elapsed < self.timings.cellular_query_interval_ms {
                    return;
                }
                self.session.last_action_at = now_ms;
                self.query_cellular_clock();
            }

            TimeSyncState::ScanningWifi => {
                if elapsed < self.timings.wifi_scan_interval_ms {
                    return;
                }
                self.session.last_action_at = now_ms;
                self.scan_for_known_network();
            }

            TimeSyncState::ConnectingWifi => {
                if self.network.is_connected() {
                    info!("📶 Wi-Fi associated after {}ms, waiting for NTP", elapsed);
                    self.session.source = TimeSource::Wifi;
                    self.session.last_action_at = now_ms;
                    self.transition(TimeSyncState::RequestingNetworkTime);
                } else if elapsed > self.timings.wifi_connect_timeout_ms {
                    warn!("⚠️ Wi-Fi association timed out after {}ms", elapsed);
                    self.transition(TimeSyncState::Failed);
                }
            }

            TimeSyncState::RequestingNetworkTime => {
                let epoch = self.clock.now();
                if epoch > NTP_SANITY_EPOCH_SECS {
                    info!("✅ NTP time received: {}", epoch);
                    self.session.time_valid = true;
                    self.transition(TimeSyncState::Done);
                } else if elapsed >= self.timings.ntp_retry_interval_ms {
                    debug!("🔁 NTP not synced yet, re-requesting");
                    self.clock.configure_timezone(&self.zone);
                    self.session.last_action_at = now_ms;
                }
            }

            TimeSyncState::Done => {
                self.session.time_valid = true;
            }

            TimeSyncState::Failed => {}
        }
    }

    fn query_cellular_clock(&mut self) {
        self.modem.send_command(CCLK_QUERY);
        let response = self.modem.read_raw_response();

        match CellularTimestamp::parse(&response) {
            Some(timestamp) => {
                let epoch = timestamp.to_epoch(&self.zone);
                info!(
                    "📡 Network clock {} (UTC{:+} min) -> epoch {}",
                    timestamp.local,
                    timestamp.utc_offset_minutes(),
                    epoch
                );
                self.clock.set_clock(epoch);
                self.session.time_valid = true;
                self.session.source = TimeSource::Cellular;
                self.transition(TimeSyncState::Done);
            }
            None => {
                warn!(
                    "⚠️ No usable +CCLK reply ({:?}), falling back to Wi-Fi",
                    response.trim()
                );
                self.transition(TimeSyncState::ScanningWifi);
            }
        }
    }

    fn scan_for_known_network(&mut self) {
        self.network.set_station_mode();
        self.network.disconnect();

        let visible = self.network.scan_networks();
        debug!("🔍 Scan found {} networks", visible.len());

        match self.networks.first_visible(visible.as_slice()) {
            Some(credentials) => {
                info!("📶 Joining known network '{}'", credentials.ssid);
                self.network
                    .begin_connect(&credentials.ssid, &credentials.passphrase);
                self.transition(TimeSyncState::ConnectingWifi);
            }
            None => {
                warn!(
                    "⚠️ None of the {} known networks is visible",
                    self.networks.len()
                );
                self.transition(TimeSyncState::Failed);
            }
        }
    }

    fn transition(&mut self, next: TimeSyncState) {
        info!("🕒 Time sync: {:?} -> {:?}", self.session.state, next);
        self.session.state = next;
    }

    pub fn is_time_valid(&self) -> bool {
        self.session.time_valid
    }

    pub fn source(&self) -> TimeSource {
        self.session.source
    }

    pub fn state(&self) -> TimeSyncState {
        self.session.state
    }

    pub fn session(&self) -> SyncSession {
        self.session
    }

    /// Local date of the live clock, `DD-MM-YYYY`.
    pub fn date(&self) -> String {
        format_date(self.clock.now(), self.zone.total_offset_secs())
    }

    /// Local time of the live clock, `HH:MM:SS`.
    pub fn time(&self) -> String {
        format_time(self.clock.now(), self.zone.total_offset_secs())
    }

    /// Status screen line; a fixed placeholder until a source has been acquired
    pub fn status_line(&self) -> String {
        if self.session.time_valid {
            format!("{} {}", self.date(), self.time())
        } else {
            INVALID_STATUS_LINE.to_string()
        }
    }

    pub fn zone(&self) -> &TimeZoneConfig {
        &self.zone
    }

    /// Takes effect on the next `initialize`.
    pub fn set_zone(&mut self, zone: TimeZoneConfig) {
        self.zone = zone;
    }

    /// Takes effect on the next scan.
    pub fn set_known_networks(&mut self, networks: KnownNetworks) {
        self.networks = networks;
    }

    pub fn modem_mut(&mut self) -> &mut M {
        &mut self.modem
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

fn local_datetime(epoch_secs: i64, utc_offset_secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(epoch_secs + utc_offset_secs, 0).unwrap_or_default()
}

/// `DD-MM-YYYY` of the epoch shifted by the local offset
pub fn format_date(epoch_secs: i64, utc_offset_secs: i64) -> String {
    local_datetime(epoch_secs, utc_offset_secs)
        .format("%d-%m-%Y")
        .to_string()
}

/// `HH:MM:SS` of the epoch shifted by the local offset
pub fn format_time(epoch_secs: i64, utc_offset_secs: i64) -> String {
    local_datetime(epoch_secs, utc_offset_secs)
        .format("%H:%M:%S")
        .to_string()
}

/// Remembers the last published state so observers hear about each state once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateWatch {
    last: Option<TimeSyncState>,
}

impl StateWatch {
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// `Some(state)` the first time and whenever `state` differs from the last one seen.
    pub fn changed(&mut self, state: TimeSyncState) -> Option<TimeSyncState> {
        if self.last == Some(state) {
            return None;
        }
        self.last = Some(state);
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeClock, FakeModem, FakeRadio};
    use crate::known_networks::NetworkCredentials;

    const CCLK_OK: &str = "\r\n+CCLK: \"24/03/15,10:30:00+08\"\r\n\r\nOK\r\n";
    const NTP_EPOCH: i64 = 1_718_000_000; // 2024-06-10 06:13:20 UTC

    type Controller = TimeSyncController<FakeModem, FakeRadio, FakeClock>;

    fn controller(modem: &FakeModem, radio: &FakeRadio, clock: &FakeClock) -> Controller {
        let mut controller = TimeSyncController::new(
            modem.clone(),
            radio.clone(),
            clock.clone(),
            KnownNetworks::with_defaults(),
            TimeZoneConfig::default(),
        );
        controller.initialize(0);
        controller
    }

    /// Poll every `step` ms until `until` (inclusive).
    fn run(controller: &mut Controller, from: u64, until: u64, step: u64) {
        let mut now = from;
        while now <= until {
            controller.poll(now);
            now += step;
        }
    }

    #[test]
    fn scenario_a_cellular_clock_sets_time() {
        let modem = FakeModem::replying(&[CCLK_OK]);
        let radio = FakeRadio::default();
        let clock = FakeClock::default();
        let mut controller = controller(&modem, &radio, &clock);

        assert!(!controller.is_time_valid());
        controller.poll(CELLULAR_QUERY_INTERVAL_MS);

        assert_eq!(modem.sent(), ["+CCLK?"]);
        assert_eq!(controller.state(), TimeSyncState::Done);
        assert!(controller.is_time_valid());
        assert_eq!(controller.source(), TimeSource::Cellular);
        assert_eq!(controller.date(), "15-03-2024");
        assert_eq!(controller.time(), "10:30:00");
        assert_eq!(controller.status_line(), "15-03-2024 10:30:00");
        assert!(radio.calls().is_empty());
    }

    #[test]
    fn scenario_b_no_clock_and_no_known_network_fails() {
        let modem = FakeModem::replying(&["\r\nERROR\r\n"]);
        let radio = FakeRadio::seeing(&["Neighbour", "Cafe"], None);
        let clock = FakeClock::default();
        let mut controller = controller(&modem, &radio, &clock);

        run(&mut controller, 0, 20_000, 100);

        assert_eq!(controller.state(), TimeSyncState::Failed);
        assert!(!controller.is_time_valid());
        assert_eq!(controller.source(), TimeSource::None);
        assert_eq!(radio.calls(), ["station", "disconnect", "scan"]);
        assert_eq!(controller.status_line(), "01-01-1970  00:00:00");
    }

    #[test]
    fn scenario_c_wifi_then_ntp() {
        let modem = FakeModem::replying(&["OK\r\n"]);
        let radio = FakeRadio::seeing(&["Cafe", "Redmi Note 13"], Some(3));
        let clock = FakeClock::default();
        let mut controller = controller(&modem, &radio, &clock);

        controller.poll(3000); // +CCLK fails
        assert_eq!(controller.state(), TimeSyncState::ScanningWifi);

        controller.poll(7999); // scan still rate limited
        assert_eq!(controller.state(), TimeSyncState::ScanningWifi);
        controller.poll(8000);
        assert_eq!(controller.state(), TimeSyncState::ConnectingWifi);
        assert_eq!(radio.connecting_to().as_deref(), Some("Redmi Note 13"));

        run(&mut controller, 8100, 8500, 100);
        assert_eq!(controller.state(), TimeSyncState::RequestingNetworkTime);
        assert_eq!(controller.source(), TimeSource::Wifi);
        assert!(!controller.is_time_valid());

        controller.poll(9000);
        assert_eq!(controller.state(), TimeSyncState::RequestingNetworkTime);

        clock.ntp_lands(NTP_EPOCH);
        controller.poll(9100);

        assert_eq!(controller.state(), TimeSyncState::Done);
        assert!(controller.is_time_valid());
        assert_eq!(controller.source(), TimeSource::Wifi);
        assert_eq!(controller.date(), "10-06-2024");
        assert_eq!(controller.time(), "09:13:20");
        assert!(clock.set_calls().is_empty());
    }

    #[test]
    fn scenario_d_association_timeout_fails_before_ntp() {
        let modem = FakeModem::replying(&[""]);
        let radio = FakeRadio::seeing(&["COSMOTE-32bssa"], None);
        let clock = FakeClock::default();
        let mut controller = controller(&modem, &radio, &clock);

        controller.poll(3000);
        controller.poll(8000);
        assert_eq!(controller.state(), TimeSyncState::ConnectingWifi);

        controller.poll(16_000); // exactly at the deadline, still waiting
        assert_eq!(controller.state(), TimeSyncState::ConnectingWifi);
        controller.poll(16_001);

        assert_eq!(controller.state(), TimeSyncState::Failed);
        assert_eq!(controller.source(), TimeSource::None);
        assert!(!controller.is_time_valid());
    }

    #[test]
    fn cellular_query_is_rate_limited() {
        let modem = FakeModem::replying(&[CCLK_OK]);
        let radio = FakeRadio::default();
        let clock = FakeClock::default();
        let mut controller = controller(&modem, &radio, &clock);

        run(&mut controller, 0, 2999, 50);

        assert!(modem.sent().is_empty());
        assert_eq!(modem.reads(), 0);
        assert_eq!(controller.state(), TimeSyncState::CheckingCellularClock);
    }

    #[test]
    fn cellular_is_tried_once_before_any_scan() {
        let modem = FakeModem::replying(&["garbage", CCLK_OK]);
        let radio = FakeRadio::seeing(&[], None);
        let clock = FakeClock::default();
        let mut controller = controller(&modem, &radio, &clock);

        controller.poll(3000);
        assert_eq!(modem.reads(), 1);
        assert!(radio.calls().is_empty());

        run(&mut controller, 3100, 30_000, 100);

        // The modem would now answer, but the cellular path is not revisited
        assert_eq!(modem.sent(), ["+CCLK?"]);
        assert_eq!(controller.state(), TimeSyncState::Failed);
    }

    #[test]
    fn done_is_idempotent() {
        let modem = FakeModem::replying(&[CCLK_OK]);
        let radio = FakeRadio::seeing(&["COSMOTE-32bssa"], Some(0));
        let clock = FakeClock::default();
        let mut controller = controller(&modem, &radio, &clock);

        controller.poll(3000);
        let session = controller.session();

        run(&mut controller, 3000, 60_000, 250);

        assert_eq!(controller.session(), session);
        assert_eq!(controller.source(), TimeSource::Cellular);
        assert_eq!(modem.sent().len(), 1);
        assert!(radio.calls().is_empty());
        assert_eq!(clock.configure_count(), 1);
    }

    #[test]
    fn failed_is_terminal_until_reinitialized() {
        let modem = FakeModem::replying(&["", CCLK_OK]);
        let radio = FakeRadio::seeing(&[], None);
        let clock = FakeClock::default();
        let mut controller = controller(&modem, &radio, &clock);

        controller.poll(3000);
        controller.poll(8000);
        assert_eq!(controller.state(), TimeSyncState::Failed);
        let session = controller.session();

        run(&mut controller, 8000, 120_000, 500);
        assert_eq!(controller.session(), session);
        assert_eq!(radio.calls().len(), 3);

        controller.initialize(200_000);
        assert_eq!(controller.state(), TimeSyncState::CheckingCellularClock);
        assert!(!controller.is_time_valid());
        assert_eq!(controller.source(), TimeSource::None);

        controller.poll(202_999);
        assert_eq!(modem.sent().len(), 1);
        controller.poll(203_000);
        assert_eq!(controller.state(), TimeSyncState::Done);
        assert_eq!(controller.source(), TimeSource::Cellular);
    }

    #[test]
    fn ntp_is_rekicked_while_waiting() {
        let modem = FakeModem::default();
        let radio = FakeRadio::seeing(&["COSMOTE-32bssa"], Some(0));
        let clock = FakeClock::default();
        let mut controller = controller(&modem, &radio, &clock);

        controller.poll(3000);
        controller.poll(8000);
        controller.poll(8100);
        assert_eq!(controller.state(), TimeSyncState::RequestingNetworkTime);
        assert_eq!(clock.configure_count(), 1);

        controller.poll(13_099);
        assert_eq!(clock.configure_count(), 1);
        controller.poll(13_100);
        assert_eq!(clock.configure_count(), 2);
        controller.poll(18_099);
        assert_eq!(clock.configure_count(), 2);
        controller.poll(18_100);
        assert_eq!(clock.configure_count(), 3);

        // A clock just past the epoch is not trusted
        clock.ntp_lands(NTP_SANITY_EPOCH_SECS);
        controller.poll(18_200);
        assert!(!controller.is_time_valid());

        clock.ntp_lands(NTP_SANITY_EPOCH_SECS + 1);
        controller.poll(18_300);
        assert!(controller.is_time_valid());
    }

    #[test]
    fn idle_controller_does_nothing() {
        let modem = FakeModem::replying(&[CCLK_OK]);
        let radio = FakeRadio::default();
        let clock = FakeClock::default();
        let mut controller = TimeSyncController::new(
            modem.clone(),
            radio.clone(),
            clock.clone(),
            KnownNetworks::with_defaults(),
            TimeZoneConfig::default(),
        );

        run(&mut controller, 0, 10_000, 500);

        assert_eq!(controller.state(), TimeSyncState::Idle);
        assert!(modem.sent().is_empty());
        assert_eq!(clock.configure_count(), 0);
    }

    #[test]
    fn custom_timings_are_honoured() {
        let modem = FakeModem::replying(&[CCLK_OK]);
        let radio = FakeRadio::default();
        let clock = FakeClock::default();
        let mut controller = TimeSyncController::new(
            modem.clone(),
            radio,
            clock,
            KnownNetworks::with_defaults(),
            TimeZoneConfig::default(),
        )
        .with_timings(SyncTimings {
            cellular_query_interval_ms: 0,
            ..SyncTimings::default()
        });

        controller.initialize(42);
        controller.poll(42);
        assert_eq!(controller.state(), TimeSyncState::Done);
    }

    #[test]
    fn formatting_crosses_midnight_with_offset() {
        // 2023-12-31 22:30:05 UTC
        assert_eq!(format_date(1_704_061_805, 10_800), "01-01-2024");
        assert_eq!(format_time(1_704_061_805, 10_800), "01:30:05");
        assert_eq!(format_date(1_704_061_805, -36_000), "31-12-2023");
        assert_eq!(format_time(1_704_061_805, -36_000), "12:30:05");
    }

    #[test]
    fn unsynced_clock_shows_offset_epoch() {
        let clock = FakeClock::default();
        let controller = controller(&FakeModem::default(), &FakeRadio::default(), &clock);

        assert_eq!(controller.date(), "01-01-1970");
        assert_eq!(controller.time(), "03:00:00");
        assert_eq!(TimeSource::None.label(), "NONE");
        assert_eq!(TimeSource::Cellular.label(), "LTE");
    }

    #[test]
    fn state_watch_reports_each_state_once() {
        let mut watch = StateWatch::new();

        assert_eq!(watch.changed(TimeSyncState::Idle), Some(TimeSyncState::Idle));
        assert_eq!(watch.changed(TimeSyncState::Idle), None);
        assert_eq!(
            watch.changed(TimeSyncState::CheckingCellularClock),
            Some(TimeSyncState::CheckingCellularClock)
        );
        assert_eq!(watch.changed(TimeSyncState::Idle), Some(TimeSyncState::Idle));
    }

    #[test]
    fn network_update_while_failed_is_not_a_new_failure() {
        let modem = FakeModem::replying(&[""]);
        let radio = FakeRadio::seeing(&[], None);
        let clock = FakeClock::default();
        let mut controller = controller(&modem, &radio, &clock);
        let mut watch = StateWatch::new();
        assert!(watch.changed(controller.state()).is_some());

        controller.poll(3000);
        controller.poll(8000);
        assert_eq!(watch.changed(controller.state()), Some(TimeSyncState::Failed));

        // Storing or clearing credentials only swaps the list
        controller.set_known_networks(KnownNetworks::merged(vec![NetworkCredentials::new(
            "Apiary", "hunter22",
        )]));
        assert_eq!(watch.changed(controller.state()), None);
        controller.set_known_networks(KnownNetworks::with_defaults());
        assert_eq!(watch.changed(controller.state()), None);

        controller.initialize(10_000);
        assert_eq!(
            watch.changed(controller.state()),
            Some(TimeSyncState::CheckingCellularClock)
        );
    }
}
