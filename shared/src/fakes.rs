// Scriptable stand-ins for the modem, radio and clock used by unit tests
// Each fake hands out a shared handle so tests can inspect and steer it while the controller owns it

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::platform::{ModemClock, NetworkAssociation, SystemClock, TimeZoneConfig};

#[derive(Debug, Default)]
pub struct ModemLog {
    pub replies: VecDeque<String>,
    pub sent: Vec<String>,
    pub reads: usize,
}

#[derive(Clone, Default)]
pub struct FakeModem(pub Rc<RefCell<ModemLog>>);

impl FakeModem {
    pub fn replying(replies: &[&str]) -> Self {
        let modem = Self::default();
        modem
            .0
            .borrow_mut()
            .replies
            .extend(replies.iter().map(|r| r.to_string()));
        modem
    }

    pub fn sent(&self) -> Vec<String> {
        self.0.borrow().sent.clone()
    }

    pub fn reads(&self) -> usize {
        self.0.borrow().reads
    }
}

impl ModemClock for FakeModem {
    fn send_command(&mut self, command: &str) {
        self.0.borrow_mut().sent.push(command.to_string());
    }

    fn read_raw_response(&mut self) -> String {
        let mut log = self.0.borrow_mut();
        log.reads += 1;
        log.replies.pop_front().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct RadioLog {
    pub visible: Vec<String>,
    /// Number of status checks after `begin_connect` before the link reports up
    pub connect_after_checks: Option<u32>,
    pub checks_since_connect: u32,
    pub connecting_to: Option<String>,
    pub calls: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeRadio(pub Rc<RefCell<RadioLog>>);

impl FakeRadio {
    pub fn seeing(visible: &[&str], connect_after_checks: Option<u32>) -> Self {
        let radio = Self::default();
        {
            let mut log = radio.0.borrow_mut();
            log.visible = visible.iter().map(|s| s.to_string()).collect();
            log.connect_after_checks = connect_after_checks;
        }
        radio
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.borrow().calls.clone()
    }

    pub fn connecting_to(&self) -> Option<String> {
        self.0.borrow().connecting_to.clone()
    }
}

impl NetworkAssociation for FakeRadio {
    fn set_station_mode(&mut self) {
        self.0.borrow_mut().calls.push("station".to_string());
    }

    fn disconnect(&mut self) {
        let mut log = self.0.borrow_mut();
        log.calls.push("disconnect".to_string());
        log.connecting_to = None;
    }

    fn scan_networks(&mut self) -> Vec<String> {
        let mut log = self.0.borrow_mut();
        log.calls.push("scan".to_string());
        log.visible.clone()
    }

    fn begin_connect(&mut self, ssid: &str, _passphrase: &str) {
        let mut log = self.0.borrow_mut();
        log.calls.push(format!("connect:{}", ssid));
        log.connecting_to = Some(ssid.to_string());
        log.checks_since_connect = 0;
    }

    fn is_connected(&mut self) -> bool {
        let mut log = self.0.borrow_mut();
        if log.connecting_to.is_none() {
            return false;
        }
        log.checks_since_connect += 1;
        match log.connect_after_checks {
            Some(after) => log.checks_since_connect > after,
            None => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct ClockLog {
    pub epoch: i64,
    pub configured: Vec<TimeZoneConfig>,
    pub set_calls: Vec<i64>,
}

#[derive(Clone, Default)]
pub struct FakeClock(pub Rc<RefCell<ClockLog>>);

impl FakeClock {
    /// Simulates the background NTP client landing a time.
    pub fn ntp_lands(&self, epoch: i64) {
        self.0.borrow_mut().epoch = epoch;
    }

    pub fn configure_count(&self) -> usize {
        self.0.borrow().configured.len()
    }

    pub fn set_calls(&self) -> Vec<i64> {
        self.0.borrow().set_calls.clone()
    }
}

impl SystemClock for FakeClock {
    fn configure_timezone(&mut self, zone: &TimeZoneConfig) {
        self.0.borrow_mut().configured.push(zone.clone());
    }

    fn now(&self) -> i64 {
        self.0.borrow().epoch
    }

    fn set_clock(&mut self, epoch_secs: i64) {
        let mut log = self.0.borrow_mut();
        log.epoch = epoch_secs;
        log.set_calls.push(epoch_secs);
    }
}
