// Cellular Modem Module
// AT command transport to the A7670 LTE modem on UART2, power-key handling and registration checks

use std::thread;
use std::time::{Duration, Instant};

// Import ESP-IDF HAL pieces for the UART link and the power key line
use esp_idf_svc::hal::delay::NON_BLOCK;
use esp_idf_svc::hal::gpio::{AnyIOPin, Gpio26, Gpio27, Gpio4, Output, PinDriver};
use esp_idf_svc::hal::uart::{config::Config, UartDriver, UART2};
use esp_idf_svc::hal::units::Hertz;

use anyhow::Result;
use log::{debug, info, warn};

use hive_shared::modem_response::{is_registered, parse_registration_status};
use hive_shared::ModemClock;

// Modem wiring and link constants
pub const MODEM_BAUD_RATE: u32 = 115_200;
const POWER_KEY_HOLD_MS: u64 = 1200; // Long hold turns the A7670 on
const POWER_UP_SETTLE_MS: u64 = 1500;
const AT_PROBE_TIMEOUT: Duration = Duration::from_millis(5000);
const RESPONSE_WINDOW: Duration = Duration::from_millis(1000); // Bounded read per command
const READ_IDLE_SLEEP_MS: u64 = 10;
const READ_CHUNK_SIZE: usize = 128;

/// UART-attached modem; the only AT client in the firmware
pub struct UartModem {
    uart: UartDriver<'static>,
    power_key: PinDriver<'static, Gpio4, Output>,
    response_window: Duration,
}

impl UartModem {
    pub fn new(uart: UART2, tx: Gpio26, rx: Gpio27, power_key: Gpio4) -> Result<Self> {
        info!("📡 Initializing modem UART (TX=26, RX=27, {} baud)", MODEM_BAUD_RATE);

        let config = Config::default().baudrate(Hertz(MODEM_BAUD_RATE));
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &config,
        )?;

        let mut power_key = PinDriver::output(power_key)?;
        power_key.set_low()?;

        Ok(Self {
            uart,
            power_key,
            response_window: RESPONSE_WINDOW,
        })
    }

    /// Pulse the power key and check the modem answers `AT`. Blocking, start-up only.
    pub fn power_on(&mut self) -> Result<bool> {
        info!("🔌 Pulsing modem power key ({}ms)", POWER_KEY_HOLD_MS);

        self.power_key.set_high()?;
        thread::sleep(Duration::from_millis(POWER_KEY_HOLD_MS));
        self.power_key.set_low()?;
        thread::sleep(Duration::from_millis(POWER_UP_SETTLE_MS));

        self.drain();
        self.send_command("");
        let response = self.read_for(AT_PROBE_TIMEOUT);

        if response.contains("OK") {
            info!("✅ Modem responded to AT");
            Ok(true)
        } else {
            warn!("⚠️ Modem did not answer AT (got {:?}) - check wiring/power", response.trim());
            Ok(false)
        }
    }

    /// Full functionality mode so the network clock and registration are available.
    pub fn enable_radio(&mut self) {
        self.send_command("+CFUN=1");
        let response = self.read_raw_response();
        debug!("📡 +CFUN=1 -> {:?}", response.trim());
    }

    /// Home (1) or roaming (5) registration, checking LTE first then the legacy register.
    pub fn is_network_registered(&mut self) -> bool {
        for query in ["+CEREG?", "+CREG?"] {
            self.send_command(query);
            let response = self.read_raw_response();
            if let Some(stat) = parse_registration_status(&response) {
                if is_registered(stat) {
                    return true;
                }
            }
        }
        false
    }

    fn drain(&mut self) {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        while let Ok(n) = self.uart.read(&mut buf, NON_BLOCK) {
            if n == 0 {
                break;
            }
        }
    }

    fn read_for(&mut self, window: Duration) -> String {
        let start = Instant::now();
        let mut response = String::new();
        let mut buf = [0u8; READ_CHUNK_SIZE];

        while start.elapsed() < window {
            match self.uart.read(&mut buf, NON_BLOCK) {
                Ok(n) if n > 0 => {
                    response.push_str(&String::from_utf8_lossy(&buf[..n]));
                    if response.contains("OK\r\n") || response.contains("ERROR") {
                        break;
                    }
                }
                _ => thread::sleep(Duration::from_millis(READ_IDLE_SLEEP_MS)),
            }
        }

        response
    }
}

impl ModemClock for UartModem {
    fn send_command(&mut self, command: &str) {
        self.drain();
        let line = format!("AT{}\r\n", command);
        debug!("📡 >> {}", line.trim_end());

        if let Err(e) = self.uart.write(line.as_bytes()) {
            warn!("⚠️ Failed to write AT command: {:?}", e);
        }
    }

    fn read_raw_response(&mut self) -> String {
        let response = self.read_for(self.response_window);
        debug!("📡 << {:?}", response);
        response
    }
}
