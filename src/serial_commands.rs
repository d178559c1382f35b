// Serial Command Console
// Line-based commands on the USB/UART console, read on a plain thread and
// forwarded to the time sync task through the connectivity request channel

use std::io::Read;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use hive_shared::console::{parse_command, ConsoleCommand, ConsoleError, LineBuffer, HELP_TEXT};
use hive_shared::time_sync::{format_date, format_time};

use crate::settings::{
    request_network_clear, request_network_store, request_offset_change,
    request_preference_change, request_time_resync,
};
use crate::system_clock::current_epoch;
use crate::system_state::SYSTEM_STATE;

const CONSOLE_STACK_SIZE: usize = 6 * 1024;
const CONSOLE_IDLE_MS: u64 = 50;

pub fn start_console() -> Result<()> {
    thread::Builder::new()
        .name("console".to_string())
        .stack_size(CONSOLE_STACK_SIZE)
        .spawn(console_loop)?;

    info!("[CMD] Serial commands ready. Type 'help' for help.");
    Ok(())
}

fn console_loop() {
    let mut stdin = std::io::stdin();
    let mut buffer = LineBuffer::new();
    let mut byte = [0u8; 1];

    loop {
        match stdin.read(&mut byte) {
            Ok(1) => {
                if let Some(line) = buffer.push(char::from(byte[0])) {
                    dispatch(&line);
                }
            }
            // The IDF console is non-blocking: nothing pending
            _ => thread::sleep(Duration::from_millis(CONSOLE_IDLE_MS)),
        }
    }
}

fn dispatch(line: &str) {
    match parse_command(line) {
        Ok(ConsoleCommand::Help) => println!("{}", HELP_TEXT),
        Ok(ConsoleCommand::TimeStatus) => print_time_status(),
        Ok(ConsoleCommand::TimeResync) => {
            println!("[CMD] Restarting time sync");
            request_time_resync();
        }
        Ok(ConsoleCommand::SetPreference(preference)) => {
            println!("[CMD] Mode: {} saved", preference.label());
            request_preference_change(preference);
        }
        Ok(ConsoleCommand::StoreNetwork { slot, credentials }) => {
            println!("[CMD] Storing WiFi slot {}: {}", slot + 1, credentials.ssid);
            request_network_store(slot, credentials);
        }
        Ok(ConsoleCommand::ClearNetworks) => {
            println!("[CMD] Clearing provisioned WiFi networks");
            request_network_clear();
        }
        Ok(ConsoleCommand::SetOffsets {
            gmt_offset_secs,
            dst_offset_secs,
        }) => {
            println!(
                "[CMD] Offsets: GMT {:+}s, DST {:+}s",
                gmt_offset_secs, dst_offset_secs
            );
            request_offset_change(gmt_offset_secs, dst_offset_secs);
        }
        Err(ConsoleError::Empty) => {}
        Err(e) => println!("[CMD] {}", e),
    }
}

fn print_time_status() {
    // Never block the console on the async mutex
    let Ok(state) = SYSTEM_STATE.try_lock() else {
        warn!("[CMD] System state busy, try again");
        return;
    };

    let now = current_epoch();
    println!("[CMD] Time sync status:");
    println!("  state:  {:?}", state.time_state);
    println!("  valid:  {}", state.time_valid);
    println!("  source: {}", state.time_source.label());
    println!(
        "  local:  {} {}",
        format_date(now, state.utc_offset_secs),
        format_time(now, state.utc_offset_secs)
    );
    println!(
        "  link:   {} (mode {}, LTE {}, WiFi {})",
        state.active_link.label(),
        state.preference.label(),
        if state.lte_registered { "registered" } else { "not registered" },
        if state.wifi_connected { "connected" } else { "not connected" }
    );
}
