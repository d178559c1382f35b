// Serial console commands for connectivity and time
// Lines are case-insensitive in the keywords; SSIDs and passphrases keep their case

use crate::connectivity::NetworkPreference;
use crate::known_networks::NetworkCredentials;

/// Longest line the console keeps; the rest is dropped
pub const MAX_LINE_LEN: usize = 200;

pub const HELP_TEXT: &str = "\
Commands:
  time status            -> print time sync state, source and local time
  time resync            -> restart time acquisition (LTE clock, then WiFi NTP)
  net auto|wifi|lte      -> set the preferred network mode
  wifi set <1|2> <ssid>|<passphrase>
                         -> store provisioned WiFi credentials in a slot
  wifi clear             -> forget provisioned WiFi credentials
  tz <gmt_secs> <dst_secs>
                         -> set the UTC offset and daylight saving offset
  help                   -> print this help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    TimeStatus,
    TimeResync,
    SetPreference(NetworkPreference),
    StoreNetwork {
        slot: usize, // Zero based
        credentials: NetworkCredentials,
    },
    ClearNetworks,
    SetOffsets {
        gmt_offset_secs: i32,
        dst_offset_secs: i32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    Empty,
    Unknown(String),
    Usage(&'static str),
}

impl core::fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConsoleError::Empty => write!(f, "empty command"),
            ConsoleError::Unknown(cmd) => write!(f, "unknown command '{}', type 'help'", cmd),
            ConsoleError::Usage(usage) => write!(f, "usage: {}", usage),
        }
    }
}

impl std::error::Error for ConsoleError {}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ConsoleError::Empty);
    }

    let (keyword, rest) = split_word(line);
    match keyword.to_ascii_lowercase().as_str() {
        "help" | "?" => Ok(ConsoleCommand::Help),
        "time" => match rest.to_ascii_lowercase().as_str() {
            "status" | "" => Ok(ConsoleCommand::TimeStatus),
            "resync" | "sync" => Ok(ConsoleCommand::TimeResync),
            _ => Err(ConsoleError::Usage("time status|resync")),
        },
        "net" => match rest.to_ascii_lowercase().as_str() {
            "auto" => Ok(ConsoleCommand::SetPreference(NetworkPreference::Auto)),
            "wifi" => Ok(ConsoleCommand::SetPreference(NetworkPreference::Wifi)),
            "lte" => Ok(ConsoleCommand::SetPreference(NetworkPreference::Lte)),
            _ => Err(ConsoleError::Usage("net auto|wifi|lte")),
        },
        "wifi" => parse_wifi(rest),
        "tz" => parse_offsets(rest),
        _ => Err(ConsoleError::Unknown(keyword.to_string())),
    }
}

fn parse_wifi(args: &str) -> Result<ConsoleCommand, ConsoleError> {
    const USAGE: &str = "wifi set <1|2> <ssid>|<passphrase> or wifi clear";

    let (action, rest) = split_word(args);
    match action.to_ascii_lowercase().as_str() {
        "clear" if rest.is_empty() => Ok(ConsoleCommand::ClearNetworks),
        "set" => {
            let (slot, credentials) = split_word(rest);
            let slot = match slot {
                "1" => 0,
                "2" => 1,
                _ => return Err(ConsoleError::Usage(USAGE)),
            };

            let (ssid, passphrase) = credentials.split_once('|').unwrap_or((credentials, ""));
            if ssid.is_empty() {
                return Err(ConsoleError::Usage(USAGE));
            }

            Ok(ConsoleCommand::StoreNetwork {
                slot,
                credentials: NetworkCredentials::new(ssid, passphrase),
            })
        }
        _ => Err(ConsoleError::Usage(USAGE)),
    }
}

fn parse_offsets(args: &str) -> Result<ConsoleCommand, ConsoleError> {
    const USAGE: &str = "tz <gmt_secs> <dst_secs>";
    // Anything beyond +-14h is not a real zone
    const MAX_OFFSET_SECS: i32 = 14 * 3600;

    let mut parts = args.split_whitespace();
    let (Some(gmt), Some(dst), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ConsoleError::Usage(USAGE));
    };

    let gmt_offset_secs: i32 = gmt.parse().map_err(|_| ConsoleError::Usage(USAGE))?;
    let dst_offset_secs: i32 = dst.parse().map_err(|_| ConsoleError::Usage(USAGE))?;

    if !(-MAX_OFFSET_SECS..=MAX_OFFSET_SECS).contains(&gmt_offset_secs)
        || !(0..=7200).contains(&dst_offset_secs)
    {
        return Err(ConsoleError::Usage(USAGE));
    }

    Ok(ConsoleCommand::SetOffsets {
        gmt_offset_secs,
        dst_offset_secs,
    })
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

/// Accumulates serial input into lines; `\r` is ignored and overlong lines are cut.
#[derive(Debug, Default)]
pub struct LineBuffer {
    line: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one character; returns a complete non-empty line on `\n`.
    pub fn push(&mut self, c: char) -> Option<String> {
        match c {
            '\r' => None,
            '\n' if self.line.is_empty() => None,
            '\n' => Some(std::mem::take(&mut self.line)),
            _ => {
                if self.line.len() < MAX_LINE_LEN {
                    self.line.push(c);
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_time_and_net_commands() {
        assert_eq!(parse_command("HELP"), Ok(ConsoleCommand::Help));
        assert_eq!(parse_command("  time  status "), Ok(ConsoleCommand::TimeStatus));
        assert_eq!(parse_command("Time Resync"), Ok(ConsoleCommand::TimeResync));
        assert_eq!(
            parse_command("net LTE"),
            Ok(ConsoleCommand::SetPreference(NetworkPreference::Lte))
        );
        assert!(matches!(parse_command("net 5g"), Err(ConsoleError::Usage(_))));
    }

    #[test]
    fn wifi_set_keeps_spaces_and_case() {
        assert_eq!(
            parse_command("wifi set 2 Redmi Note 13|nen57asz5g44sh2"),
            Ok(ConsoleCommand::StoreNetwork {
                slot: 1,
                credentials: NetworkCredentials::new("Redmi Note 13", "nen57asz5g44sh2"),
            })
        );
        assert_eq!(
            parse_command("wifi set 1 OpenApiary"),
            Ok(ConsoleCommand::StoreNetwork {
                slot: 0,
                credentials: NetworkCredentials::new("OpenApiary", ""),
            })
        );
        assert_eq!(parse_command("wifi clear"), Ok(ConsoleCommand::ClearNetworks));
        assert!(matches!(parse_command("wifi set 3 Net|pass"), Err(ConsoleError::Usage(_))));
        assert!(matches!(parse_command("wifi set 1 |pass"), Err(ConsoleError::Usage(_))));
    }

    #[test]
    fn tz_offsets_are_bounded() {
        assert_eq!(
            parse_command("tz 7200 3600"),
            Ok(ConsoleCommand::SetOffsets {
                gmt_offset_secs: 7200,
                dst_offset_secs: 3600,
            })
        );
        assert_eq!(
            parse_command("tz -18000 0"),
            Ok(ConsoleCommand::SetOffsets {
                gmt_offset_secs: -18_000,
                dst_offset_secs: 0,
            })
        );
        assert!(parse_command("tz 7200").is_err());
        assert!(parse_command("tz 90000 0").is_err());
        assert!(parse_command("tz 0 -3600").is_err());
        assert!(parse_command("tz 0 0 0").is_err());
    }

    #[test]
    fn tz_rejects_extreme_integers() {
        assert_eq!(
            parse_command("tz -2147483648 0"),
            Err(ConsoleError::Usage("tz <gmt_secs> <dst_secs>"))
        );
        assert!(parse_command("tz 2147483647 0").is_err());
        assert!(parse_command("tz 0 2147483647").is_err());
        assert!(parse_command("tz 0 -2147483648").is_err());
    }

    #[test]
    fn unknown_and_empty_lines() {
        assert_eq!(parse_command("   "), Err(ConsoleError::Empty));
        assert_eq!(
            parse_command("sms"),
            Err(ConsoleError::Unknown("sms".to_string()))
        );
    }

    #[test]
    fn line_buffer_splits_on_newline() {
        let mut buffer = LineBuffer::new();
        let mut lines = Vec::new();
        for c in "\r\nnet wifi\r\n\ntime\n".chars() {
            if let Some(line) = buffer.push(c) {
                lines.push(line);
            }
        }
        assert_eq!(lines, ["net wifi", "time"]);

        for _ in 0..(MAX_LINE_LEN + 50) {
            assert!(buffer.push('x').is_none());
        }
        assert_eq!(buffer.push('\n').map(|l| l.len()), Some(MAX_LINE_LEN));
    }
}
