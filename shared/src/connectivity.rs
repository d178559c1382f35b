// Connectivity mode preference and the link it selects

use serde::{Deserialize, Serialize};

/// User-selected network mode, stored as 0 (auto), 1 (Wi-Fi), 2 (LTE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetworkPreference {
    #[default]
    Auto,
    Wifi,
    Lte,
}

impl NetworkPreference {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => NetworkPreference::Wifi,
            2 => NetworkPreference::Lte,
            _ => NetworkPreference::Auto,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            NetworkPreference::Auto => 0,
            NetworkPreference::Wifi => 1,
            NetworkPreference::Lte => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NetworkPreference::Auto => "Auto",
            NetworkPreference::Wifi => "WiFi",
            NetworkPreference::Lte => "LTE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub lte_registered: bool,
    pub wifi_connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveLink {
    Lte,
    Wifi,
    #[default]
    None,
}

impl ActiveLink {
    pub fn label(self) -> &'static str {
        match self {
            ActiveLink::Lte => "LTE",
            ActiveLink::Wifi => "WIFI",
            ActiveLink::None => "OFFLINE",
        }
    }
}

/// Auto prefers a registered modem over Wi-Fi; a forced mode only ever uses its own link.
pub fn select_link(preference: NetworkPreference, status: LinkStatus) -> ActiveLink {
    match preference {
        NetworkPreference::Auto if status.lte_registered => ActiveLink::Lte,
        NetworkPreference::Auto if status.wifi_connected => ActiveLink::Wifi,
        NetworkPreference::Wifi if status.wifi_connected => ActiveLink::Wifi,
        NetworkPreference::Lte if status.lte_registered => ActiveLink::Lte,
        _ => ActiveLink::None,
    }
}
