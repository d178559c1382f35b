// Ordered list of Wi-Fi networks the device may join for NTP
// Selection is first match in list order, never strongest signal

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCredentials {
    pub ssid: String,
    pub passphrase: String,
}

impl NetworkCredentials {
    pub fn new(ssid: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            passphrase: passphrase.into(),
        }
    }
}

/// Built-in field hotspots, tried after anything provisioned by the user
const DEFAULT_HOTSPOTS: [(&str, &str); 2] = [
    ("COSMOTE-32bssa", "vudvvc5x97s4afpk"),
    ("Redmi Note 13", "nen57asz5g44sh2"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownNetworks {
    entries: Vec<NetworkCredentials>,
}

impl KnownNetworks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut networks = Self::new();
        for (ssid, passphrase) in DEFAULT_HOTSPOTS {
            networks.push(NetworkCredentials::new(ssid, passphrase));
        }
        networks
    }

    /// Provisioned credentials first, then the built-in hotspots.
    pub fn merged(provisioned: impl IntoIterator<Item = NetworkCredentials>) -> Self {
        let mut networks = Self::new();
        for credentials in provisioned {
            networks.push(credentials);
        }
        for credentials in Self::with_defaults().entries {
            networks.push(credentials);
        }
        networks
    }

    /// Append unless the SSID is empty or already listed (the earlier entry keeps its slot).
    pub fn push(&mut self, credentials: NetworkCredentials) -> bool {
        if credentials.ssid.is_empty() || self.contains(&credentials.ssid) {
            return false;
        }
        self.entries.push(credentials);
        true
    }

    pub fn contains(&self, ssid: &str) -> bool {
        self.entries.iter().any(|entry| entry.ssid == ssid)
    }

    /// First listed network that appears in the scan results.
    pub fn first_visible<S: AsRef<str>>(&self, scan: &[S]) -> Option<&NetworkCredentials> {
        self.entries
            .iter()
            .find(|entry| scan.iter().any(|seen| seen.as_ref() == entry.ssid))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkCredentials> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_order_beats_scan_order() {
        let networks = KnownNetworks::with_defaults();
        let scan = ["Redmi Note 13", "NeighbourNet", "COSMOTE-32bssa"];

        let chosen = networks.first_visible(&scan[..]).expect("match");
        assert_eq!(chosen.ssid, "COSMOTE-32bssa");
    }

    #[test]
    fn no_visible_network_yields_none() {
        let networks = KnownNetworks::with_defaults();
        assert!(networks.first_visible(&["cosmote-32bssa", "Other"][..]).is_none());
        assert!(networks.first_visible::<&str>(&[]).is_none());
    }

    #[test]
    fn provisioned_entries_come_first_without_duplicates() {
        let networks = KnownNetworks::merged(vec![
            NetworkCredentials::new("Apiary", "honeybees"),
            NetworkCredentials::new("", "ignored"),
            NetworkCredentials::new("Redmi Note 13", "newpass123"),
        ]);

        let ssids: Vec<&str> = networks.iter().map(|n| n.ssid.as_str()).collect();
        assert_eq!(ssids, ["Apiary", "Redmi Note 13", "COSMOTE-32bssa"]);
        assert_eq!(networks.iter().nth(1).unwrap().passphrase, "newpass123");
    }
}
