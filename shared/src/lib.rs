// Hardware-free core of the beehive monitor firmware
// Time acquisition state machine, modem response parsing and connectivity arbitration

pub mod connectivity;
pub mod console;
pub mod known_networks;
pub mod modem_response;
pub mod platform;
pub mod time_sync;

pub use connectivity::{select_link, ActiveLink, LinkStatus, NetworkPreference};
pub use known_networks::{KnownNetworks, NetworkCredentials};
pub use modem_response::CellularTimestamp;
pub use platform::{ModemClock, NetworkAssociation, SystemClock, TimeZoneConfig};
pub use time_sync::{StateWatch, SyncTimings, TimeSource, TimeSyncController, TimeSyncState};

#[cfg(test)]
pub(crate) mod fakes;
