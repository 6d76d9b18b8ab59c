//! Upstream destinations and their health state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upstream system a record targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// Transactional datastore (direct inserts and assignment lookups)
    Storage,
    /// Remote administrative API (registrations and assignment checks)
    RemoteApi,
}

impl Destination {
    /// All destinations, in the order the resync scheduler visits them
    pub const ALL: [Destination; 2] = [Destination::Storage, Destination::RemoteApi];

    /// Stable string form used for persistence and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Storage => "storage",
            Destination::RemoteApi => "remote_api",
        }
    }

    /// Parse the persisted string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "storage" => Some(Destination::Storage),
            "remote_api" => Some(Destination::RemoteApi),
            _ => None,
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached liveness result for one destination
///
/// Ephemeral: recomputed on each probe, never persisted. Staleness is
/// bounded by the probe interval; callers needing a fresh answer must
/// probe directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DestinationHealth {
    pub destination: Destination,
    pub available: bool,
    pub checked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_round_trip() {
        for dest in Destination::ALL {
            assert_eq!(Destination::parse(dest.as_str()), Some(dest));
        }
        assert_eq!(Destination::parse("mysql"), None);
    }

    #[test]
    fn test_destination_serde_form() {
        let json = serde_json::to_string(&Destination::RemoteApi).unwrap();
        assert_eq!(json, "\"remote_api\"");
    }
}
