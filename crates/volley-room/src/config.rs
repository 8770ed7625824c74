//! Room configuration and lifecycle states.

use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room the directory creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfig {
    /// What happens when a second connection claims the host seat.
    pub host_claim: HostClaim,

    /// Capacity of each room actor's command queue. Callers wait when it
    /// is full.
    pub command_buffer: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            host_claim: HostClaim::RequireTakeover,
            command_buffer: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// HostClaim
// ---------------------------------------------------------------------------

/// Policy for a host join on a room that already has a different host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostClaim {
    /// Refuse the claim unless the join carries `takeover: true`.
    #[default]
    RequireTakeover,

    /// Any host join replaces the current host.
    Replace,
}

impl FromStr for HostClaim {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "require" | "require-takeover" => Ok(Self::RequireTakeover),
            "replace" => Ok(Self::Replace),
            other => Err(format!(
                "unknown host claim policy {other:?} (expected \"require\" or \"replace\")"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// Headless ──(host joins)──→ Hosted ──(host leaves)──→ Closed
/// ```
///
/// A room is created `Headless` when the first join is a player, or goes
/// straight to `Hosted` when the first join is the host. Players come and go
/// without changing the state. `Closed` rooms are gone from the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// No host yet; players may already be waiting.
    Headless,
    /// A host is assigned and receives routed events.
    Hosted,
    /// The host left; the room is being torn down.
    Closed,
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Headless => write!(f, "Headless"),
            Self::Hosted => write!(f, "Hosted"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_requires_takeover() {
        let config = RoomConfig::default();
        assert_eq!(config.host_claim, HostClaim::RequireTakeover);
        assert!(config.command_buffer > 0);
    }

    #[test]
    fn test_host_claim_parses_known_values() {
        assert_eq!("require".parse(), Ok(HostClaim::RequireTakeover));
        assert_eq!(" Replace ".parse(), Ok(HostClaim::Replace));
        assert!("evict".parse::<HostClaim>().is_err());
    }

    #[test]
    fn test_room_state_display() {
        assert_eq!(RoomState::Headless.to_string(), "Headless");
        assert_eq!(RoomState::Closed.to_string(), "Closed");
    }
}
