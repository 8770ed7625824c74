//! Process configuration, read from the environment at startup.

use volley_room::{HostClaim, RoomConfig};
use volley_transport::OriginPolicy;

use crate::VolleyError;

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 4000;

/// Address used when `HOST` is unset.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Everything the relay needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed to open a connection.
    pub allowed_origins: OriginPolicy,
    /// What a second host join does to a room that already has one.
    pub host_claim: HostClaim,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            allowed_origins: OriginPolicy::Any,
            host_claim: HostClaim::RequireTakeover,
        }
    }
}

impl RelayConfig {
    /// Reads `PORT`, `HOST`, `VOLLEY_ALLOWED_ORIGINS` and
    /// `VOLLEY_HOST_TAKEOVER`. Unset or empty variables keep their defaults.
    pub fn from_env() -> Result<Self, VolleyError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through
    /// `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, VolleyError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(port) = get("PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| VolleyError::Config(format!("PORT must be a port number, got {port:?}")))?;
        }
        if let Some(host) = get("HOST") {
            config.host = host.trim().to_string();
        }
        if let Some(origins) = get("VOLLEY_ALLOWED_ORIGINS") {
            config.allowed_origins = OriginPolicy::parse(&origins).ok_or_else(|| {
                VolleyError::Config(format!("VOLLEY_ALLOWED_ORIGINS lists no origins: {origins:?}"))
            })?;
        }
        if let Some(mode) = get("VOLLEY_HOST_TAKEOVER") {
            config.host_claim = mode
                .parse()
                .map_err(|e| VolleyError::Config(format!("VOLLEY_HOST_TAKEOVER: {e}")))?;
        }

        Ok(config)
    }

    /// `host:port`, ready for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The settings handed to every room.
    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            host_claim: self.host_claim,
            ..RoomConfig::default()
        }
    }
}
