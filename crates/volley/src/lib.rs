//! # Volley
//!
//! WebSocket room relay for host/player party games.
//!
//! A room has one host (the shared screen) and any number of players (the
//! phones). Volley keeps track of who is in which room and forwards events
//! between them by role: shots and confirmations go to the host, phase
//! changes and chat go to the whole room. It holds no game rules.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use volley::prelude::*;
//!
//! # async fn start() -> Result<(), VolleyError> {
//! let config = RelayConfig::from_env()?;
//! let server = VolleyServer::builder().bind(&config.bind_addr()).build().await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{DEFAULT_HOST, DEFAULT_PORT, RelayConfig};
pub use error::VolleyError;
pub use server::{VolleyServer, VolleyServerBuilder};

pub mod prelude {
    pub use crate::{RelayConfig, VolleyError, VolleyServer, VolleyServerBuilder};
    pub use volley_protocol::{ClientEvent, ConnectionId, RoomId, ServerEvent};
    pub use volley_room::{HostClaim, RoomConfig};
    pub use volley_transport::OriginPolicy;
}
