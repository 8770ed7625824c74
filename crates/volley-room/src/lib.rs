//! Room membership and routing for the Volley relay.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! host seat, its players, and its broadcast group.
//!
//! # Key types
//!
//! - [`RoomDirectory`]: creates/deletes rooms, indexes memberships
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomState`]: lifecycle state machine
//! - [`RoomConfig`]: settings shared by every room

mod config;
mod directory;
mod error;
mod room;

pub use config::{HostClaim, RoomConfig, RoomState};
pub use directory::RoomDirectory;
pub use error::RoomError;
pub use room::{ClientSender, Departure, JoinAs, Player, RoomHandle, RoomInfo};
