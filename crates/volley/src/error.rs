//! Unified error type for the Volley relay.

use volley_protocol::ProtocolError;
use volley_room::RoomError;
use volley_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum VolleyError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (missing room, role check, host conflict).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The relay configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}
