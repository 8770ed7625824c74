//! Error types for the room layer.

use volley_protocol::{ConnectionId, RoomId};

/// Errors that can occur during room operations.
///
/// Missing rooms ([`NotFound`](Self::NotFound),
/// [`Unavailable`](Self::Unavailable)) are no-ops for the relay; everything
/// else is a refused request the acting connection should hear about.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// Only the room's host may do this.
    #[error("{conn} is not the host of room {room}")]
    NotHost { conn: ConnectionId, room: RoomId },

    /// Only a registered player may do this.
    #[error("{conn} is not a player in room {room}")]
    NotPlayer { conn: ConnectionId, room: RoomId },

    /// The connection never joined this room.
    #[error("{conn} is not a member of room {room}")]
    NotMember { conn: ConnectionId, room: RoomId },

    /// The payload named a different participant than the sender.
    #[error("{conn} cannot act as {claimed}")]
    Impersonation {
        conn: ConnectionId,
        claimed: ConnectionId,
    },

    /// Another connection already hosts the room and no takeover was asked.
    #[error("room {room} already has host {host}")]
    HostAlreadyAssigned { room: RoomId, host: ConnectionId },

    /// The host tried to join its own room as a player.
    #[error("{conn} already hosts room {room}")]
    AlreadyHost { conn: ConnectionId, room: RoomId },

    /// The room's actor stopped before answering.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

impl RoomError {
    /// Returns `true` if the room simply isn't there (any more).
    pub fn is_missing_room(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Unavailable(_))
    }

    /// HTTP-style status code reported to the client.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::Unavailable(_) => 404,
            Self::NotHost { .. }
            | Self::NotPlayer { .. }
            | Self::NotMember { .. }
            | Self::Impersonation { .. } => 403,
            Self::HostAlreadyAssigned { .. } | Self::AlreadyHost { .. } => 409,
        }
    }
}
