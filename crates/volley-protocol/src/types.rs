//! Wire events for the Volley relay.
//!
//! Every frame on the wire is one JSON object naming an event and carrying
//! its payload:
//!
//! ```text
//! { "event": "shoot", "data": { "roomId": "R1", "orientation": { ... } } }
//! ```
//!
//! [`ClientEvent`] is what participants send, [`ServerEvent`] is what the
//! relay sends back. Field names are camelCase to match browser clients.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use volley_transport::ConnectionId;

// ---------------------------------------------------------------------------
// RoomId
// ---------------------------------------------------------------------------

/// The name of a room, chosen by the clients.
///
/// Room ids are opaque strings; the relay never generates or parses them.
/// `#[serde(transparent)]` keeps the JSON a plain string, so `RoomId("R1")`
/// travels as `"R1"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ClientEvent: participant → relay
// ---------------------------------------------------------------------------

/// An event sent by a participant.
///
/// The sender is never part of the payload: the relay knows it from the
/// connection the frame arrived on. `participantId` fields are optional
/// claims that must match that connection when present.
///
/// Payload fields that have an obvious empty value are `#[serde(default)]`,
/// so sloppy clients get a harmless no-op instead of a dropped frame.
/// `roomId` is always required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Join a room as its host or as a player. Creates the room if unseen.
    ///
    /// `takeover` lets a host claim a room that already has a different host.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: RoomId,
        #[serde(default)]
        is_host: bool,
        #[serde(default)]
        takeover: bool,
    },

    /// A player fired; forwarded to the host with the player's orientation.
    #[serde(rename_all = "camelCase")]
    Shoot {
        room_id: RoomId,
        #[serde(default)]
        participant_id: Option<ConnectionId>,
        #[serde(default)]
        orientation: Value,
    },

    /// The host moves everyone to the next phase.
    #[serde(rename_all = "camelCase")]
    StartNextPhase { room_id: RoomId },

    /// A player acknowledges the current phase.
    #[serde(rename_all = "camelCase")]
    PhaseConfirmed {
        room_id: RoomId,
        #[serde(default)]
        participant_id: Option<ConnectionId>,
    },

    /// The host kicks a player.
    #[serde(rename_all = "camelCase")]
    RemovePlayer {
        room_id: RoomId,
        participant_id: ConnectionId,
    },

    /// A chat line, broadcast to the whole room.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        room_id: RoomId,
        #[serde(default)]
        message: String,
        #[serde(default)]
        sender: String,
    },

    /// Leave a room without closing the connection.
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: RoomId },
}

impl ClientEvent {
    /// The room this event targets.
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::JoinRoom { room_id, .. }
            | Self::Shoot { room_id, .. }
            | Self::StartNextPhase { room_id }
            | Self::PhaseConfirmed { room_id, .. }
            | Self::RemovePlayer { room_id, .. }
            | Self::SendMessage { room_id, .. }
            | Self::LeaveRoom { room_id } => room_id,
        }
    }

    /// The wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "joinRoom",
            Self::Shoot { .. } => "shoot",
            Self::StartNextPhase { .. } => "startNextPhase",
            Self::PhaseConfirmed { .. } => "phaseConfirmed",
            Self::RemovePlayer { .. } => "removePlayer",
            Self::SendMessage { .. } => "sendMessage",
            Self::LeaveRoom { .. } => "leaveRoom",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerEvent: relay → participant
// ---------------------------------------------------------------------------

/// An event sent by the relay.
///
/// Unit variants carry no `data` field: `{"event": "nextPhase"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// First frame on every connection: the id the relay knows it by.
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: ConnectionId },

    /// To the host: a player joined (or was already there when the host
    /// took the room).
    #[serde(rename_all = "camelCase")]
    PlayerJoined { player_id: ConnectionId },

    /// To the host: a player fired.
    #[serde(rename_all = "camelCase")]
    Shoot {
        participant_id: ConnectionId,
        orientation: Value,
    },

    /// To the whole room: advance to the next phase.
    NextPhase,

    /// To the host: a player confirmed the phase.
    #[serde(rename_all = "camelCase")]
    PhaseConfirmed { participant_id: ConnectionId },

    /// To a kicked player: you were removed by the host.
    Removed,

    /// To the host: a player was removed or disconnected.
    #[serde(rename_all = "camelCase")]
    PlayerRemoved { participant_id: ConnectionId },

    /// To the whole room: the host is gone and the room is closed.
    HostLeft,

    /// To a former host: another connection took over the room.
    #[serde(rename_all = "camelCase")]
    HostReplaced { host_id: ConnectionId },

    /// To the whole room: a chat line.
    NewMessage { message: String, sender: String },

    /// To the acting connection: the request was refused.
    ///
    /// `code` follows HTTP conventions (403 = role check failed,
    /// 409 = room already has a host).
    Error { code: u16, message: String },
}

impl ServerEvent {
    /// The wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::PlayerJoined { .. } => "playerJoined",
            Self::Shoot { .. } => "shoot",
            Self::NextPhase => "nextPhase",
            Self::PhaseConfirmed { .. } => "phaseConfirmed",
            Self::Removed => "removed",
            Self::PlayerRemoved { .. } => "playerRemoved",
            Self::HostLeft => "hostLeft",
            Self::HostReplaced { .. } => "hostReplaced",
            Self::NewMessage { .. } => "newMessage",
            Self::Error { .. } => "error",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Browser clients parse these frames by hand, so the tests pin the
    //! exact JSON shapes rather than just round-tripping.

    use serde_json::json;

    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    #[test]
    fn test_room_id_is_a_plain_string() {
        let json = serde_json::to_string(&RoomId::from("R1")).unwrap();
        assert_eq!(json, "\"R1\"");
        assert_eq!(RoomId::from("R1").to_string(), "R1");
    }

    #[test]
    fn test_join_room_parses_camel_case_fields() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "joinRoom",
            "data": { "roomId": "R1", "isHost": true }
        }))
        .unwrap();

        assert_eq!(
            event,
            ClientEvent::JoinRoom {
                room_id: "R1".into(),
                is_host: true,
                takeover: false,
            }
        );
        assert_eq!(event.name(), "joinRoom");
    }

    #[test]
    fn test_join_room_defaults_to_player() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "joinRoom",
            "data": { "roomId": "R1" }
        }))
        .unwrap();

        assert!(matches!(
            event,
            ClientEvent::JoinRoom { is_host: false, takeover: false, .. }
        ));
    }

    #[test]
    fn test_shoot_keeps_orientation_opaque() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "shoot",
            "data": {
                "roomId": "R1",
                "participantId": 4,
                "orientation": { "alpha": 10.5, "beta": -3, "gamma": 0 }
            }
        }))
        .unwrap();

        match event {
            ClientEvent::Shoot {
                participant_id,
                orientation,
                ..
            } => {
                assert_eq!(participant_id, Some(conn(4)));
                assert_eq!(orientation["alpha"], 10.5);
            }
            other => panic!("expected Shoot, got {other:?}"),
        }
    }

    #[test]
    fn test_shoot_without_optional_fields() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "shoot",
            "data": { "roomId": "R1" }
        }))
        .unwrap();

        assert_eq!(
            event,
            ClientEvent::Shoot {
                room_id: "R1".into(),
                participant_id: None,
                orientation: Value::Null,
            }
        );
    }

    #[test]
    fn test_send_message_defaults_to_empty_strings() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "sendMessage",
            "data": { "roomId": "lobby" }
        }))
        .unwrap();

        assert_eq!(
            event,
            ClientEvent::SendMessage {
                room_id: "lobby".into(),
                message: String::new(),
                sender: String::new(),
            }
        );
        assert_eq!(event.room_id().as_str(), "lobby");
    }

    #[test]
    fn test_remove_player_requires_participant() {
        let result: Result<ClientEvent, _> = serde_json::from_value(json!({
            "event": "removePlayer",
            "data": { "roomId": "R1" }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_room_id_is_rejected() {
        let result: Result<ClientEvent, _> = serde_json::from_value(json!({
            "event": "startNextPhase",
            "data": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let result: Result<ClientEvent, _> = serde_json::from_value(json!({
            "event": "flyToMoon",
            "data": { "roomId": "R1" }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unit_server_events_have_no_data() {
        let json = serde_json::to_value(ServerEvent::NextPhase).unwrap();
        assert_eq!(json, json!({ "event": "nextPhase" }));

        let json = serde_json::to_value(ServerEvent::HostLeft).unwrap();
        assert_eq!(json, json!({ "event": "hostLeft" }));

        let json = serde_json::to_value(ServerEvent::Removed).unwrap();
        assert_eq!(json, json!({ "event": "removed" }));
    }

    #[test]
    fn test_player_events_use_camel_case_ids() {
        let json = serde_json::to_value(ServerEvent::PlayerJoined { player_id: conn(9) }).unwrap();
        assert_eq!(json, json!({ "event": "playerJoined", "data": { "playerId": 9 } }));

        let json =
            serde_json::to_value(ServerEvent::PlayerRemoved { participant_id: conn(9) }).unwrap();
        assert_eq!(
            json,
            json!({ "event": "playerRemoved", "data": { "participantId": 9 } })
        );
    }

    #[test]
    fn test_shoot_server_event_shape() {
        let event = ServerEvent::Shoot {
            participant_id: conn(2),
            orientation: json!({ "alpha": 1 }),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            json!({
                "event": "shoot",
                "data": { "participantId": 2, "orientation": { "alpha": 1 } }
            })
        );
    }

    #[test]
    fn test_new_message_and_error_shapes() {
        let json = serde_json::to_value(ServerEvent::NewMessage {
            message: "gg".into(),
            sender: "ana".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            json!({ "event": "newMessage", "data": { "message": "gg", "sender": "ana" } })
        );

        let json = serde_json::to_value(ServerEvent::Error {
            code: 403,
            message: "only the host can do that".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["data"]["code"], 403);
    }

    #[test]
    fn test_unit_server_event_parses_without_data() {
        let event: ServerEvent = serde_json::from_str(r#"{"event":"hostLeft"}"#).unwrap();
        assert_eq!(event, ServerEvent::HostLeft);
        assert_eq!(event.name(), "hostLeft");
    }
}
