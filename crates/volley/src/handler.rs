//! Per-connection handler: decode inbound events, route them, and drain
//! the connection's outbound queue.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Send `connected` with the connection's id
//!   2. Loop: frames from the socket go to the rooms; events queued by
//!      rooms go to the socket
//!   3. On exit, the guard leaves every room the connection was in

use std::sync::Arc;

use tokio::sync::mpsc;
use volley_protocol::{ClientEvent, Codec, ConnectionId, RoomId, ServerEvent};
use volley_room::{ClientSender, JoinAs, RoomError, RoomHandle};
use volley_transport::{Connection, WebSocketConnection};

use crate::server::ServerState;
use crate::VolleyError;

/// Drop guard that runs disconnect cleanup when the handler exits.
///
/// Runs even if the handler panics. `Drop` is synchronous, so the async
/// cleanup is spawned as a fire-and-forget task.
struct DisconnectGuard<C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for DisconnectGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let departures = state.directory.lock().await.disconnect(conn_id).await;
            tracing::info!(%conn_id, rooms = departures.len(), "connection closed");
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), VolleyError> {
    let conn_id = conn.id();
    tracing::info!(%conn_id, "connection accepted");

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let _guard = DisconnectGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    send_event(&conn, &state.codec, &ServerEvent::Connected { connection_id: conn_id }).await?;

    loop {
        tokio::select! {
            incoming = conn.recv() => match incoming {
                Ok(Some(data)) => dispatch(&*state, conn_id, &outbound_tx, &data).await,
                Ok(None) => {
                    tracing::debug!(%conn_id, "peer closed the connection");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break;
                }
            },
            Some(event) = outbound_rx.recv() => {
                send_event(&conn, &state.codec, &event).await?;
            }
        }
    }

    // Flushes the close reply (or sends our own close frame) before the
    // socket is dropped.
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }

    // _guard drops here → disconnect cleanup fires.
    Ok(())
}

/// Decodes one frame and applies it. Refusals are reported back to the
/// sender as an `error` event; anything undecodable is dropped.
async fn dispatch<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    outbound: &ClientSender,
    data: &[u8],
) {
    let event: ClientEvent = match state.codec.decode(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "dropping malformed frame");
            return;
        }
    };

    let name = event.name();
    let room_id = event.room_id().clone();

    match handle_event(state, conn_id, outbound, event).await {
        Ok(()) => {}
        Err(e) if e.is_missing_room() => {
            tracing::debug!(%conn_id, %room_id, event = name, "no such room, event dropped");
        }
        Err(e) => {
            tracing::warn!(%conn_id, %room_id, event = name, error = %e, "request refused");
            let _ = outbound.send(ServerEvent::Error {
                code: e.status_code(),
                message: e.to_string(),
            });
        }
    }
}

async fn handle_event<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    outbound: &ClientSender,
    event: ClientEvent,
) -> Result<(), RoomError> {
    match event {
        ClientEvent::JoinRoom {
            room_id,
            is_host,
            takeover,
        } => {
            let role = JoinAs::from_flags(is_host, takeover);
            state
                .directory
                .lock()
                .await
                .join(&room_id, conn_id, outbound.clone(), role)
                .await
        }
        ClientEvent::Shoot {
            room_id,
            participant_id,
            orientation,
        } => {
            lookup(state, &room_id)
                .await?
                .shoot(conn_id, participant_id, orientation)
                .await
        }
        ClientEvent::StartNextPhase { room_id } => {
            lookup(state, &room_id).await?.start_next_phase(conn_id).await
        }
        ClientEvent::PhaseConfirmed {
            room_id,
            participant_id,
        } => {
            lookup(state, &room_id)
                .await?
                .phase_confirmed(conn_id, participant_id)
                .await
        }
        ClientEvent::RemovePlayer {
            room_id,
            participant_id,
        } => {
            lookup(state, &room_id)
                .await?
                .remove_player(conn_id, participant_id)
                .await
        }
        ClientEvent::SendMessage {
            room_id,
            message,
            sender,
        } => {
            lookup(state, &room_id)
                .await?
                .send_message(conn_id, message, sender)
                .await
        }
        ClientEvent::LeaveRoom { room_id } => {
            let departure = state
                .directory
                .lock()
                .await
                .leave_room(&room_id, conn_id)
                .await?;
            tracing::debug!(%conn_id, %room_id, ?departure, "left room");
            Ok(())
        }
    }
}

/// Clones the room's handle so the directory lock is released before the
/// actor is contacted.
async fn lookup<C: Codec>(state: &ServerState<C>, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
    state
        .directory
        .lock()
        .await
        .get(room_id)
        .ok_or_else(|| RoomError::NotFound(room_id.clone()))
}

async fn send_event(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    event: &ServerEvent,
) -> Result<(), VolleyError> {
    let bytes = codec.encode(event)?;
    conn.send(&bytes).await?;
    Ok(())
}
