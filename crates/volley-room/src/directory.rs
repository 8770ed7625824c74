//! Room directory: creates, tracks, and tears down rooms.

use std::collections::{HashMap, HashSet};

use volley_protocol::{ConnectionId, RoomId};

use crate::room::spawn_room;
use crate::{ClientSender, Departure, JoinAs, RoomConfig, RoomError, RoomHandle};

/// Process-wide mapping from room id to running room.
///
/// Also indexes which rooms each connection joined, so a disconnect only
/// visits that connection's rooms instead of scanning them all.
///
/// Not thread-safe by itself; the server keeps it behind a mutex.
pub struct RoomDirectory {
    /// Active rooms, keyed by room id.
    rooms: HashMap<RoomId, RoomHandle>,

    /// Rooms each connection is a member of.
    memberships: HashMap<ConnectionId, HashSet<RoomId>>,

    config: RoomConfig,
}

impl RoomDirectory {
    /// Creates an empty directory. Every room it creates uses `config`.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            memberships: HashMap::new(),
            config,
        }
    }

    /// Returns the room with this id, creating an empty headless one if
    /// it doesn't exist yet.
    pub fn get_or_create(&mut self, room_id: &RoomId) -> RoomHandle {
        if let Some(handle) = self.rooms.get(room_id) {
            return handle.clone();
        }
        let handle = spawn_room(room_id.clone(), self.config.clone());
        self.rooms.insert(room_id.clone(), handle.clone());
        tracing::info!(%room_id, rooms = self.rooms.len(), "room created");
        handle
    }

    /// Looks up a room. `None` means there is nothing to route to.
    pub fn get(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms.get(room_id).cloned()
    }

    /// Removes a room and stops its actor. Deleting a missing room is a
    /// no-op.
    pub async fn delete(&mut self, room_id: &RoomId) {
        self.memberships.retain(|_, rooms| {
            rooms.remove(room_id);
            !rooms.is_empty()
        });
        self.close(room_id).await;
    }

    /// Joins a connection to a room, creating the room on first use.
    ///
    /// A refused join (host conflict) leaves neither the room nor the
    /// index changed. A room whose actor already stopped is replaced by a
    /// fresh one.
    pub async fn join(
        &mut self,
        room_id: &RoomId,
        conn_id: ConnectionId,
        sender: ClientSender,
        role: JoinAs,
    ) -> Result<(), RoomError> {
        let handle = self.get_or_create(room_id);
        match handle.join(conn_id, sender.clone(), role).await {
            Err(RoomError::Unavailable(_)) => {
                // The actor is gone without telling us; start the room over.
                tracing::warn!(%room_id, "replacing stale room");
                self.rooms.remove(room_id);
                self.get_or_create(room_id)
                    .join(conn_id, sender, role)
                    .await?;
            }
            result => result?,
        }
        self.memberships
            .entry(conn_id)
            .or_default()
            .insert(room_id.clone());
        Ok(())
    }

    /// Takes a connection out of one room, as if it had disconnected from
    /// that room only. A departing host closes the room.
    pub async fn leave_room(
        &mut self,
        room_id: &RoomId,
        conn_id: ConnectionId,
    ) -> Result<Departure, RoomError> {
        self.forget(conn_id, room_id);
        self.depart(room_id, conn_id).await
    }

    /// Cleans up after a closed connection: it leaves every room it was
    /// in. Rooms it hosted are closed. Repeated calls are no-ops.
    pub async fn disconnect(&mut self, conn_id: ConnectionId) -> Vec<(RoomId, Departure)> {
        let Some(rooms) = self.memberships.remove(&conn_id) else {
            return Vec::new();
        };

        let mut departures = Vec::with_capacity(rooms.len());
        for room_id in rooms {
            match self.depart(&room_id, conn_id).await {
                Ok(departure) => departures.push((room_id, departure)),
                Err(e) => {
                    tracing::debug!(%conn_id, %room_id, error = %e, "room already gone");
                }
            }
        }
        departures
    }

    /// Room ids a connection is currently a member of, sorted.
    pub fn rooms_of(&self, conn_id: ConnectionId) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self
            .memberships
            .get(&conn_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    /// Returns the number of active rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Lists all active room ids, sorted.
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn depart(
        &mut self,
        room_id: &RoomId,
        conn_id: ConnectionId,
    ) -> Result<Departure, RoomError> {
        let handle = self
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;

        match handle.leave(conn_id).await {
            Ok(Departure::HostLeft { members }) => {
                for member in &members {
                    self.forget(*member, room_id);
                }
                self.close(room_id).await;
                Ok(Departure::HostLeft { members })
            }
            Err(RoomError::Unavailable(_)) => {
                // The actor is gone without telling us; drop the stale handle.
                self.rooms.remove(room_id);
                Err(RoomError::Unavailable(room_id.clone()))
            }
            other => other,
        }
    }

    fn forget(&mut self, conn_id: ConnectionId, room_id: &RoomId) {
        if let Some(rooms) = self.memberships.get_mut(&conn_id) {
            rooms.remove(room_id);
            if rooms.is_empty() {
                self.memberships.remove(&conn_id);
            }
        }
    }

    async fn close(&mut self, room_id: &RoomId) {
        if let Some(handle) = self.rooms.remove(room_id) {
            // The actor stops on its own when the host leaves; this only
            // matters for explicit deletes.
            let _ = handle.shutdown().await;
            tracing::info!(%room_id, rooms = self.rooms.len(), "room closed");
        }
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
