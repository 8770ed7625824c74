//! Room actor: an isolated Tokio task that owns one room's membership.
//!
//! Each room runs in its own task and is only reachable through its command
//! channel, so every mutation of a room is applied one at a time, in
//! arrival order. Outbound events go straight onto the members' queues; the
//! actor never waits on a socket.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use volley_protocol::{ConnectionId, RoomId, ServerEvent};

use crate::{HostClaim, RoomConfig, RoomError, RoomState};

/// Outbound queue of one connection. Sending to a closed queue is a no-op.
pub type ClientSender = mpsc::UnboundedSender<ServerEvent>;

/// Per-player record. The relay stores these but never changes them after
/// a join; game logic above the relay owns their meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Player {
    pub score: i64,
    pub confirmed: bool,
}

/// The role a connection asks for when joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAs {
    /// Claim the host seat. `takeover` replaces an existing host.
    Host { takeover: bool },
    /// Register as a player.
    Player,
}

impl JoinAs {
    /// Maps the `isHost` / `takeover` flags of a join request.
    pub fn from_flags(is_host: bool, takeover: bool) -> Self {
        if is_host {
            Self::Host { takeover }
        } else {
            Self::Player
        }
    }
}

/// What a connection's departure did to the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departure {
    /// The host left. Everyone in `members` got `hostLeft` and the room
    /// is closed.
    HostLeft { members: Vec<ConnectionId> },
    /// A registered player left; the host (if any) was told.
    PlayerLeft,
    /// The connection was in the room group without a role.
    MemberLeft,
    /// The connection was not in the room.
    NotMember,
}

/// Commands sent to a room actor through its channel.
///
/// Every request carries a `oneshot` reply channel so the caller learns
/// about refused requests.
pub(crate) enum RoomCommand {
    Join {
        conn_id: ConnectionId,
        sender: ClientSender,
        role: JoinAs,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Shoot {
        conn_id: ConnectionId,
        claimed: Option<ConnectionId>,
        orientation: Value,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    StartNextPhase {
        conn_id: ConnectionId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    PhaseConfirmed {
        conn_id: ConnectionId,
        claimed: Option<ConnectionId>,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    RemovePlayer {
        conn_id: ConnectionId,
        participant_id: ConnectionId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    SendMessage {
        conn_id: ConnectionId,
        message: String,
        sender: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Leave {
        conn_id: ConnectionId,
        reply: oneshot::Sender<Departure>,
    },
    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },
    Shutdown,
}

/// A snapshot of a room's membership.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub state: RoomState,
    pub host: Option<ConnectionId>,
    pub players: HashMap<ConnectionId, Player>,
    /// Everyone in the room group, sorted.
    pub members: Vec<ConnectionId>,
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's id.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Adds a connection to the room group with the given role.
    pub async fn join(
        &self,
        conn_id: ConnectionId,
        sender: ClientSender,
        role: JoinAs,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Join {
            conn_id,
            sender,
            role,
            reply,
        })
        .await?
    }

    /// Forwards a shot to the host.
    pub async fn shoot(
        &self,
        conn_id: ConnectionId,
        claimed: Option<ConnectionId>,
        orientation: Value,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Shoot {
            conn_id,
            claimed,
            orientation,
            reply,
        })
        .await?
    }

    /// Broadcasts `nextPhase` to the room.
    pub async fn start_next_phase(&self, conn_id: ConnectionId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::StartNextPhase { conn_id, reply })
            .await?
    }

    /// Forwards a phase confirmation to the host.
    pub async fn phase_confirmed(
        &self,
        conn_id: ConnectionId,
        claimed: Option<ConnectionId>,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::PhaseConfirmed {
            conn_id,
            claimed,
            reply,
        })
        .await?
    }

    /// Kicks a player out of the room.
    pub async fn remove_player(
        &self,
        conn_id: ConnectionId,
        participant_id: ConnectionId,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::RemovePlayer {
            conn_id,
            participant_id,
            reply,
        })
        .await?
    }

    /// Broadcasts a chat line to the room.
    pub async fn send_message(
        &self,
        conn_id: ConnectionId,
        message: String,
        sender: String,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::SendMessage {
            conn_id,
            message,
            sender,
            reply,
        })
        .await?
    }

    /// Removes a connection from the room. A departing host closes the room.
    pub async fn leave(&self, conn_id: ConnectionId) -> Result<Departure, RoomError> {
        self.request(|reply| RoomCommand::Leave { conn_id, reply })
            .await
    }

    /// Requests a snapshot of the room.
    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: RoomId,
    state: RoomState,
    config: RoomConfig,
    host: Option<ConnectionId>,
    players: HashMap<ConnectionId, Player>,
    /// The room group: every joined connection and its outbound queue.
    members: HashMap<ConnectionId, ClientSender>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop until shutdown or until the host leaves.
    async fn run(mut self) {
        tracing::debug!(room_id = %self.room_id, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join {
                    conn_id,
                    sender,
                    role,
                    reply,
                } => {
                    let _ = reply.send(self.handle_join(conn_id, sender, role));
                }
                RoomCommand::Shoot {
                    conn_id,
                    claimed,
                    orientation,
                    reply,
                } => {
                    let _ = reply.send(self.handle_shoot(conn_id, claimed, orientation));
                }
                RoomCommand::StartNextPhase { conn_id, reply } => {
                    let _ = reply.send(self.handle_next_phase(conn_id));
                }
                RoomCommand::PhaseConfirmed {
                    conn_id,
                    claimed,
                    reply,
                } => {
                    let _ = reply.send(self.handle_phase_confirmed(conn_id, claimed));
                }
                RoomCommand::RemovePlayer {
                    conn_id,
                    participant_id,
                    reply,
                } => {
                    let _ = reply.send(self.handle_remove_player(conn_id, participant_id));
                }
                RoomCommand::SendMessage {
                    conn_id,
                    message,
                    sender,
                    reply,
                } => {
                    let _ = reply.send(self.handle_send_message(conn_id, message, sender));
                }
                RoomCommand::Leave { conn_id, reply } => {
                    let departure = self.handle_leave(conn_id);
                    let closed = matches!(departure, Departure::HostLeft { .. });
                    let _ = reply.send(departure);
                    if closed {
                        break;
                    }
                }
                RoomCommand::GetInfo { reply } => {
                    let _ = reply.send(self.info());
                }
                RoomCommand::Shutdown => {
                    self.state = RoomState::Closed;
                    break;
                }
            }
        }

        tracing::debug!(room_id = %self.room_id, "room actor stopped");
    }

    fn handle_join(
        &mut self,
        conn_id: ConnectionId,
        sender: ClientSender,
        role: JoinAs,
    ) -> Result<(), RoomError> {
        match role {
            JoinAs::Host { takeover } => self.assign_host(conn_id, sender, takeover),
            JoinAs::Player => self.register_player(conn_id, sender),
        }
    }

    fn assign_host(
        &mut self,
        conn_id: ConnectionId,
        sender: ClientSender,
        takeover: bool,
    ) -> Result<(), RoomError> {
        match self.host {
            Some(current) if current == conn_id => {
                self.members.insert(conn_id, sender);
                return Ok(());
            }
            Some(current) => {
                if !takeover && self.config.host_claim == HostClaim::RequireTakeover {
                    return Err(RoomError::HostAlreadyAssigned {
                        room: self.room_id.clone(),
                        host: current,
                    });
                }
                tracing::info!(
                    room_id = %self.room_id,
                    previous = %current,
                    host = %conn_id,
                    "host replaced"
                );
                self.send_to(current, ServerEvent::HostReplaced { host_id: conn_id });
            }
            None => {}
        }

        if self.players.remove(&conn_id).is_some() {
            tracing::debug!(room_id = %self.room_id, %conn_id, "player promoted to host");
        }
        self.members.insert(conn_id, sender);
        self.host = Some(conn_id);
        self.state = RoomState::Hosted;
        tracing::info!(
            room_id = %self.room_id,
            host = %conn_id,
            players = self.players.len(),
            "host assigned"
        );

        // Players who joined before this host still have to be announced.
        let mut waiting: Vec<ConnectionId> = self.players.keys().copied().collect();
        waiting.sort();
        for player_id in waiting {
            self.send_to(conn_id, ServerEvent::PlayerJoined { player_id });
        }
        Ok(())
    }

    fn register_player(
        &mut self,
        conn_id: ConnectionId,
        sender: ClientSender,
    ) -> Result<(), RoomError> {
        if self.host == Some(conn_id) {
            return Err(RoomError::AlreadyHost {
                conn: conn_id,
                room: self.room_id.clone(),
            });
        }

        self.members.insert(conn_id, sender);
        let rejoined = self.players.insert(conn_id, Player::default()).is_some();
        tracing::info!(
            room_id = %self.room_id,
            %conn_id,
            rejoined,
            players = self.players.len(),
            "player joined"
        );

        if let Some(host) = self.host {
            self.send_to(host, ServerEvent::PlayerJoined { player_id: conn_id });
        }
        Ok(())
    }

    fn handle_shoot(
        &self,
        conn_id: ConnectionId,
        claimed: Option<ConnectionId>,
        orientation: Value,
    ) -> Result<(), RoomError> {
        let Some(host) = self.host else {
            tracing::debug!(room_id = %self.room_id, %conn_id, "no host, shot dropped");
            return Ok(());
        };
        self.require_player(conn_id, claimed)?;
        self.send_to(
            host,
            ServerEvent::Shoot {
                participant_id: conn_id,
                orientation,
            },
        );
        Ok(())
    }

    fn handle_next_phase(&self, conn_id: ConnectionId) -> Result<(), RoomError> {
        self.require_host(conn_id)?;
        tracing::debug!(room_id = %self.room_id, members = self.members.len(), "next phase");
        self.broadcast(ServerEvent::NextPhase);
        Ok(())
    }

    fn handle_phase_confirmed(
        &self,
        conn_id: ConnectionId,
        claimed: Option<ConnectionId>,
    ) -> Result<(), RoomError> {
        let Some(host) = self.host else {
            tracing::debug!(room_id = %self.room_id, %conn_id, "no host, confirmation dropped");
            return Ok(());
        };
        self.require_player(conn_id, claimed)?;
        self.send_to(
            host,
            ServerEvent::PhaseConfirmed {
                participant_id: conn_id,
            },
        );
        Ok(())
    }

    fn handle_remove_player(
        &mut self,
        conn_id: ConnectionId,
        participant_id: ConnectionId,
    ) -> Result<(), RoomError> {
        self.require_host(conn_id)?;
        if !self.players.contains_key(&participant_id) {
            tracing::debug!(
                room_id = %self.room_id,
                %participant_id,
                "remove of unknown player ignored"
            );
            return Ok(());
        }

        self.send_to(participant_id, ServerEvent::Removed);
        self.players.remove(&participant_id);
        self.send_to(conn_id, ServerEvent::PlayerRemoved { participant_id });
        tracing::info!(
            room_id = %self.room_id,
            %participant_id,
            players = self.players.len(),
            "player removed by host"
        );
        Ok(())
    }

    fn handle_send_message(
        &self,
        conn_id: ConnectionId,
        message: String,
        sender: String,
    ) -> Result<(), RoomError> {
        if !self.members.contains_key(&conn_id) {
            return Err(RoomError::NotMember {
                conn: conn_id,
                room: self.room_id.clone(),
            });
        }
        self.broadcast(ServerEvent::NewMessage { message, sender });
        Ok(())
    }

    fn handle_leave(&mut self, conn_id: ConnectionId) -> Departure {
        if self.host == Some(conn_id) {
            self.members.remove(&conn_id);
            self.host = None;
            self.state = RoomState::Closed;
            self.broadcast(ServerEvent::HostLeft);

            let mut members: Vec<ConnectionId> = self.members.keys().copied().collect();
            members.sort();
            tracing::info!(
                room_id = %self.room_id,
                host = %conn_id,
                remaining = members.len(),
                "host left, closing room"
            );
            return Departure::HostLeft { members };
        }

        let was_member = self.members.remove(&conn_id).is_some();
        if self.players.remove(&conn_id).is_some() {
            tracing::info!(
                room_id = %self.room_id,
                %conn_id,
                players = self.players.len(),
                "player left"
            );
            if let Some(host) = self.host {
                self.send_to(
                    host,
                    ServerEvent::PlayerRemoved {
                        participant_id: conn_id,
                    },
                );
            }
            return Departure::PlayerLeft;
        }

        if was_member {
            Departure::MemberLeft
        } else {
            Departure::NotMember
        }
    }

    fn require_host(&self, conn_id: ConnectionId) -> Result<(), RoomError> {
        if self.host == Some(conn_id) {
            Ok(())
        } else {
            Err(RoomError::NotHost {
                conn: conn_id,
                room: self.room_id.clone(),
            })
        }
    }

    fn require_player(
        &self,
        conn_id: ConnectionId,
        claimed: Option<ConnectionId>,
    ) -> Result<(), RoomError> {
        if let Some(claimed) = claimed {
            if claimed != conn_id {
                return Err(RoomError::Impersonation {
                    conn: conn_id,
                    claimed,
                });
            }
        }
        if !self.players.contains_key(&conn_id) {
            return Err(RoomError::NotPlayer {
                conn: conn_id,
                room: self.room_id.clone(),
            });
        }
        Ok(())
    }

    /// Sends an event to every member of the room group.
    fn broadcast(&self, event: ServerEvent) {
        for sender in self.members.values() {
            let _ = sender.send(event.clone());
        }
    }

    /// Sends an event to one member. Silently drops it if the member is
    /// gone or its queue is closed.
    fn send_to(&self, conn_id: ConnectionId, event: ServerEvent) {
        if let Some(sender) = self.members.get(&conn_id) {
            let _ = sender.send(event);
        }
    }

    fn info(&self) -> RoomInfo {
        let mut members: Vec<ConnectionId> = self.members.keys().copied().collect();
        members.sort();
        RoomInfo {
            room_id: self.room_id.clone(),
            state: self.state,
            host: self.host,
            players: self.players.clone(),
            members,
        }
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
pub(crate) fn spawn_room(room_id: RoomId, config: RoomConfig) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));

    let actor = RoomActor {
        room_id: room_id.clone(),
        state: RoomState::Headless,
        config,
        host: None,
        players: HashMap::new(),
        members: HashMap::new(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}
