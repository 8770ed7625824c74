//! `VolleyServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → rooms.

use std::sync::Arc;

use tokio::sync::Mutex;
use volley_protocol::{Codec, JsonCodec};
use volley_room::{RoomConfig, RoomDirectory};
use volley_transport::{Handshake, OriginPolicy, Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{RelayConfig, VolleyError};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) directory: Mutex<RoomDirectory>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Volley relay.
///
/// # Example
///
/// ```rust,no_run
/// use volley::prelude::*;
///
/// # async fn start() -> Result<(), VolleyError> {
/// let server = VolleyServer::builder()
///     .bind("127.0.0.1:4000")
///     .allowed_origins(OriginPolicy::parse("https://party.example").unwrap())
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct VolleyServerBuilder {
    bind_addr: String,
    origins: OriginPolicy,
    room_config: RoomConfig,
}

impl VolleyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(&RelayConfig::default())
    }

    /// Starts from a loaded [`RelayConfig`].
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            bind_addr: config.bind_addr(),
            origins: config.allowed_origins.clone(),
            room_config: config.room_config(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets which browser origins may connect.
    pub fn allowed_origins(mut self, origins: OriginPolicy) -> Self {
        self.origins = origins;
        self
    }

    /// Sets the configuration every room is created with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Binds the listener. Uses `JsonCodec` over WebSockets.
    pub async fn build(self) -> Result<VolleyServer<JsonCodec>, VolleyError> {
        let transport = WebSocketTransport::bind_with_origins(&self.bind_addr, self.origins).await?;

        let state = Arc::new(ServerState {
            directory: Mutex::new(RoomDirectory::new(self.room_config)),
            codec: JsonCodec,
        });

        Ok(VolleyServer { transport, state })
    }
}

impl Default for VolleyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Volley relay.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct VolleyServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl VolleyServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> VolleyServerBuilder {
        VolleyServerBuilder::new()
    }
}

impl<C: Codec> VolleyServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop, spawning a task per connection. The
    /// WebSocket upgrade happens inside that task, so a peer that never
    /// finishes it only ties up its own task. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), VolleyError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Volley relay running");

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = incoming.peer_addr();
                        let conn = match incoming.complete().await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::debug!(%peer, error = %e, "handshake failed");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}
