//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::header::{
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN,
};
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::origin::ALLOWED_METHODS;
use crate::{Connection, ConnectionId, Handshake, OriginPolicy, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// How long an accepted socket may take to send its upgrade request.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    origins: OriginPolicy,
    handshake_timeout: Duration,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport that accepts any origin.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_origins(addr, OriginPolicy::Any).await
    }

    /// Binds a new WebSocket transport with the given origin policy.
    pub async fn bind_with_origins(
        addr: &str,
        origins: OriginPolicy,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            TransportError::BindFailed {
                addr: addr.to_string(),
                source,
            }
        })?;
        tracing::info!(addr, %origins, "WebSocket transport listening");
        Ok(Self {
            listener,
            origins,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        })
    }

    /// Sets how long a peer may take to complete the upgrade.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Incoming = IncomingWebSocket;
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        Ok(IncomingWebSocket {
            stream,
            addr,
            origins: self.origins.clone(),
            timeout: self.handshake_timeout,
        })
    }
}

/// An accepted TCP socket that hasn't upgraded to WebSocket yet.
pub struct IncomingWebSocket {
    stream: TcpStream,
    addr: SocketAddr,
    origins: OriginPolicy,
    timeout: Duration,
}

impl IncomingWebSocket {
    /// The peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Handshake for IncomingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Runs the upgrade, checking the `Origin` header against the policy.
    /// Fails if the peer doesn't finish within the handshake timeout.
    async fn complete(self) -> Result<Self::Connection, Self::Error> {
        let Self {
            stream,
            addr,
            origins: policy,
            timeout,
        } = self;

        let check_origin =
            move |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
                let origin = req.headers().get(ORIGIN).and_then(|v| v.to_str().ok());
                if !policy.allows(origin) {
                    tracing::warn!(?origin, %addr, "rejected upgrade from disallowed origin");
                    let mut denied = ErrorResponse::new(Some("origin not allowed".into()));
                    *denied.status_mut() = StatusCode::FORBIDDEN;
                    return Err(denied);
                }
                let headers = resp.headers_mut();
                if let Ok(value) = HeaderValue::from_str(&policy.allow_origin_header(origin)) {
                    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
                }
                headers.insert(
                    ACCESS_CONTROL_ALLOW_METHODS,
                    HeaderValue::from_static(ALLOWED_METHODS),
                );
                Ok(resp)
            };

        let ws = tokio::time::timeout(
            timeout,
            tokio_tungstenite::accept_hdr_async(stream, check_origin),
        )
        .await
        .map_err(|_| TransportError::HandshakeTimedOut(addr))?
        .map_err(|e| {
            TransportError::HandshakeFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// A single WebSocket connection.
///
/// The socket is split so a pending `recv` never holds up an outgoing
/// `send` on the same connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
