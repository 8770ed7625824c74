//! Wire protocol for the Volley relay.
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`RoomId`]): the events
//!   that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how events become bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! The protocol layer sits between transport (raw frames) and rooms. It
//! doesn't know about connections or membership, only about shapes.
//!
//! ```text
//! Transport (frames) → Protocol (ClientEvent) → Room (routing)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{ClientEvent, RoomId, ServerEvent};
pub use volley_transport::ConnectionId;
