//! Datagram transports.
//!
//! The protocol only needs two fallible primitives: send one encoded message
//! to an address, and wait for the next message plus the address it came
//! from. [`Transport`] captures exactly that. There is no acknowledgement,
//! retry, ordering or deduplication at this layer.
//!
//! - [`UdpTransport`] - a bound [`tokio::net::UdpSocket`].
//! - [`MemoryNetwork`] (feature `test-util`) - an in-process network for
//!   tests.
//!
//! Datagrams that fail to decode are logged and surfaced as
//! [`Message::ProtocolError`]; a receiver never sees a decode error as a
//! transport failure.

#[cfg(any(test, feature = "test-util"))]
mod memory;
mod udp;

#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryNetwork, MemoryTransport};
pub use udp::UdpTransport;

use crate::{Message, Result};
use core::future::Future;
use std::net::SocketAddr;

/// A fallible, unreliable datagram endpoint.
pub trait Transport: Send + Sync + 'static {
    /// The address this endpoint receives on.
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Sends `message` as a single datagram to `dest`.
    ///
    /// Completion means the datagram left this endpoint, not that it
    /// arrived.
    fn send_to(
        &self,
        message: &Message,
        dest: SocketAddr,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Waits for the next datagram.
    fn recv_from(&self) -> impl Future<Output = Result<(Message, SocketAddr)>> + Send;
}

/// Decodes `datagram`, downgrading anything undecodable to
/// [`Message::ProtocolError`].
pub(crate) fn decode_or_protocol_error(datagram: &[u8], _from: SocketAddr) -> Message {
    match Message::decode(datagram) {
        Ok(message) => message,
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Discarding undecodable datagram from {_from}: {_e}");
            Message::ProtocolError
        }
    }
}
