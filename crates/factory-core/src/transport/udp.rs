use super::{Transport, decode_or_protocol_error};
use crate::{Error, MESSAGE_SIZE, Message, Result};
use std::net::SocketAddr;
use tokio::net::{ToSocketAddrs, UdpSocket};

/// [`Transport`] over a bound UDP socket.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Binds a socket to `addr`. Use port `0` for an ephemeral port.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| Error::transport("Couldn't bind the UDP socket", &e))?;
        Ok(Self { socket })
    }

    pub const fn from_socket(socket: UdpSocket) -> Self {
        Self { socket }
    }
}

impl Transport for UdpTransport {
    fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| Error::transport("Couldn't read the local address", &e))
    }

    async fn send_to(&self, message: &Message, dest: SocketAddr) -> Result<()> {
        let frame = message.encode();
        self.socket.send_to(&frame, dest).await.map_err(|e| {
            Error::transport(format!("Error sending {} to {dest}", message.purpose()), &e)
        })?;
        Ok(())
    }

    async fn recv_from(&self) -> Result<(Message, SocketAddr)> {
        // One spare byte so an oversized datagram shows up as a length
        // mismatch instead of being silently truncated to a valid record.
        let mut buf = [0_u8; MESSAGE_SIZE + 1];
        let (len, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| Error::transport("Error receiving a datagram", &e))?;
        Ok((decode_or_protocol_error(&buf[..len], from), from))
    }
}
