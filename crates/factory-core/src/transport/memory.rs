use super::{Transport, decode_or_protocol_error};
use crate::pool::{Mutex, lock};
use crate::{Error, Message, Result};
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, mpsc};

type Datagram = (Bytes, SocketAddr);

#[derive(Default)]
struct Registry {
    endpoints: HashMap<SocketAddr, mpsc::UnboundedSender<Datagram>>,
    broken: HashSet<SocketAddr>,
}

/// An in-process datagram network.
///
/// Endpoints are created with [`bind`](Self::bind). Datagrams addressed to an
/// unbound address are dropped silently, as UDP would. Each sender's
/// datagrams arrive in the order they were sent, but datagrams from
/// different senders interleave freely.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    registry: Arc<Mutex<Registry>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a new endpoint at `addr`, replacing any previous endpoint there.
    pub fn bind(&self, addr: SocketAddr) -> Result<MemoryTransport> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.registry)?.endpoints.insert(addr, tx);
        Ok(MemoryTransport {
            addr,
            network: self.clone(),
            inbox: AsyncMutex::new(rx),
        })
    }

    /// Delivers raw bytes to `to` as if `from` had sent them. Returns `false`
    /// if nothing is bound at `to`.
    pub fn inject(&self, from: SocketAddr, to: SocketAddr, datagram: impl Into<Bytes>) -> bool {
        self.deliver(from, to, datagram.into()).unwrap_or(false)
    }

    /// Makes every subsequent send from `addr` fail with a transport error.
    pub fn break_link(&self, addr: SocketAddr) -> Result<()> {
        lock(&self.registry)?.broken.insert(addr);
        Ok(())
    }

    fn deliver(&self, from: SocketAddr, to: SocketAddr, datagram: Bytes) -> Result<bool> {
        let registry = lock(&self.registry)?;
        if registry.broken.contains(&from) {
            return Err(Error::transport(
                format!("Error sending from {from} to {to}"),
                &std::io::Error::from(std::io::ErrorKind::BrokenPipe),
            ));
        }
        Ok(registry
            .endpoints
            .get(&to)
            .is_some_and(|tx| tx.send((datagram, from)).is_ok()))
    }
}

/// One endpoint of a [`MemoryNetwork`].
pub struct MemoryTransport {
    addr: SocketAddr,
    network: MemoryNetwork,
    inbox: AsyncMutex<mpsc::UnboundedReceiver<Datagram>>,
}

impl Transport for MemoryTransport {
    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.addr)
    }

    async fn send_to(&self, message: &Message, dest: SocketAddr) -> Result<()> {
        let frame = Bytes::copy_from_slice(&message.encode());
        // Undeliverable datagrams are lost, not errors.
        self.network.deliver(self.addr, dest, frame)?;
        Ok(())
    }

    async fn recv_from(&self) -> Result<(Message, SocketAddr)> {
        let mut inbox = self.inbox.lock().await;
        match inbox.recv().await {
            Some((datagram, from)) => Ok((decode_or_protocol_error(&datagram, from), from)),
            None => Err(Error::transport(
                format!("Endpoint {} was unbound", self.addr),
                &std::io::Error::from(std::io::ErrorKind::NotConnected),
            )),
        }
    }
}
