//! UDP endpoint for one side of a transfer.
//!
//! Outbound traffic is typed ([`Frame`] from the sender, [`Ack`] from the
//! receiver).  Inbound datagrams are handed back undecoded together with the
//! source address, because the transfer loops must apply loss simulation and
//! peer filtering before they look at the bytes.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::packet::{Ack, Frame};

/// Largest datagram accepted; a frame is `HEADER_LEN + chunk_size` bytes.
const RECV_BUFFER: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("UDP I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
pub struct Socket {
    /// Bound address, with the OS-assigned port when bound to port 0.
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    pub async fn bind(addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(addr).await?;
        Ok(Self {
            local_addr: inner.local_addr()?,
            inner,
        })
    }

    pub async fn send_frame(&self, frame: &Frame, peer: SocketAddr) -> Result<(), SocketError> {
        self.send_raw(&frame.encode(), peer).await
    }

    pub async fn send_ack(&self, ack: Ack, peer: SocketAddr) -> Result<(), SocketError> {
        self.send_raw(&ack.encode(), peer).await
    }

    /// Next datagram from anyone, as `(bytes, source)`.
    pub async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), SocketError> {
        let mut buf = vec![0u8; RECV_BUFFER];
        let (len, from) = self.inner.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok((buf, from))
    }

    async fn send_raw(&self, bytes: &[u8], peer: SocketAddr) -> Result<(), SocketError> {
        let sent = self.inner.send_to(bytes, peer).await?;
        if sent < bytes.len() {
            log::warn!("short UDP send to {peer}: {sent} of {} bytes", bytes.len());
        }
        Ok(())
    }
}
