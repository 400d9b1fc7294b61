mod handler;
mod handshake;
mod tcp;

use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;
use tokio::io;

pub use handler::{Handler, NopHandler, NOP_HANDLER};
pub use handshake::{Handshaker, NopHandshaker, NOP_HANDSHAKER};
pub use tcp::TcpPeer;

/// The client can initiate an 'Outbound' connection
/// The peer can initiate an 'Inbound' connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => f.write_str("inbound"),
            Direction::Outbound => f.write_str("outbound"),
        }
    }
}

/// Abstracts over one live, addressed connection to a remote node.
///
/// Reads and writes are independent directions: one task may sit in [`Peer::read`] while
/// another calls [`Peer::write`]. Calls in the same direction are serialized.
#[async_trait]
pub trait Peer: Send + Sync {
    fn remote_addr(&self) -> SocketAddr;

    fn direction(&self) -> Direction;

    fn is_outbound(&self) -> bool {
        self.direction() == Direction::Outbound
    }

    /// Read up to `buf.len()` bytes. `Ok(0)` means the remote closed its side.
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `buf` to the remote Peer.
    async fn write(&self, buf: &[u8]) -> io::Result<()>;

    /// Close all communication with the remote Peer. Pending and later reads and writes fail
    /// with [`io::ErrorKind::NotConnected`].
    async fn close(&self) -> io::Result<()>;
}
