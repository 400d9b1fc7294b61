mod codec;
mod handler;
mod reader;

use bytes::Bytes;
use std::fmt::Display;
use std::net::SocketAddr;
use tokio::io;

pub use codec::{ChunkDecoder, Decoder};
pub use handler::{PacketHandler, PacketSink};
pub use reader::{PacketReader, PacketReceiver};

/// One decoded chunk of payload attributed to the Peer it was read from.
///
/// The payload is always an owned copy, never a view into a read buffer that gets reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub from: SocketAddr,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(from: SocketAddr, payload: &[u8]) -> Self {
        Self {
            from,
            payload: Bytes::copy_from_slice(payload),
        }
    }
}

/// Everything a Peer read loop reports upstream.
#[derive(Debug)]
pub enum PacketEvent {
    Packet(Packet),
    /// A read failed but the stream is still usable.
    Error { from: SocketAddr, error: io::Error },
    /// The stream ended. This is the last event for `from`.
    Closed { from: SocketAddr, cause: io::Error },
}

impl PacketEvent {
    pub fn from(&self) -> SocketAddr {
        match self {
            PacketEvent::Packet(packet) => packet.from,
            PacketEvent::Error { from, .. } | PacketEvent::Closed { from, .. } => *from,
        }
    }
}

impl Display for PacketEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketEvent::Packet(packet) => f.write_fmt(format_args!(
                "Packet from : {}, Length : {}",
                packet.from,
                packet.payload.len()
            )),
            PacketEvent::Error { from, error } => {
                f.write_fmt(format_args!("Error from : {}, {}", from, error))
            }
            PacketEvent::Closed { from, cause } => {
                f.write_fmt(format_args!("Closed : {}, {}", from, cause))
            }
        }
    }
}

/// Errors after which nothing more can be read from a stream: end of stream, a broken or
/// reset connection, or a Peer that was closed locally.
pub fn is_terminal(err: &io::Error) -> bool {
    use io::ErrorKind::*;
    matches!(
        err.kind(),
        UnexpectedEof | BrokenPipe | NotConnected | ConnectionReset | ConnectionAborted
    )
}
