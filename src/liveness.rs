//! The PING/PONG liveness exchange.
//!
//! The same tokens serve as the connection handshake and as an in-session keepalive.
//! Matching is by containment, since a packet is a raw chunk of the stream and may carry
//! more than one token or a token surrounded by other bytes.

use crate::peer::{Handshaker, Peer};
use crate::{Error, Result, DEFAULT_BUFFER_SIZE};
use async_trait::async_trait;
use tokio::io;

pub const PING: &[u8] = b"PING";
pub const PONG: &[u8] = b"PONG";

/// What the initiator writes.
pub const PING_MESSAGE: &[u8] = b"PING\r\n";
/// What the responder writes back.
pub const PONG_MESSAGE: &[u8] = b"PONG\r\n";

pub fn detect_ping(payload: &[u8]) -> bool {
    contains(payload, PING)
}

pub fn detect_pong(payload: &[u8]) -> bool {
    contains(payload, PONG)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Liveness handshake.
///
/// On an outbound Peer it sends [`PING_MESSAGE`] and requires a reply containing `PONG`. On
/// an inbound Peer it requires a message containing `PING` and answers with
/// [`PONG_MESSAGE`]. Each side does a single bounded read.
#[derive(Debug, Clone, Copy)]
pub struct PingPongHandshaker {
    buffer_size: usize,
}

impl PingPongHandshaker {
    pub fn new(buffer_size: usize) -> Self {
        assert!(buffer_size >= PING_MESSAGE.len());
        Self { buffer_size }
    }

    async fn read_token(&self, peer: &dyn Peer) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.buffer_size];
        let read = peer.read(&mut buf).await?;
        if read == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed during handshake",
            )));
        }

        buf.truncate(read);
        Ok(buf)
    }

    async fn initiate(&self, peer: &dyn Peer) -> Result<()> {
        peer.write(PING_MESSAGE).await?;

        let reply = self.read_token(peer).await?;
        if !detect_pong(&reply) {
            return Err(Error::InvalidHandshake(peer.remote_addr()));
        }
        Ok(())
    }

    async fn respond(&self, peer: &dyn Peer) -> Result<()> {
        let request = self.read_token(peer).await?;
        if !detect_ping(&request) {
            return Err(Error::InvalidHandshake(peer.remote_addr()));
        }

        peer.write(PONG_MESSAGE).await?;
        Ok(())
    }
}

impl Default for PingPongHandshaker {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

#[async_trait]
impl Handshaker for PingPongHandshaker {
    async fn handshake(&self, peer: &dyn Peer) -> Result<()> {
        let result = if peer.is_outbound() {
            self.initiate(peer).await
        } else {
            self.respond(peer).await
        };

        match &result {
            Ok(()) => log::debug!("Handshake with {} succeeded", peer.remote_addr()),
            Err(err) => log::debug!("Handshake with {} failed: {}", peer.remote_addr(), err),
        }
        result
    }
}
