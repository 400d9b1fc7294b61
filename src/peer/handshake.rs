use super::Peer;
use crate::Result;
use async_trait::async_trait;

/// Runs once on every new connection, inbound or outbound, before the connection is
/// registered as a usable [`Peer`].
///
/// The handshake talks directly on the peer stream. An error discards the connection.
#[async_trait]
pub trait Handshaker: Send + Sync {
    async fn handshake(&self, peer: &dyn Peer) -> Result<()>;
}

/// Accepts every connection without exchanging anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopHandshaker;

pub const NOP_HANDSHAKER: NopHandshaker = NopHandshaker;

#[async_trait]
impl Handshaker for NopHandshaker {
    async fn handshake(&self, _peer: &dyn Peer) -> Result<()> {
        Ok(())
    }
}
