use super::Peer;
use async_trait::async_trait;
use std::sync::Arc;

/// Drives an admitted [`Peer`] for as long as it lives.
///
/// The transport unregisters and closes the peer once `handle` returns, so a handler should
/// return when the stream ends and must not close the peer itself.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, peer: Arc<dyn Peer>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NopHandler;

pub const NOP_HANDLER: NopHandler = NopHandler;

#[async_trait]
impl Handler for NopHandler {
    async fn handle(&self, _peer: Arc<dyn Peer>) {}
}
