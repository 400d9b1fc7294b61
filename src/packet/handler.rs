use super::{is_terminal, ChunkDecoder, Decoder, PacketEvent};
use crate::peer::{Handler, Peer};
use async_trait::async_trait;
use std::sync::Arc;

/// Receives the events of every Peer read loop.
///
/// Called concurrently from one loop per Peer. Events of one Peer arrive in read order.
#[async_trait]
pub trait PacketSink: Send + Sync {
    async fn report(&self, event: PacketEvent);
}

/// [`Handler`] that decodes a Peer stream into packets until the stream ends.
///
/// Every decoded packet and every recoverable error is reported to the sink. A terminal
/// error stops the loop after one final [`PacketEvent::Closed`].
pub struct PacketHandler {
    decoder: Arc<dyn Decoder>,
    sink: Arc<dyn PacketSink>,
}

impl PacketHandler {
    pub fn new(sink: Arc<dyn PacketSink>) -> Self {
        Self::with_decoder(ChunkDecoder::default(), sink)
    }

    pub fn with_decoder(decoder: impl Decoder + 'static, sink: Arc<dyn PacketSink>) -> Self {
        Self {
            decoder: Arc::new(decoder),
            sink,
        }
    }
}

#[async_trait]
impl Handler for PacketHandler {
    async fn handle(&self, peer: Arc<dyn Peer>) {
        let from = peer.remote_addr();

        loop {
            match self.decoder.decode(peer.as_ref()).await {
                Ok(packet) => {
                    log::trace!("Read {} bytes from {}", packet.payload.len(), from);
                    self.sink.report(PacketEvent::Packet(packet)).await;
                }
                Err(cause) if is_terminal(&cause) => {
                    log::debug!("Stopped reading from {}: {}", from, cause);
                    self.sink.report(PacketEvent::Closed { from, cause }).await;
                    return;
                }
                Err(error) => {
                    log::warn!("Read from {} failed: {}", from, error);
                    self.sink.report(PacketEvent::Error { from, error }).await;
                }
            }
        }
    }
}
