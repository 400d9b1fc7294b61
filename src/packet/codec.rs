use super::Packet;
use crate::peer::Peer;
use crate::DEFAULT_BUFFER_SIZE;
use async_trait::async_trait;
use tokio::io;

/// Turns reads from a [`Peer`] into [`Packet`]s.
#[async_trait]
pub trait Decoder: Send + Sync {
    async fn decode(&self, peer: &dyn Peer) -> io::Result<Packet>;
}

/// Reads at most `buffer_size` bytes per call and returns them as one packet.
///
/// This is not message framing. A single write on the remote side can arrive as several
/// packets, and several writes can arrive as one.
#[derive(Debug, Clone, Copy)]
pub struct ChunkDecoder {
    buffer_size: usize,
}

impl ChunkDecoder {
    pub fn new(buffer_size: usize) -> Self {
        assert!(buffer_size > 0, "buffer size must not be zero");
        Self { buffer_size }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

#[async_trait]
impl Decoder for ChunkDecoder {
    async fn decode(&self, peer: &dyn Peer) -> io::Result<Packet> {
        let mut buffer = vec![0u8; self.buffer_size];
        let read = peer.read(&mut buffer).await?;

        if read == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of stream"));
        }

        Ok(Packet::new(peer.remote_addr(), &buffer[..read]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{Direction, TcpPeer};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_decode_splits_at_buffer_size() -> crate::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let mut client = tokio::net::TcpStream::connect(listener.local_addr()?).await?;
        let (stream, _) = listener.accept().await?;
        let peer = TcpPeer::new(stream, Direction::Inbound)?;

        client.write_all(b"abcdefgh").await?;
        client.shutdown().await?;

        let decoder = ChunkDecoder::new(3);
        let mut received = Vec::new();
        let err = loop {
            match decoder.decode(&peer).await {
                Ok(packet) => {
                    assert!(packet.payload.len() <= 3);
                    assert_eq!(packet.from, peer.remote_addr());
                    received.extend_from_slice(&packet.payload);
                }
                Err(err) => break err,
            }
        };

        assert_eq!(received, b"abcdefgh");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        Ok(())
    }
}
