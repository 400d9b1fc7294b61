use super::{Direction, Peer};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{self, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// [`Peer`] over a TCP connection.
///
/// The stream is split so the read loop and a writer never wait on each other. Closing
/// cancels any blocked read or write and shuts down the write side.
#[derive(Debug)]
pub struct TcpPeer {
    remote_addr: SocketAddr,
    direction: Direction,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    shut: AtomicBool,
    closed: CancellationToken,
}

impl TcpPeer {
    pub fn new(stream: TcpStream, direction: Direction) -> io::Result<Self> {
        let remote_addr = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();

        Ok(Self {
            remote_addr,
            direction,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            shut: AtomicBool::new(false),
            closed: CancellationToken::new(),
        })
    }

    /// Open an outbound connection.
    pub async fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Self::new(stream, Direction::Outbound)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "peer closed")
}

#[async_trait]
impl Peer for TcpPeer {
    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut reader = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(closed_error()),
            reader = self.reader.lock() => reader,
        };

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(closed_error()),
            read = reader.read(buf) => read,
        }
    }

    async fn write(&self, buf: &[u8]) -> io::Result<()> {
        let mut writer = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(closed_error()),
            writer = self.writer.lock() => writer,
        };

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(closed_error()),
            written = async {
                writer.write_all(buf).await?;
                writer.flush().await
            } => written,
        }
    }

    async fn close(&self) -> io::Result<()> {
        if self.shut.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.closed.cancel();

        let mut writer = self.writer.lock().await;
        match writer.shutdown().await {
            Err(err) if err.kind() != io::ErrorKind::NotConnected => Err(err),
            _ => Ok(()),
        }
    }
}
