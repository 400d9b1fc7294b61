use crate::liveness::{self, PingPongHandshaker, PONG_MESSAGE};
use crate::packet::{ChunkDecoder, PacketHandler, PacketReader};
use crate::transport::Transport;
use crate::{Error, Packet, PacketEvent, Result, DEFAULT_BUFFER_SIZE};
use blobnet_store::Storage;
use futures::future::join_all;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct FileServerOptions {
    /// Nodes dialed by [`FileServer::start`].
    pub nodes: Vec<String>,
    /// Maximum payload of one packet and of one handshake read.
    pub buffer_size: usize,
    /// Events buffered between the Peer read loops and [`FileServer::process`].
    pub channel_capacity: usize,
}

impl Default for FileServerOptions {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            channel_capacity: 64,
        }
    }
}

/// A node: a [`Transport`] to other nodes plus the local [`Storage`].
///
/// [`FileServer::start`] connects and accepts, [`FileServer::process`] consumes what the
/// Peers send. The two run as separate tasks.
pub struct FileServer {
    options: FileServerOptions,
    transport: Arc<dyn Transport>,
    store: Arc<dyn Storage>,
    reader: Arc<PacketReader>,
    events: tokio::sync::Mutex<mpsc::Receiver<PacketEvent>>,
}

impl FileServer {
    /// Wire the liveness handshake and the packet pipeline into `transport`.
    pub fn new(
        store: Arc<dyn Storage>,
        transport: Arc<dyn Transport>,
        options: FileServerOptions,
    ) -> Self {
        let (reader, events) = PacketReader::new(options.channel_capacity);
        let reader = Arc::new(reader);

        transport.set_handshaker(Arc::new(PingPongHandshaker::new(options.buffer_size)));
        transport.set_handler(Arc::new(PacketHandler::with_decoder(
            ChunkDecoder::new(options.buffer_size),
            reader.clone(),
        )));

        Self {
            options,
            transport,
            store,
            reader,
            events: tokio::sync::Mutex::new(events),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.transport.addr()
    }

    pub fn store(&self) -> &Arc<dyn Storage> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn reader(&self) -> &PacketReader {
        &self.reader
    }

    /// Dial the bootstrap nodes, then accept connections until the server is closed.
    ///
    /// A failed dial does not stop the others or the accept loop. Dial failures are returned
    /// together with the accept loop's result once it exits.
    pub async fn start(&self) -> Result<()> {
        let mut errors = Vec::new();

        if let Err(err) = self.bootstrap().await {
            errors.push(err);
        }
        if let Err(err) = self.transport.listen_and_accept().await {
            errors.push(err);
        }

        Error::join(errors)
    }

    /// Dial every configured node concurrently.
    pub async fn bootstrap(&self) -> Result<()> {
        let dials = self
            .options
            .nodes
            .iter()
            .map(|node| async move { (node, self.transport.dial(node).await) });

        let mut errors = Vec::new();
        for (node, result) in join_all(dials).await {
            match result {
                Ok(()) => log::info!("Connected to node {}", node),
                Err(err) => {
                    log::warn!("Failed to connect to node {}: {}", node, err);
                    errors.push(err);
                }
            }
        }

        Error::join(errors)
    }

    /// Consume Peer events until the server is closed.
    pub async fn process(&self) {
        let mut events = self.events.lock().await;

        while let Some(event) = events.recv().await {
            match event {
                PacketEvent::Packet(packet) => self.handle_packet(packet).await,
                PacketEvent::Error { from, error } => {
                    log::warn!("Read error from {}: {}", from, error)
                }
                PacketEvent::Closed { from, cause } => log::info!("Peer {} closed: {}", from, cause),
            }
        }

        log::debug!("Packet channel closed");
    }

    async fn handle_packet(&self, packet: Packet) {
        if liveness::detect_ping(&packet.payload) {
            log::debug!("Received PING from {}", packet.from);
            match self.reply(packet.from, PONG_MESSAGE).await {
                Ok(()) => log::info!("Answered PING from {}", packet.from),
                Err(err) => log::warn!("Failed to answer PING from {}: {}", packet.from, err),
            }
            return;
        }

        log::info!(
            "Read packet from {}: {}",
            packet.from,
            String::from_utf8_lossy(&packet.payload)
        );
    }

    /// Write `payload` to the registered Peer at `addr`.
    pub async fn reply(&self, addr: SocketAddr, payload: &[u8]) -> Result<()> {
        let peer = self
            .transport
            .acquire_peer(addr)
            .ok_or(Error::UnknownPeer(addr))?;

        let written = peer.write(payload).await;
        self.transport.release_peer(peer);
        Ok(written?)
    }

    /// Close the transport, the packet channel and the storage. Every part is closed even
    /// when an earlier one fails.
    pub async fn close(&self) -> Result<()> {
        let mut errors = Vec::new();

        if let Err(err) = self.transport.close().await {
            errors.push(err);
        }
        self.reader.close().await;
        if let Err(err) = self.store.close().await {
            errors.push(err.into());
        }

        Error::join(errors)
    }
}
