use super::{PacketEvent, PacketSink};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};
use tokio::io;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Receiving end of a [`PacketReader`].
pub type PacketReceiver = mpsc::Receiver<PacketEvent>;

/// Fans the events of every Peer read loop into one ordered channel.
///
/// Pushes are serialized, so the consumer sees whole events one at a time. A full channel
/// blocks the reporting read loop until the consumer catches up.
///
/// A Peer that goes away shows up as a [`PacketEvent::Closed`] event. Only [`PacketReader::close`]
/// ends the channel itself.
#[derive(Debug)]
pub struct PacketReader {
    sender: tokio::sync::Mutex<Option<mpsc::Sender<PacketEvent>>>,
    last_closed: Mutex<Option<(SocketAddr, io::ErrorKind)>>,
    closed: CancellationToken,
}

impl PacketReader {
    /// Create a reader whose channel buffers up to `capacity` events.
    pub fn new(capacity: usize) -> (Self, PacketReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);

        let reader = Self {
            sender: tokio::sync::Mutex::new(Some(sender)),
            last_closed: Mutex::new(None),
            closed: CancellationToken::new(),
        };

        (reader, receiver)
    }

    /// Stop delivering events. The receiver drains what is buffered and then ends.
    pub async fn close(&self) {
        self.closed.cancel();
        self.sender.lock().await.take();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// The most recent Peer that stopped, with the reason its stream ended.
    pub fn last_closed(&self) -> Option<(SocketAddr, io::ErrorKind)> {
        *self.last_closed_lock()
    }

    fn last_closed_lock(&self) -> MutexGuard<'_, Option<(SocketAddr, io::ErrorKind)>> {
        match self.last_closed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl PacketSink for PacketReader {
    async fn report(&self, event: PacketEvent) {
        if let PacketEvent::Closed { from, cause } = &event {
            *self.last_closed_lock() = Some((*from, cause.kind()));
        }

        let guard = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return,
            guard = self.sender.lock() => guard,
        };
        let Some(sender) = guard.as_ref() else {
            return;
        };

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => log::debug!("Reader closed, dropping event"),
            sent = sender.send(event) => {
                if sent.is_err() {
                    log::debug!("Packet receiver is gone, dropping event");
                }
            }
        }
    }
}
