use super::registry::PeerRegistry;
use super::{log_errors, ErrorHandler, Listener, Transport};
use crate::config;
use crate::peer::{Direction, Handler, Handshaker, Peer, TcpPeer, NOP_HANDLER, NOP_HANDSHAKER};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::future::join_all;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct TcpOptions {
    /// Address to listen on. `:PORT` listens on every interface.
    pub listen_addr: String,
    /// Upper bound on a single handshake.
    pub handshake_timeout: Duration,
    /// Upper bound on opening an outbound connection.
    pub dial_timeout: Duration,
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self {
            listen_addr: config::DEFAULT_ADDR.to_string(),
            handshake_timeout: Duration::from_secs(10),
            dial_timeout: Duration::from_secs(10),
        }
    }
}

/// [`Listener`] over a bound tokio [`TcpListener`].
pub struct TcpPeerListener {
    local_addr: SocketAddr,
    listener: tokio::sync::RwLock<Option<TcpListener>>,
    closed: CancellationToken,
}

impl TcpPeerListener {
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            local_addr,
            listener: tokio::sync::RwLock::new(Some(listener)),
            closed: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl Listener for TcpPeerListener {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn accept(&self) -> Result<Arc<dyn Peer>> {
        let listener = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(Error::Closed),
            listener = self.listener.read() => listener,
        };
        let Some(listener) = listener.as_ref() else {
            return Err(Error::Closed);
        };

        let (stream, _) = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(Error::Closed),
            accepted = listener.accept() => accepted?,
        };
        stream.set_nodelay(true)?;

        Ok(Arc::new(TcpPeer::new(stream, Direction::Inbound)?))
    }

    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        // Dropping the listener releases the socket.
        self.listener.write().await.take();
        Ok(())
    }
}

struct Inner {
    options: TcpOptions,
    listener: Box<dyn Listener>,
    handshaker: RwLock<Arc<dyn Handshaker>>,
    handler: RwLock<Arc<dyn Handler>>,
    error_handler: RwLock<ErrorHandler>,
    registry: PeerRegistry,
    shutdown: CancellationToken,
    accepting: watch::Sender<bool>,
}

/// [`Transport`] over TCP.
///
/// Cloning is cheap and every clone drives the same listener and registry.
#[derive(Clone)]
pub struct TcpTransport {
    inner: Arc<Inner>,
}

impl TcpTransport {
    /// Bind the listening socket. The address is known as soon as this returns.
    pub async fn bind(options: TcpOptions) -> Result<Self> {
        let listener = TcpPeerListener::bind(config::listen_addr(&options.listen_addr)).await?;
        Ok(Self::from_listener(options, listener))
    }

    pub fn from_listener(options: TcpOptions, listener: impl Listener + 'static) -> Self {
        let (accepting, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                options,
                listener: Box::new(listener),
                handshaker: RwLock::new(Arc::new(NOP_HANDSHAKER)),
                handler: RwLock::new(Arc::new(NOP_HANDLER)),
                error_handler: RwLock::new(log_errors()),
                registry: PeerRegistry::new(),
                shutdown: CancellationToken::new(),
                accepting,
            }),
        }
    }

    /// Replace the error sink while building the transport.
    pub fn with_error_handler(self, handler: ErrorHandler) -> Self {
        self.set_error_handler(handler);
        self
    }

    pub fn options(&self) -> &TcpOptions {
        &self.inner.options
    }

    /// Addresses of every registered Peer.
    pub fn peer_addrs(&self) -> Vec<SocketAddr> {
        self.inner.registry.addrs()
    }

    pub fn peer_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    fn report(&self, err: Error) {
        let handler = read_lock(&self.inner.error_handler);
        handler(err);
    }

    /// Handshake and register a fresh connection.
    async fn admit(&self, peer: &Arc<dyn Peer>) -> Result<()> {
        let addr = peer.remote_addr();
        let handshaker = read_lock(&self.inner.handshaker);
        let handshake = tokio::time::timeout(
            self.inner.options.handshake_timeout,
            handshaker.handshake(&**peer),
        );

        tokio::select! {
            biased;
            _ = self.inner.shutdown.cancelled() => return Err(Error::Closed),
            done = handshake => match done {
                Ok(result) => result?,
                Err(_) => return Err(Error::Timeout(format!("handshake with {}", addr))),
            },
        }

        // Fails once the transport is closed, so a late handshake cannot revive the Peer.
        self.inner.registry.insert(Arc::clone(peer))?;
        log::debug!("Registered {} peer {}", peer.direction(), addr);
        Ok(())
    }

    async fn handle_inbound(&self, peer: Arc<dyn Peer>) {
        let addr = peer.remote_addr();

        match self.admit(&peer).await {
            Ok(()) => self.run_handler(peer).await,
            Err(err) => {
                log::debug!("Rejected inbound peer {}: {}", addr, err);
                if let Err(close_err) = peer.close().await {
                    self.report(close_err.into());
                }
                if !matches!(err, Error::Closed) {
                    self.report(err);
                }
            }
        }
    }

    async fn run_handler(&self, peer: Arc<dyn Peer>) {
        let handler = read_lock(&self.inner.handler);
        handler.handle(Arc::clone(&peer)).await;

        if self.inner.registry.remove(&peer) {
            log::debug!("Unregistered peer {}", peer.remote_addr());
            if let Err(err) = peer.close().await {
                self.report(err.into());
            }
        }
    }

    async fn dial_peer(&self, addr: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let target = config::dial_addr(addr);
        let connect = TcpPeer::connect(target.as_str());
        let peer: Arc<dyn Peer> =
            match tokio::time::timeout(self.inner.options.dial_timeout, connect).await {
                Ok(peer) => Arc::new(peer?),
                Err(_) => return Err(Error::Timeout(format!("connect to {}", target))),
            };

        if let Err(err) = self.admit(&peer).await {
            if let Err(close_err) = peer.close().await {
                log::debug!("Failed to close rejected peer {}: {}", target, close_err);
            }
            return Err(err);
        }

        let transport = self.clone();
        tokio::spawn(async move { transport.run_handler(peer).await });
        Ok(())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn addr(&self) -> SocketAddr {
        self.inner.listener.local_addr()
    }

    async fn listen_and_accept(&self) -> Result<()> {
        if self.inner.accepting.send_replace(true) {
            return Err(Error::AlreadyListening);
        }
        let _accepting = Accepting(&self.inner.accepting);
        log::info!("Listening on {}", self.addr());

        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.inner.shutdown.cancelled() => break,
                accepted = self.inner.listener.accept() => accepted,
            };

            match accepted {
                Ok(peer) => {
                    let transport = self.clone();
                    tokio::spawn(async move { transport.handle_inbound(peer).await });
                }
                Err(Error::Closed) => break,
                Err(err) => {
                    self.report(err);
                    tokio::select! {
                        _ = self.inner.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                    }
                }
            }
        }

        log::debug!("Stopped accepting on {}", self.addr());
        Ok(())
    }

    async fn dial(&self, addr: &str) -> Result<()> {
        self.dial_peer(addr).await.map_err(|source| Error::Dial {
            addr: addr.to_string(),
            source: Box::new(source),
        })
    }

    fn set_handshaker(&self, handshaker: Arc<dyn Handshaker>) {
        write_lock(&self.inner.handshaker, handshaker);
    }

    fn set_handler(&self, handler: Arc<dyn Handler>) {
        write_lock(&self.inner.handler, handler);
    }

    fn set_error_handler(&self, handler: ErrorHandler) {
        write_lock(&self.inner.error_handler, handler);
    }

    fn acquire_peer(&self, addr: SocketAddr) -> Option<Arc<dyn Peer>> {
        self.inner.registry.get(&addr)
    }

    fn release_peer(&self, peer: Arc<dyn Peer>) {
        log::trace!("Released peer {}", peer.remote_addr());
    }

    async fn close(&self) -> Result<()> {
        self.inner.shutdown.cancel();
        let mut errors = Vec::new();

        if let Err(err) = self.inner.listener.close().await {
            log::error!("Failed to close listener {}: {}", self.addr(), err);
            errors.push(err);
        }

        let peers = self.inner.registry.close();
        let closed = join_all(peers.iter().map(|peer| peer.close())).await;
        for (peer, result) in peers.iter().zip(closed) {
            if let Err(err) = result {
                log::error!("Failed to close peer {}: {}", peer.remote_addr(), err);
                errors.push(err.into());
            }
        }

        let mut accepting = self.inner.accepting.subscribe();
        if accepting.wait_for(|accepting| !*accepting).await.is_err() {
            log::debug!("Accept state dropped while closing");
        }

        Error::join(errors)
    }
}

/// Clears the accepting flag when the accept loop exits, even if its future is dropped.
struct Accepting<'a>(&'a watch::Sender<bool>);

impl Drop for Accepting<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

fn read_lock<T: Clone>(lock: &RwLock<T>) -> T {
    match lock.read() {
        Ok(value) => value.clone(),
        Err(err) => {
            log::error!("Error:\t{}", err);
            err.into_inner().clone()
        }
    }
}

fn write_lock<T>(lock: &RwLock<T>, value: T) {
    match lock.write() {
        Ok(mut guard) => *guard = value,
        Err(err) => {
            log::error!("Error:\t{}", err);
            *err.into_inner() = value;
        }
    }
}
