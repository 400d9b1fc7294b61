mod registry;
mod tcp;

use crate::peer::{Handler, Handshaker, Peer};
use crate::{Error, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

pub use tcp::{TcpOptions, TcpPeerListener, TcpTransport};

/// Sink for errors raised on background tasks that have no caller to return to: failed
/// accepts, rejected handshakes, failed peer closes.
pub type ErrorHandler = Arc<dyn Fn(Error) + Send + Sync>;

/// Error handler that writes every error to the log.
pub fn log_errors() -> ErrorHandler {
    Arc::new(|err: Error| log::error!("Transport error:\t{}", err))
}

/// Source of inbound Peers.
#[async_trait]
pub trait Listener: Send + Sync {
    fn local_addr(&self) -> SocketAddr;

    /// Wait for the next connection. Fails with [`Error::Closed`] once the listener is closed.
    async fn accept(&self) -> Result<Arc<dyn Peer>>;

    async fn close(&self) -> Result<()>;
}

/// Owns listening, dialing and the registry of live Peers.
///
/// Every connection, inbound or outbound, goes through the [`Handshaker`] first. Only a
/// connection that passes is registered and handed to the [`Handler`], which then runs until
/// the Peer stream ends.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Address the transport listens on. Valid as soon as the transport is constructed.
    fn addr(&self) -> SocketAddr;

    /// Accept connections until the transport is closed.
    async fn listen_and_accept(&self) -> Result<()>;

    /// Connect to `addr` and run the handshake on the calling task.
    async fn dial(&self, addr: &str) -> Result<()>;

    fn set_handshaker(&self, handshaker: Arc<dyn Handshaker>);

    fn set_handler(&self, handler: Arc<dyn Handler>);

    fn set_error_handler(&self, handler: ErrorHandler);

    /// Look up a registered Peer, for example to write a reply to it.
    fn acquire_peer(&self, addr: SocketAddr) -> Option<Arc<dyn Peer>>;

    fn release_peer(&self, peer: Arc<dyn Peer>);

    /// Stop accepting, close every registered Peer and wait for the accept loop to exit.
    async fn close(&self) -> Result<()>;
}

/// Error handler that keeps every error it receives.
#[derive(Clone, Default)]
pub struct ErrorLog(Arc<Mutex<Vec<Error>>>);

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(&self) -> ErrorHandler {
        let errors = self.clone();
        Arc::new(move |err: Error| errors.errors().push(err))
    }

    /// Drain the recorded errors.
    pub fn take(&self) -> Vec<Error> {
        std::mem::take(&mut *self.errors())
    }

    pub fn len(&self) -> usize {
        self.errors().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors().is_empty()
    }

    fn errors(&self) -> MutexGuard<'_, Vec<Error>> {
        match self.0.lock() {
            Ok(errors) => errors,
            Err(err) => err.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_log_collects_and_drains() {
        let log = ErrorLog::new();
        let handler = log.handler();

        handler(Error::Closed);
        handler(Error::AlreadyListening);

        assert_eq!(log.len(), 2);
        let errors = log.take();
        assert!(matches!(errors[0], Error::Closed));
        assert!(matches!(errors[1], Error::AlreadyListening));
        assert!(log.is_empty());
    }
}
