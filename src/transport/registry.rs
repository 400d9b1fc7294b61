use crate::peer::Peer;
use crate::{Error, Result};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Live Peers keyed by remote address.
///
/// The closed flag sits under the same lock as the map, so a Peer that finishes its
/// handshake after [`PeerRegistry::close`] can never be registered.
#[derive(Default)]
pub(crate) struct PeerRegistry {
    state: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    closed: bool,
    peers: HashMap<SocketAddr, Arc<dyn Peer>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(err) => {
                log::error!("Error:\t{}", err);
                err.into_inner()
            }
        }
    }

    /// Register a Peer. The first connection for an address wins.
    pub fn insert(&self, peer: Arc<dyn Peer>) -> Result<()> {
        let addr = peer.remote_addr();
        let mut state = self.state();

        if state.closed {
            return Err(Error::Closed);
        }
        if state.peers.contains_key(&addr) {
            return Err(Error::DuplicatePeer(addr));
        }

        state.peers.insert(addr, peer);
        Ok(())
    }

    /// Unregister `peer` if it is still the registered entry for its address. Returns whether
    /// this call removed it.
    pub fn remove(&self, peer: &Arc<dyn Peer>) -> bool {
        let addr = peer.remote_addr();
        let mut state = self.state();

        match state.peers.get(&addr) {
            Some(registered) if std::ptr::addr_eq(Arc::as_ptr(registered), Arc::as_ptr(peer)) => {
                state.peers.remove(&addr);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<Arc<dyn Peer>> {
        self.state().peers.get(addr).cloned()
    }

    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.state().peers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.state().peers.len()
    }

    /// Refuse further registrations and hand back every registered Peer.
    pub fn close(&self) -> Vec<Arc<dyn Peer>> {
        let mut state = self.state();
        state.closed = true;
        state.peers.drain().map(|(_, peer)| peer).collect()
    }
}
