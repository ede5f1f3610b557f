use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;
use crate::handlers::bus::SessionBus;
use crate::state::commands::PeerInput;
use crate::state::peer::Peer;
use crate::types::PeerId;

/// Session-wide role assignment, fixed when the session is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRoles {
    host: PeerId,
}

impl SessionRoles {
    pub fn new(host: PeerId) -> Self {
        Self { host }
    }

    pub fn host(&self) -> PeerId {
        self.host
    }

    pub fn is_host(&self, peer: PeerId) -> bool {
        self.host == peer
    }
}

/// Handle to a peer with its input queue and tick task
pub struct PeerHandle {
    pub peer: Arc<RwLock<Peer>>,
    pub input_tx: mpsc::Sender<PeerInput>,
    pub task_handle: JoinHandle<()>,
}

/// Every peer of one session, keyed by id.
/// Uses DashMap so input senders can be looked up without a global lock.
pub struct SessionState {
    id: Uuid,
    roles: SessionRoles,
    bus: Arc<SessionBus>,
    peers: DashMap<PeerId, PeerHandle>,
    next_peer_id: AtomicU32,
}

impl SessionState {
    /// The first id handed out by [`SessionState::next_peer_id`] is the host
    pub fn new() -> Self {
        let host = PeerId(1);
        Self {
            id: Uuid::new_v4(),
            roles: SessionRoles::new(host),
            bus: Arc::new(SessionBus::new(host)),
            peers: DashMap::new(),
            next_peer_id: AtomicU32::new(host.0),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn roles(&self) -> SessionRoles {
        self.roles
    }

    pub fn bus(&self) -> Arc<SessionBus> {
        self.bus.clone()
    }

    /// Generate next peer ID (lock-free)
    pub fn next_peer_id(&self) -> PeerId {
        PeerId(self.next_peer_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn insert_peer(&self, id: PeerId, handle: PeerHandle) {
        self.peers.insert(id, handle);
    }

    pub fn remove_peer(&self, id: PeerId) -> Option<PeerHandle> {
        self.bus.unregister(id);
        self.peers.remove(&id).map(|(_, handle)| handle)
    }

    pub fn peer(&self, id: PeerId) -> Option<Arc<RwLock<Peer>>> {
        self.peers.get(&id).map(|entry| entry.peer.clone())
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.peers.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Queue a local operation on a peer without waiting
    pub fn send_input(&self, id: PeerId, input: PeerInput) -> Result<(), &'static str> {
        let tx = self
            .peers
            .get(&id)
            .map(|entry| entry.input_tx.clone())
            .ok_or("Peer not found")?;
        tx.try_send(input).map_err(|_| "Input queue full or closed")
    }

    /// Close every input queue and wait for the tick loops to wind down
    pub async fn shutdown(&self) {
        for id in self.peer_ids() {
            if let Some(handle) = self.remove_peer(id) {
                let PeerHandle { input_tx, task_handle, .. } = handle;
                drop(input_tx);
                if let Err(e) = task_handle.await {
                    log::error!("Tick loop for {} ended abnormally: {}", id, e);
                }
            }
        }
        log::info!("Session {} shut down", self.id);
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
