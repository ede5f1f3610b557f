use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use crate::handlers::protocol::{Frame, RemoteCall, Target};
use crate::types::PeerId;
use crate::utils::buffers::SmallPeerVec;

/// Anything that accepts one-way remote calls. No reply ever comes back.
pub trait Dispatcher {
    fn dispatch(&mut self, target: Target, call: RemoteCall);
}

/// Calls queued during a tick, flushed to the bus once the tick is done
#[derive(Debug, Default)]
pub struct Outbox {
    queued: Vec<(Target, RemoteCall)>,
}

impl Outbox {
    pub fn drain(&mut self) -> Vec<(Target, RemoteCall)> {
        std::mem::take(&mut self.queued)
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}

impl Dispatcher for Outbox {
    fn dispatch(&mut self, target: Target, call: RemoteCall) {
        self.queued.push((target, call));
    }
}

/// In-process message dispatcher for one session.
/// Resolves targets to peer inboxes; never blocks the sender.
pub struct SessionBus {
    host: PeerId,
    inboxes: DashMap<PeerId, mpsc::Sender<Bytes>>,
}

impl SessionBus {
    pub fn new(host: PeerId) -> Self {
        Self {
            host,
            inboxes: DashMap::new(),
        }
    }

    pub fn host(&self) -> PeerId {
        self.host
    }

    pub fn register(&self, peer: PeerId, inbox: mpsc::Sender<Bytes>) {
        self.inboxes.insert(peer, inbox);
    }

    pub fn unregister(&self, peer: PeerId) -> bool {
        self.inboxes.remove(&peer).is_some()
    }

    /// Registered peers in id order
    pub fn peers(&self) -> SmallPeerVec {
        let mut peers: SmallPeerVec = self.inboxes.iter().map(|entry| *entry.key()).collect();
        peers.sort();
        peers
    }

    pub fn recipients(&self, target: Target) -> SmallPeerVec {
        match target {
            Target::AuthoritativeHost => std::iter::once(self.host).collect(),
            Target::Owner(peer) => std::iter::once(peer).collect(),
            Target::All => self.peers(),
        }
    }

    /// Deliver an encoded frame to every recipient of its target.
    /// Full or closed inboxes drop the frame. Returns how many accepted it.
    pub fn route(&self, frame: &Frame, bytes: Bytes) -> usize {
        let mut delivered = 0;
        for peer in self.recipients(frame.target) {
            let Some(tx) = self.inboxes.get(&peer).map(|entry| entry.value().clone()) else {
                log::debug!("No inbox for {}, dropping {} for {}", peer, frame.call.name(), frame.call.weapon());
                continue;
            };

            match tx.try_send(bytes.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    log::debug!(
                        "Inbox full for {}, dropping {} for {} from {}",
                        peer,
                        frame.call.name(),
                        frame.call.weapon(),
                        frame.from
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    log::debug!("Inbox closed for {}, dropping {}", peer, frame.call.name());
                }
            }
        }
        delivered
    }
}
