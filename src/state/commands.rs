use std::collections::BTreeMap;
use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TryRecvError};
use crate::domain::weapon::Muzzle;
use crate::handlers::protocol::{Frame, RemoteCall};
use crate::types::{PeerId, WeaponId};

/// Local operation issued on a peer (player input, spawn logic, pickups).
/// Applied in the order sent, within the peer's tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerInput {
    Aim { weapon: WeaponId, muzzle: Muzzle },
    /// Where another peer's weapon currently is, from local movement state
    TrackMirror { weapon: WeaponId, muzzle: Muzzle },
    Fire { weapon: WeaponId },
    Reload { weapon: WeaponId },
    Activate { weapon: WeaponId },
    Deactivate { weapon: WeaponId },
    /// Host only: hand an ammo pack to a weapon's owner
    UseAmmoPack { weapon: WeaponId, amount: u32 },
}

/// Drain pending local inputs in order.
/// The flag is false once every sender is gone.
pub fn drain_inputs(rx: &mut mpsc::Receiver<PeerInput>) -> (Vec<PeerInput>, bool) {
    let mut inputs = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(input) => inputs.push(input),
            Err(TryRecvError::Empty) => return (inputs, true),
            Err(TryRecvError::Disconnected) => return (inputs, false),
        }
    }
}

/// Decode everything in the inbox, keeping only the latest snapshot per weapon
/// and sender. A superseded snapshot carries nothing the newer one doesn't.
pub fn drain_and_coalesce(rx: &mut mpsc::Receiver<Bytes>) -> Vec<Frame> {
    let mut latest_snapshots: BTreeMap<(WeaponId, PeerId), Frame> = BTreeMap::new();
    let mut other_frames: Vec<Frame> = Vec::new();

    while let Ok(raw) = rx.try_recv() {
        let frame = match Frame::decode(&raw) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Dropping undecodable frame ({} bytes): {}", raw.len(), e);
                continue;
            }
        };
        match frame.call {
            RemoteCall::Replicate { weapon, .. } => {
                latest_snapshots.insert((weapon, frame.from), frame);
            }
            _ => other_frames.push(frame),
        }
    }

    // Calls first, in arrival order, then the surviving snapshots
    other_frames.extend(latest_snapshots.into_values());
    other_frames
}
