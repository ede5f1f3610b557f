use bytes::{BufMut, Bytes};
use serde::{Deserialize, Serialize};
use crate::error::SyncResult;
use crate::types::{PeerId, Vec3, WeaponId};
use crate::utils::buffers::PacketBuffer;

/// One shot handed to the authoritative host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FireRequest {
    pub origin: Vec3,
    /// Unit vector
    pub direction: Vec3,
    pub max_range: f32,
    pub requester: PeerId,
}

/// Who a frame is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// The single peer allowed to decide hits
    AuthoritativeHost,
    /// Every peer in the session, sender included
    All,
    /// The peer that owns (and alone writes) a weapon
    Owner(PeerId),
}

/// Named one-way remote invocations. There is no reply variant: the sender
/// never learns what happened on the other side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RemoteCall {
    RequestFire { weapon: WeaponId, request: FireRequest },
    NotifyHitEffect { weapon: WeaponId, hit_point: Vec3 },
    AddAmmo { weapon: WeaponId, amount: u32 },
    Replicate { weapon: WeaponId, snapshot: Vec<u8> },
}

impl RemoteCall {
    pub fn name(&self) -> &'static str {
        match self {
            RemoteCall::RequestFire { .. } => "RequestFire",
            RemoteCall::NotifyHitEffect { .. } => "NotifyHitEffect",
            RemoteCall::AddAmmo { .. } => "AddAmmo",
            RemoteCall::Replicate { .. } => "Replicate",
        }
    }

    pub fn weapon(&self) -> WeaponId {
        match self {
            RemoteCall::RequestFire { weapon, .. }
            | RemoteCall::NotifyHitEffect { weapon, .. }
            | RemoteCall::AddAmmo { weapon, .. }
            | RemoteCall::Replicate { weapon, .. } => *weapon,
        }
    }
}

/// Addressed remote call as it travels between peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub from: PeerId,
    pub target: Target,
    pub call: RemoteCall,
}

impl Frame {
    pub fn new(from: PeerId, target: Target, call: RemoteCall) -> Self {
        Self { from, target, call }
    }

    /// Serialize into `buf` and hand back the finished bytes
    pub fn encode(&self, buf: &mut PacketBuffer) -> SyncResult<Bytes> {
        buf.clear();
        bincode::serialize_into(buf.as_mut().writer(), self)?;
        Ok(buf.take())
    }

    pub fn decode(data: &[u8]) -> SyncResult<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_survives_the_wire() {
        let frame = Frame::new(
            PeerId(2),
            Target::AuthoritativeHost,
            RemoteCall::RequestFire {
                weapon: WeaponId(2),
                request: FireRequest {
                    origin: Vec3::new(0.0, 1.0, 0.0),
                    direction: Vec3::Z,
                    max_range: 50.0,
                    requester: PeerId(2),
                },
            },
        );
        let mut buf = PacketBuffer::default();
        let bytes = frame.encode(&mut buf).unwrap();
        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_decode_truncated_frame() {
        let frame = Frame::new(PeerId(1), Target::All, RemoteCall::NotifyHitEffect {
            weapon: WeaponId(1),
            hit_point: Vec3::ONE,
        });
        let mut buf = PacketBuffer::default();
        let bytes = frame.encode(&mut buf).unwrap();
        assert!(Frame::decode(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn test_call_names() {
        let call = RemoteCall::AddAmmo { weapon: WeaponId(4), amount: 30 };
        assert_eq!(call.name(), "AddAmmo");
        assert_eq!(call.weapon(), WeaponId(4));
    }
}
