use bytes::{Buf, BufMut};
use crate::domain::weapon::WeaponState;
use crate::error::{SyncError, SyncResult};
use crate::utils::buffers::PacketBuffer;

/// reserve:int32, magazine:int32, state:uint8
pub const SNAPSHOT_LEN: usize = 9;

/// Largest ammo count the int32 fields can carry
pub const MAX_COUNT: u32 = i32::MAX as u32;

/// What observers see of a weapon. Each one replaces the previous entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicatedSnapshot {
    pub reserve: u32,
    pub magazine: u32,
    pub state: WeaponState,
}

impl ReplicatedSnapshot {
    /// Little-endian wire layout, exactly [`SNAPSHOT_LEN`] bytes
    pub fn encode(&self, buf: &mut PacketBuffer) -> SyncResult<Vec<u8>> {
        let reserve = i32::try_from(self.reserve).map_err(|_| SyncError::CountOverflow {
            field: "reserve",
            value: self.reserve,
        })?;
        let magazine = i32::try_from(self.magazine).map_err(|_| SyncError::CountOverflow {
            field: "magazine",
            value: self.magazine,
        })?;

        buf.clear();
        let out = buf.as_mut();
        out.put_i32_le(reserve);
        out.put_i32_le(magazine);
        out.put_u8(self.state.to_u8());
        Ok(buf.take().to_vec())
    }

    pub fn decode(mut data: &[u8]) -> SyncResult<Self> {
        if data.len() != SNAPSHOT_LEN {
            return Err(SyncError::SnapshotLength {
                expected: SNAPSHOT_LEN,
                actual: data.len(),
            });
        }

        let reserve = data.get_i32_le();
        let magazine = data.get_i32_le();
        let tag = data.get_u8();

        let state = WeaponState::from_u8(tag).ok_or(SyncError::UnknownState(tag))?;
        if reserve < 0 {
            return Err(SyncError::NegativeCount { field: "reserve", value: reserve });
        }
        if magazine < 0 {
            return Err(SyncError::NegativeCount { field: "magazine", value: magazine });
        }

        Ok(Self {
            reserve: reserve as u32,
            magazine: magazine as u32,
            state,
        })
    }
}
