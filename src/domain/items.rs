use crate::handlers::bus::Dispatcher;
use crate::handlers::protocol::{RemoteCall, Target};
use crate::state::session::SessionRoles;
use crate::types::{PeerId, WeaponId};

/// Pickup that tops up a weapon's reserve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmmoPack {
    pub amount: u32,
}

impl AmmoPack {
    pub fn new(amount: u32) -> Self {
        Self { amount }
    }

    /// Consume the pack for `weapon`. Only the host may use items; the grant
    /// itself travels to the owning peer, which alone writes the ammo pool.
    pub fn use_on(
        &self,
        local: PeerId,
        roles: SessionRoles,
        weapon: WeaponId,
        owner: PeerId,
        out: &mut dyn Dispatcher,
    ) -> bool {
        if !roles.is_host(local) {
            log::debug!("{} is not the host; ammo pack for {} left alone", local, weapon);
            return false;
        }
        out.dispatch(Target::Owner(owner), RemoteCall::AddAmmo {
            weapon,
            amount: self.amount,
        });
        true
    }
}
