//! One participant's view of the session: the weapons it owns (and alone
//! writes), read-only mirrors of everybody else's, its timer queue, and the
//! outbox of one-way calls produced while handling a tick.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use crate::domain::effects::{play_shot, EffectSink};
use crate::domain::hit_resolver::HitResolver;
use crate::domain::items::AmmoPack;
use crate::domain::weapon::{Muzzle, Weapon, WeaponTimer};
use crate::domain::world::CombatWorld;
use crate::handlers::bus::{Dispatcher, Outbox};
use crate::handlers::protocol::{FireRequest, Frame, RemoteCall, Target};
use crate::state::commands::PeerInput;
use crate::state::session::SessionRoles;
use crate::tick::replication::ReplicatedSnapshot;
use crate::tick::timers::{TimerId, TimerQueue};
use crate::types::{PeerId, Vec3, WeaponId};
use crate::utils::buffers::PacketBuffer;
use crate::utils::weapondb::WeaponDb;

/// A weapon this peer owns
#[derive(Debug)]
pub struct OwnedWeapon {
    pub weapon: Weapon,
    pub muzzle: Muzzle,
}

/// Read-only copy of someone else's weapon, replaced by each snapshot
#[derive(Debug)]
pub struct WeaponMirror {
    id: WeaponId,
    owner: PeerId,
    kind: u32,
    snapshot: Option<ReplicatedSnapshot>,
    updates: u64,
    muzzle: Muzzle,
    trail_timer: Option<TimerId>,
}

impl WeaponMirror {
    fn new(id: WeaponId, owner: PeerId, kind: u32) -> Self {
        Self {
            id,
            owner,
            kind,
            snapshot: None,
            updates: 0,
            muzzle: Muzzle::default(),
            trail_timer: None,
        }
    }

    pub fn id(&self) -> WeaponId {
        self.id
    }

    pub fn owner(&self) -> PeerId {
        self.owner
    }

    /// None until the first snapshot arrives
    pub fn snapshot(&self) -> Option<ReplicatedSnapshot> {
        self.snapshot
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Last muzzle pose reported by movement code, where trails start
    pub fn muzzle(&self) -> Muzzle {
        self.muzzle
    }

    fn apply(&mut self, snapshot: ReplicatedSnapshot) {
        self.snapshot = Some(snapshot);
        self.updates += 1;
    }
}

/// Owner/observer split, fixed when the slot is created
#[derive(Debug)]
pub enum WeaponSlot {
    Owned(OwnedWeapon),
    Mirrored(WeaponMirror),
}

impl WeaponSlot {
    fn owner(&self, local: PeerId) -> PeerId {
        match self {
            WeaponSlot::Owned(_) => local,
            WeaponSlot::Mirrored(mirror) => mirror.owner,
        }
    }

    fn kind(&self) -> u32 {
        match self {
            WeaponSlot::Owned(owned) => owned.weapon.kind(),
            WeaponSlot::Mirrored(mirror) => mirror.kind,
        }
    }
}

pub struct Peer {
    id: PeerId,
    roles: SessionRoles,
    weapons: Arc<WeaponDb>,
    slots: BTreeMap<WeaponId, WeaponSlot>,
    timers: TimerQueue<WeaponTimer>,
    outbox: Outbox,
    effects: Box<dyn EffectSink>,
    world: Box<dyn CombatWorld>,
    trail_duration: Duration,
    send_buffer: PacketBuffer,
}

impl Peer {
    pub fn new(
        id: PeerId,
        roles: SessionRoles,
        weapons: Arc<WeaponDb>,
        world: Box<dyn CombatWorld>,
        effects: Box<dyn EffectSink>,
        trail_duration: Duration,
        now: Instant,
    ) -> Self {
        Self {
            id,
            roles,
            weapons,
            slots: BTreeMap::new(),
            timers: TimerQueue::new(now),
            outbox: Outbox::default(),
            effects,
            world,
            trail_duration,
            send_buffer: PacketBuffer::new(64),
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn roles(&self) -> SessionRoles {
        self.roles
    }

    pub fn is_host(&self) -> bool {
        self.roles.is_host(self.id)
    }

    pub fn world(&self) -> &dyn CombatWorld {
        self.world.as_ref()
    }

    pub fn slots(&self) -> impl Iterator<Item = &WeaponSlot> {
        self.slots.values()
    }

    pub fn owned(&self, weapon: WeaponId) -> Option<&Weapon> {
        match self.slots.get(&weapon) {
            Some(WeaponSlot::Owned(owned)) => Some(&owned.weapon),
            _ => None,
        }
    }

    pub fn mirror(&self, weapon: WeaponId) -> Option<&WeaponMirror> {
        match self.slots.get(&weapon) {
            Some(WeaponSlot::Mirrored(mirror)) => Some(mirror),
            _ => None,
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Register a weapon this peer owns, activated and ready to fire
    pub fn equip(&mut self, weapon: WeaponId, kind: u32) -> Result<(), &'static str> {
        if self.slots.contains_key(&weapon) {
            return Err("Weapon already registered");
        }
        let data = self.weapons.get(kind).ok_or("Invalid weapon")?;
        data.validate().map_err(|_| "Invalid weapon")?;

        let mut owned = Weapon::new(weapon, data);
        owned.activate();
        self.slots.insert(weapon, WeaponSlot::Owned(OwnedWeapon {
            weapon: owned,
            muzzle: Muzzle::default(),
        }));
        Ok(())
    }

    /// Register another peer's weapon as a read-only mirror
    pub fn observe(&mut self, weapon: WeaponId, owner: PeerId, kind: u32) -> Result<(), &'static str> {
        if owner == self.id {
            return Err("Cannot mirror an owned weapon");
        }
        if self.slots.contains_key(&weapon) {
            return Err("Weapon already registered");
        }
        if !self.weapons.contains(kind) {
            return Err("Invalid weapon");
        }
        self.slots.insert(weapon, WeaponSlot::Mirrored(WeaponMirror::new(weapon, owner, kind)));
        Ok(())
    }

    pub fn handle_input(&mut self, now: Instant, input: PeerInput) {
        match input {
            PeerInput::Aim { weapon, muzzle } => self.aim(weapon, muzzle),
            PeerInput::TrackMirror { weapon, muzzle } => self.track_mirror(weapon, muzzle),
            PeerInput::Fire { weapon } => self.fire(now, weapon),
            PeerInput::Reload { weapon } => {
                if !self.reload(now, weapon) {
                    log::trace!("[{}] reload of {} rejected", self.id, weapon);
                }
            }
            PeerInput::Activate { weapon } => self.activate(weapon),
            PeerInput::Deactivate { weapon } => self.deactivate(now, weapon),
            PeerInput::UseAmmoPack { weapon, amount } => {
                self.use_ammo_pack(weapon, AmmoPack::new(amount));
            }
        }
    }

    pub fn aim(&mut self, weapon: WeaponId, muzzle: Muzzle) {
        if let Some(WeaponSlot::Owned(owned)) = self.slots.get_mut(&weapon) {
            owned.muzzle = muzzle;
        }
    }

    /// Follow where another peer's weapon is, as seen locally
    pub fn track_mirror(&mut self, weapon: WeaponId, muzzle: Muzzle) {
        if let Some(WeaponSlot::Mirrored(mirror)) = self.slots.get_mut(&weapon) {
            mirror.muzzle = muzzle;
        }
    }

    /// Pull the trigger. Spends the round locally and sends the shot to the
    /// host; a rejected pull does nothing at all.
    pub fn fire(&mut self, now: Instant, weapon: WeaponId) {
        self.timers.set_clock(now);
        let Some(WeaponSlot::Owned(owned)) = self.slots.get_mut(&weapon) else {
            log::debug!("[{}] cannot fire {}: not owned here", self.id, weapon);
            return;
        };

        if let Some(request) = owned.weapon.fire(now, owned.muzzle, self.id) {
            self.outbox.dispatch(Target::AuthoritativeHost, RemoteCall::RequestFire { weapon, request });
        }
    }

    pub fn reload(&mut self, now: Instant, weapon: WeaponId) -> bool {
        self.timers.set_clock(now);
        let Some(WeaponSlot::Owned(owned)) = self.slots.get_mut(&weapon) else {
            return false;
        };

        if !owned.weapon.reload(&mut self.timers) {
            return false;
        }
        self.effects.reload_sound(weapon);
        log::debug!(
            "[{}] reloading {} ({}/{} + {})",
            self.id,
            weapon,
            owned.weapon.ammo().magazine(),
            owned.weapon.ammo().capacity(),
            owned.weapon.ammo().reserve()
        );
        true
    }

    pub fn activate(&mut self, weapon: WeaponId) {
        if let Some(WeaponSlot::Owned(owned)) = self.slots.get_mut(&weapon) {
            if !owned.weapon.is_active() {
                owned.weapon.activate();
            }
        }
    }

    pub fn deactivate(&mut self, now: Instant, weapon: WeaponId) {
        self.timers.set_clock(now);
        if let Some(WeaponSlot::Owned(owned)) = self.slots.get_mut(&weapon) {
            if owned.weapon.is_active() {
                owned.weapon.deactivate(&mut self.timers);
            }
        }
    }

    /// Host-side pickup. The grant itself is applied by the weapon's owner.
    pub fn use_ammo_pack(&mut self, weapon: WeaponId, pack: AmmoPack) -> bool {
        let Some(slot) = self.slots.get(&weapon) else {
            return false;
        };
        let owner = slot.owner(self.id);
        pack.use_on(self.id, self.roles, weapon, owner, &mut self.outbox)
    }

    pub fn handle_frame(&mut self, now: Instant, frame: Frame) {
        self.timers.set_clock(now);
        let Frame { from, call, .. } = frame;
        match call {
            RemoteCall::RequestFire { weapon, request } => self.on_request_fire(from, weapon, request),
            RemoteCall::NotifyHitEffect { weapon, hit_point } => self.on_hit_effect(weapon, hit_point),
            RemoteCall::AddAmmo { weapon, amount } => self.on_add_ammo(from, weapon, amount),
            RemoteCall::Replicate { weapon, snapshot } => self.on_replicate(from, weapon, &snapshot),
        }
    }

    fn on_request_fire(&mut self, from: PeerId, weapon: WeaponId, mut request: FireRequest) {
        let resolver = HitResolver::new(self.id, self.roles);
        if !resolver.is_authoritative() {
            log::warn!(
                "[{}] RequestFire for {} from {} reached a non-host peer (host is {}); ignored",
                self.id,
                weapon,
                from,
                self.roles.host()
            );
            return;
        }

        let Some(slot) = self.slots.get(&weapon) else {
            log::debug!("[{}] RequestFire for unknown {}", self.id, weapon);
            return;
        };
        let owner = slot.owner(self.id);
        if owner != from {
            log::warn!("[{}] {} tried to fire {} owned by {}; ignored", self.id, from, weapon, owner);
            return;
        }
        let Some(damage) = self.weapons.get(slot.kind()).map(|data| data.damage) else {
            log::debug!("[{}] no tuning for {}", self.id, weapon);
            return;
        };

        request.requester = from;
        resolver.resolve(weapon, &request, damage, self.world.as_mut(), &mut self.outbox);
    }

    fn on_hit_effect(&mut self, weapon: WeaponId, hit_point: Vec3) {
        match self.slots.get_mut(&weapon) {
            Some(WeaponSlot::Owned(owned)) => {
                if !owned.weapon.is_active() {
                    return;
                }
                play_shot(self.effects.as_mut(), weapon, owned.muzzle.origin, hit_point);
                owned.weapon.schedule_trail_hide(&mut self.timers, self.trail_duration);
            }
            Some(WeaponSlot::Mirrored(mirror)) => {
                play_shot(self.effects.as_mut(), weapon, mirror.muzzle.origin, hit_point);
                if let Some(id) = mirror.trail_timer.take() {
                    self.timers.cancel(id);
                }
                let timer = WeaponTimer::HideTrail { weapon, epoch: 0 };
                mirror.trail_timer = Some(self.timers.after(self.trail_duration, timer));
            }
            None => log::debug!("[{}] hit effect for unknown {}", self.id, weapon),
        }
    }

    fn on_add_ammo(&mut self, from: PeerId, weapon: WeaponId, amount: u32) {
        match self.slots.get_mut(&weapon) {
            Some(WeaponSlot::Owned(owned)) => {
                owned.weapon.add_ammo(amount);
                log::debug!(
                    "[{}] {} granted {} rounds by {} (reserve {})",
                    self.id,
                    weapon,
                    amount,
                    from,
                    owned.weapon.ammo().reserve()
                );
            }
            Some(WeaponSlot::Mirrored(mirror)) => {
                log::warn!(
                    "[{}] AddAmmo for {} from {} ignored: owned by {}",
                    self.id,
                    weapon,
                    from,
                    mirror.owner
                );
            }
            None => log::debug!("[{}] AddAmmo for unknown {}", self.id, weapon),
        }
    }

    fn on_replicate(&mut self, from: PeerId, weapon: WeaponId, raw: &[u8]) {
        match self.slots.get_mut(&weapon) {
            Some(WeaponSlot::Mirrored(mirror)) => {
                if from != mirror.owner {
                    log::warn!(
                        "[{}] snapshot of {} from {} ignored: only {} writes it",
                        self.id,
                        weapon,
                        from,
                        mirror.owner
                    );
                    return;
                }
                match ReplicatedSnapshot::decode(raw) {
                    Ok(snapshot) => mirror.apply(snapshot),
                    Err(e) => log::warn!("[{}] bad snapshot for {}: {}", self.id, weapon, e),
                }
            }
            // Our own broadcast coming back
            Some(WeaponSlot::Owned(_)) => {}
            None => log::debug!("[{}] snapshot for unknown {}", self.id, weapon),
        }
    }

    /// Run every deferred continuation that has come due
    pub fn run_timers(&mut self, now: Instant) {
        self.timers.set_clock(now);
        for (_, timer) in self.timers.drain_due() {
            match timer {
                WeaponTimer::ReloadComplete { weapon, epoch } => {
                    if let Some(WeaponSlot::Owned(owned)) = self.slots.get_mut(&weapon) {
                        if owned.weapon.complete_reload(epoch) {
                            log::debug!(
                                "[{}] {} reloaded ({}/{} + {})",
                                self.id,
                                weapon,
                                owned.weapon.ammo().magazine(),
                                owned.weapon.ammo().capacity(),
                                owned.weapon.ammo().reserve()
                            );
                        }
                    }
                }
                WeaponTimer::HideTrail { weapon, epoch } => match self.slots.get_mut(&weapon) {
                    Some(WeaponSlot::Owned(owned)) => {
                        if owned.weapon.finish_trail(epoch) {
                            self.effects.hide_trail(weapon);
                        }
                    }
                    Some(WeaponSlot::Mirrored(mirror)) => {
                        mirror.trail_timer = None;
                        self.effects.hide_trail(weapon);
                    }
                    None => {}
                },
            }
        }
    }

    /// Queue a full snapshot of every owned weapon for all peers
    pub fn replicate(&mut self) {
        for (weapon, slot) in &self.slots {
            let WeaponSlot::Owned(owned) = slot else {
                continue;
            };
            match owned.weapon.snapshot().encode(&mut self.send_buffer) {
                Ok(snapshot) => self.outbox.dispatch(Target::All, RemoteCall::Replicate {
                    weapon: *weapon,
                    snapshot,
                }),
                Err(e) => log::warn!("[{}] cannot replicate {}: {}", self.id, weapon, e),
            }
        }
    }

    pub fn take_outbox(&mut self) -> Vec<(Target, RemoteCall)> {
        self.outbox.drain()
    }
}
