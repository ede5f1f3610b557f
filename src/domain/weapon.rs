//! Fire-control state machine for one weapon instance.
//!
//! Only the owning peer ever holds a [`Weapon`]. Ammo is spent the moment the
//! trigger is accepted here; the host decides separately whether the shot hit
//! anything, and nothing flows back to reconcile the two.

use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use crate::handlers::protocol::FireRequest;
use crate::tick::replication::{ReplicatedSnapshot, MAX_COUNT};
use crate::tick::timers::{TimerId, TimerQueue};
use crate::types::{PeerId, Vec3, WeaponId};
use crate::utils::weapondb::WeaponData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WeaponState {
    Ready = 0,
    Empty = 1,
    Reloading = 2,
}

impl WeaponState {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ready),
            1 => Some(Self::Empty),
            2 => Some(Self::Reloading),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmmoPool {
    reserve: u32,
    magazine: u32,
    capacity: u32,
}

impl AmmoPool {
    pub fn new(capacity: u32, reserve: u32) -> Self {
        assert!(capacity > 0, "magazine capacity must be positive");
        Self {
            reserve,
            magazine: 0,
            capacity,
        }
    }

    pub fn reserve(&self) -> u32 {
        self.reserve
    }

    pub fn magazine(&self) -> u32 {
        self.magazine
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn total(&self) -> u64 {
        self.reserve as u64 + self.magazine as u64
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FireTiming {
    pub min_fire_interval: Duration,
    pub reload_duration: Duration,
    last_fire: Option<Instant>,
}

impl FireTiming {
    pub fn new(min_fire_interval: Duration, reload_duration: Duration) -> Self {
        Self {
            min_fire_interval,
            reload_duration,
            last_fire: None,
        }
    }

    pub fn last_fire(&self) -> Option<Instant> {
        self.last_fire
    }

    /// A cleared timestamp never blocks the first shot
    pub fn cooled_down(&self, now: Instant) -> bool {
        match self.last_fire {
            Some(last) => now >= last + self.min_fire_interval,
            None => true,
        }
    }
}

/// Where shots leave the barrel. Driven by movement code outside this crate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Muzzle {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Default for Muzzle {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            direction: Vec3::Z,
        }
    }
}

/// Deferred continuations a weapon schedules on its peer's timer queue.
/// `epoch` ties each one to the activation that scheduled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponTimer {
    ReloadComplete { weapon: WeaponId, epoch: u32 },
    HideTrail { weapon: WeaponId, epoch: u32 },
}

#[derive(Debug, Clone)]
pub struct Weapon {
    id: WeaponId,
    kind: u32,
    max_range: f32,
    state: WeaponState,
    ammo: AmmoPool,
    timing: FireTiming,
    active: bool,
    epoch: u32,
    reload_timer: Option<TimerId>,
    trail_timer: Option<TimerId>,
}

impl Weapon {
    /// Build an inactive weapon from its tuning. Call [`Weapon::activate`] before use.
    pub fn new(id: WeaponId, data: &WeaponData) -> Self {
        Self {
            id,
            kind: data.id,
            max_range: data.range,
            state: WeaponState::Ready,
            ammo: AmmoPool::new(data.magazine_capacity, data.starting_reserve),
            timing: FireTiming::new(data.fire_interval(), data.reload_duration()),
            active: false,
            epoch: 0,
            reload_timer: None,
            trail_timer: None,
        }
    }

    pub fn id(&self) -> WeaponId {
        self.id
    }

    pub fn kind(&self) -> u32 {
        self.kind
    }

    pub fn state(&self) -> WeaponState {
        self.state
    }

    pub fn ammo(&self) -> &AmmoPool {
        &self.ammo
    }

    pub fn timing(&self) -> &FireTiming {
        &self.timing
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Fresh start: Ready, full magazine, no fire history.
    pub fn activate(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.active = true;
        self.state = WeaponState::Ready;
        self.ammo.magazine = self.ammo.capacity;
        self.timing.last_fire = None;
        self.reload_timer = None;
        self.trail_timer = None;
        self.check_invariants();
    }

    /// Cancel everything this instance scheduled. An interrupted reload is lost.
    pub fn deactivate(&mut self, timers: &mut TimerQueue<WeaponTimer>) {
        if let Some(id) = self.reload_timer.take() {
            timers.cancel(id);
        }
        if let Some(id) = self.trail_timer.take() {
            timers.cancel(id);
        }
        if self.state == WeaponState::Reloading {
            self.state = self.resting_state();
        }
        self.active = false;
        self.check_invariants();
    }

    /// Try to pull the trigger. Rejections (wrong state, too soon) are silent.
    pub fn fire(&mut self, now: Instant, muzzle: Muzzle, requester: PeerId) -> Option<FireRequest> {
        if !self.active || self.state != WeaponState::Ready || !self.timing.cooled_down(now) {
            return None;
        }

        self.timing.last_fire = Some(now);
        self.ammo.magazine -= 1;
        if self.ammo.magazine == 0 {
            self.state = WeaponState::Empty;
        }
        self.check_invariants();

        Some(FireRequest {
            origin: muzzle.origin,
            direction: muzzle.direction.normalize_or_zero(),
            max_range: self.max_range,
            requester,
        })
    }

    /// Start a reload. Returns false, changing nothing, when already reloading,
    /// out of reserve, or the magazine is full.
    pub fn reload(&mut self, timers: &mut TimerQueue<WeaponTimer>) -> bool {
        if !self.active
            || self.state == WeaponState::Reloading
            || self.ammo.reserve == 0
            || self.ammo.magazine >= self.ammo.capacity
        {
            return false;
        }

        self.state = WeaponState::Reloading;
        let timer = WeaponTimer::ReloadComplete {
            weapon: self.id,
            epoch: self.epoch,
        };
        self.reload_timer = Some(timers.after(self.timing.reload_duration, timer));
        self.check_invariants();
        true
    }

    /// Deferred half of [`Weapon::reload`]. Stale completions are discarded.
    pub fn complete_reload(&mut self, epoch: u32) -> bool {
        if epoch != self.epoch || self.state != WeaponState::Reloading {
            return false;
        }

        let to_fill = (self.ammo.capacity - self.ammo.magazine).min(self.ammo.reserve);
        self.ammo.magazine += to_fill;
        self.ammo.reserve -= to_fill;
        self.state = WeaponState::Ready;
        self.reload_timer = None;
        self.check_invariants();
        true
    }

    /// Grant reserve ammo. No gameplay limit; only clamped to what a snapshot can carry.
    pub fn add_ammo(&mut self, amount: u32) {
        self.ammo.reserve = self.ammo.reserve.saturating_add(amount).min(MAX_COUNT);
    }

    /// (Re)arm the cosmetic trail timer, replacing any trail still showing
    pub fn schedule_trail_hide(&mut self, timers: &mut TimerQueue<WeaponTimer>, after: Duration) {
        if let Some(id) = self.trail_timer.take() {
            timers.cancel(id);
        }
        let timer = WeaponTimer::HideTrail {
            weapon: self.id,
            epoch: self.epoch,
        };
        self.trail_timer = Some(timers.after(after, timer));
    }

    /// Acknowledge a fired trail timer. False when it belongs to an older activation.
    pub fn finish_trail(&mut self, epoch: u32) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.trail_timer = None;
        true
    }

    pub fn snapshot(&self) -> ReplicatedSnapshot {
        ReplicatedSnapshot {
            reserve: self.ammo.reserve,
            magazine: self.ammo.magazine,
            state: self.state,
        }
    }

    fn resting_state(&self) -> WeaponState {
        if self.ammo.magazine == 0 {
            WeaponState::Empty
        } else {
            WeaponState::Ready
        }
    }

    fn check_invariants(&self) {
        debug_assert!(
            self.ammo.magazine <= self.ammo.capacity,
            "{}: magazine {} over capacity {}",
            self.id,
            self.ammo.magazine,
            self.ammo.capacity
        );
        debug_assert!(
            self.state != WeaponState::Empty || self.ammo.magazine == 0,
            "{}: Empty with {} rounds loaded",
            self.id,
            self.ammo.magazine
        );
        debug_assert!(
            self.state != WeaponState::Ready || self.ammo.magazine > 0,
            "{}: Ready with an empty magazine",
            self.id
        );
        debug_assert!(
            self.state != WeaponState::Reloading || self.reload_timer.is_some(),
            "{}: Reloading without a pending completion",
            self.id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::weapondb::WeaponDb;

    const ME: PeerId = PeerId(1);

    fn rifle() -> WeaponData {
        WeaponDb::load().get(WeaponDb::default_weapon_id()).unwrap().clone()
    }

    fn tuned(capacity: u32, reserve: u32) -> WeaponData {
        WeaponData {
            magazine_capacity: capacity,
            starting_reserve: reserve,
            ..rifle()
        }
    }

    fn armed(data: &WeaponData) -> (Weapon, TimerQueue<WeaponTimer>, Instant) {
        let t0 = Instant::now();
        let mut weapon = Weapon::new(WeaponId(1), data);
        weapon.activate();
        (weapon, TimerQueue::new(t0), t0)
    }

    /// Fire `shots` times, each comfortably past the fire interval
    fn drain(weapon: &mut Weapon, start: Instant, shots: u32) -> Instant {
        let step = weapon.timing().min_fire_interval + Duration::from_millis(1);
        let mut now = start;
        for _ in 0..shots {
            assert!(weapon.fire(now, Muzzle::default(), ME).is_some());
            now += step;
        }
        now
    }

    fn run_timers(weapon: &mut Weapon, timers: &mut TimerQueue<WeaponTimer>, now: Instant) {
        timers.set_clock(now);
        for (_, timer) in timers.drain_due() {
            if let WeaponTimer::ReloadComplete { epoch, .. } = timer {
                weapon.complete_reload(epoch);
            }
        }
    }

    #[test]
    fn test_activate_fills_magazine() {
        let (weapon, _, _) = armed(&tuned(25, 100));
        assert_eq!(weapon.state(), WeaponState::Ready);
        assert_eq!(weapon.ammo().magazine(), 25);
        assert_eq!(weapon.ammo().reserve(), 100);
        assert!(weapon.timing().last_fire().is_none());
    }

    #[test]
    fn test_inactive_weapon_does_nothing() {
        let data = rifle();
        let mut weapon = Weapon::new(WeaponId(1), &data);
        let mut timers = TimerQueue::new(Instant::now());
        assert!(weapon.fire(Instant::now(), Muzzle::default(), ME).is_none());
        assert!(!weapon.reload(&mut timers));
    }

    #[test]
    fn test_fire_builds_request() {
        let (mut weapon, _, t0) = armed(&rifle());
        let muzzle = Muzzle {
            origin: Vec3::new(1.0, 2.0, 3.0),
            direction: Vec3::new(0.0, 0.0, 2.0),
        };
        let request = weapon.fire(t0, muzzle, ME).unwrap();
        assert_eq!(request.origin, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(request.direction, Vec3::Z);
        assert_eq!(request.max_range, 50.0);
        assert_eq!(request.requester, ME);
        assert_eq!(weapon.ammo().magazine(), 24);
    }

    #[test]
    fn test_scenario_a_drain_and_reload() {
        let (mut weapon, mut timers, t0) = armed(&tuned(25, 100));
        let now = drain(&mut weapon, t0, 25);
        assert_eq!(weapon.ammo().magazine(), 0);
        assert_eq!(weapon.state(), WeaponState::Empty);

        timers.set_clock(now);
        assert!(weapon.reload(&mut timers));
        assert_eq!(weapon.state(), WeaponState::Reloading);

        let done = now + weapon.timing().reload_duration;
        run_timers(&mut weapon, &mut timers, done);
        assert_eq!(weapon.ammo().magazine(), 25);
        assert_eq!(weapon.ammo().reserve(), 75);
        assert_eq!(weapon.state(), WeaponState::Ready);
    }

    #[test]
    fn test_scenario_b_partial_reserve() {
        let (mut weapon, mut timers, t0) = armed(&tuned(25, 10));
        let now = drain(&mut weapon, t0, 25);

        timers.set_clock(now);
        assert!(weapon.reload(&mut timers));
        run_timers(&mut weapon, &mut timers, now + Duration::from_secs(2));
        assert_eq!(weapon.ammo().magazine(), 10);
        assert_eq!(weapon.ammo().reserve(), 0);
        assert_eq!(weapon.state(), WeaponState::Ready);
    }

    #[test]
    fn test_scenario_c_rate_limit() {
        let (mut weapon, _, t0) = armed(&rifle());
        assert!(weapon.fire(t0, Muzzle::default(), ME).is_some());
        let half = weapon.timing().min_fire_interval / 2;
        assert!(weapon.fire(t0 + half, Muzzle::default(), ME).is_none());
        assert_eq!(weapon.ammo().magazine(), 24);
        assert_eq!(weapon.timing().last_fire(), Some(t0));

        let later = t0 + weapon.timing().min_fire_interval;
        assert!(weapon.fire(later, Muzzle::default(), ME).is_some());
        assert_eq!(weapon.ammo().magazine(), 23);
    }

    #[test]
    fn test_reload_never_completes_early() {
        let (mut weapon, mut timers, t0) = armed(&tuned(25, 100));
        let now = drain(&mut weapon, t0, 5);
        timers.set_clock(now);
        assert!(weapon.reload(&mut timers));

        let reload = weapon.timing().reload_duration;
        run_timers(&mut weapon, &mut timers, now + reload - Duration::from_millis(1));
        assert_eq!(weapon.state(), WeaponState::Reloading);
        assert_eq!(weapon.ammo().magazine(), 20);

        run_timers(&mut weapon, &mut timers, now + reload);
        assert_eq!(weapon.state(), WeaponState::Ready);
    }

    #[test]
    fn test_reload_conserves_total() {
        let (mut weapon, mut timers, t0) = armed(&tuned(25, 7));
        let now = drain(&mut weapon, t0, 12);
        let before = weapon.ammo().total();
        let (m0, r0) = (weapon.ammo().magazine(), weapon.ammo().reserve());

        timers.set_clock(now);
        assert!(weapon.reload(&mut timers));
        run_timers(&mut weapon, &mut timers, now + Duration::from_secs(5));

        let fill = (25 - m0).min(r0);
        assert_eq!(weapon.ammo().magazine(), m0 + fill);
        assert_eq!(weapon.ammo().reserve(), r0 - fill);
        assert_eq!(weapon.ammo().total(), before);
    }

    #[test]
    fn test_reload_rejections_change_nothing() {
        // full magazine
        let (mut weapon, mut timers, _) = armed(&tuned(25, 100));
        assert!(!weapon.reload(&mut timers));
        assert_eq!(weapon.state(), WeaponState::Ready);
        assert!(timers.is_empty());

        // no reserve
        let (mut weapon, mut timers, t0) = armed(&tuned(25, 0));
        drain(&mut weapon, t0, 3);
        assert!(!weapon.reload(&mut timers));
        assert_eq!(weapon.ammo().magazine(), 22);
        assert!(timers.is_empty());

        // already reloading
        let (mut weapon, mut timers, t0) = armed(&tuned(25, 100));
        drain(&mut weapon, t0, 3);
        assert!(weapon.reload(&mut timers));
        assert!(!weapon.reload(&mut timers));
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn test_cannot_fire_while_reloading_or_empty() {
        let (mut weapon, mut timers, t0) = armed(&tuned(2, 10));
        let now = drain(&mut weapon, t0, 2);
        assert_eq!(weapon.state(), WeaponState::Empty);
        assert!(weapon.fire(now + Duration::from_secs(1), Muzzle::default(), ME).is_none());

        assert!(weapon.reload(&mut timers));
        assert!(weapon.fire(now + Duration::from_secs(1), Muzzle::default(), ME).is_none());
        assert_eq!(weapon.ammo().magazine(), 0);
    }

    #[test]
    fn test_deactivate_cancels_reload() {
        let (mut weapon, mut timers, t0) = armed(&tuned(25, 100));
        let now = drain(&mut weapon, t0, 25);
        timers.set_clock(now);
        assert!(weapon.reload(&mut timers));

        weapon.deactivate(&mut timers);
        assert!(timers.is_empty());
        assert_eq!(weapon.state(), WeaponState::Empty);

        run_timers(&mut weapon, &mut timers, now + Duration::from_secs(10));
        assert_eq!(weapon.ammo().reserve(), 100);

        weapon.activate();
        assert_eq!(weapon.state(), WeaponState::Ready);
        assert_eq!(weapon.ammo().magazine(), 25);
        assert_eq!(weapon.ammo().reserve(), 100);
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let (mut weapon, mut timers, t0) = armed(&tuned(25, 100));
        drain(&mut weapon, t0, 5);
        assert!(weapon.reload(&mut timers));
        let stale = weapon.epoch();

        weapon.deactivate(&mut timers);
        weapon.activate();
        assert!(!weapon.complete_reload(stale));
        assert_eq!(weapon.ammo().reserve(), 100);
    }

    #[test]
    fn test_add_ammo_is_unconditional() {
        let (mut weapon, mut timers, t0) = armed(&tuned(25, 0));
        drain(&mut weapon, t0, 25);
        weapon.add_ammo(40);
        assert_eq!(weapon.ammo().reserve(), 40);
        assert_eq!(weapon.state(), WeaponState::Empty);

        assert!(weapon.reload(&mut timers));
        weapon.add_ammo(5);
        assert_eq!(weapon.ammo().reserve(), 45);
        assert_eq!(weapon.state(), WeaponState::Reloading);
    }

    #[test]
    fn test_add_ammo_stays_within_wire_range() {
        let (mut weapon, _, _) = armed(&tuned(25, 100));
        weapon.add_ammo(u32::MAX);
        assert_eq!(weapon.ammo().reserve(), MAX_COUNT);
        weapon.add_ammo(1);
        assert_eq!(weapon.ammo().reserve(), MAX_COUNT);
        assert!(weapon.snapshot().encode(&mut crate::utils::buffers::PacketBuffer::default()).is_ok());
    }

    #[test]
    fn test_trail_timer_replaced() {
        let (mut weapon, mut timers, _) = armed(&rifle());
        weapon.schedule_trail_hide(&mut timers, Duration::from_millis(30));
        weapon.schedule_trail_hide(&mut timers, Duration::from_millis(30));
        assert_eq!(timers.len(), 1);

        weapon.deactivate(&mut timers);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_state_tags() {
        for state in [WeaponState::Ready, WeaponState::Empty, WeaponState::Reloading] {
            assert_eq!(WeaponState::from_u8(state.to_u8()), Some(state));
        }
        assert_eq!(WeaponState::from_u8(3), None);
    }

    #[test]
    fn test_snapshot_projection() {
        let (mut weapon, _, t0) = armed(&tuned(25, 100));
        drain(&mut weapon, t0, 3);
        let snapshot = weapon.snapshot();
        assert_eq!(snapshot.magazine, 22);
        assert_eq!(snapshot.reserve, 100);
        assert_eq!(snapshot.state, WeaponState::Ready);
    }
}
