use std::sync::{Arc, Mutex};
use crate::types::{PeerId, Vec3, WeaponId};

/// Cosmetic outputs. Pure triggers: no return value, no failure visible here.
pub trait EffectSink: Send + Sync {
    fn muzzle_flash(&mut self, weapon: WeaponId);
    fn shell_eject(&mut self, weapon: WeaponId);
    fn shot_sound(&mut self, weapon: WeaponId);
    fn reload_sound(&mut self, weapon: WeaponId);
    fn show_trail(&mut self, weapon: WeaponId, from: Vec3, to: Vec3);
    fn hide_trail(&mut self, weapon: WeaponId);
}

/// Full shot sequence played when a hit effect notification arrives
pub fn play_shot(sink: &mut dyn EffectSink, weapon: WeaponId, muzzle: Vec3, hit_point: Vec3) {
    sink.muzzle_flash(weapon);
    sink.shell_eject(weapon);
    sink.shot_sound(weapon);
    sink.show_trail(weapon, muzzle, hit_point);
}

/// Headless sink that only writes debug logs
pub struct LogEffects {
    peer: PeerId,
}

impl LogEffects {
    pub fn new(peer: PeerId) -> Self {
        Self { peer }
    }
}

impl EffectSink for LogEffects {
    fn muzzle_flash(&mut self, weapon: WeaponId) {
        log::trace!("[{}] muzzle flash on {}", self.peer, weapon);
    }

    fn shell_eject(&mut self, weapon: WeaponId) {
        log::trace!("[{}] shell eject on {}", self.peer, weapon);
    }

    fn shot_sound(&mut self, weapon: WeaponId) {
        log::trace!("[{}] shot sound on {}", self.peer, weapon);
    }

    fn reload_sound(&mut self, weapon: WeaponId) {
        log::debug!("[{}] reload sound on {}", self.peer, weapon);
    }

    fn show_trail(&mut self, weapon: WeaponId, from: Vec3, to: Vec3) {
        log::debug!("[{}] trail for {} from {:?} to {:?}", self.peer, weapon, from, to);
    }

    fn hide_trail(&mut self, weapon: WeaponId) {
        log::trace!("[{}] trail hidden for {}", self.peer, weapon);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    MuzzleFlash(WeaponId),
    ShellEject(WeaponId),
    ShotSound(WeaponId),
    ReloadSound(WeaponId),
    ShowTrail { weapon: WeaponId, from: Vec3, to: Vec3 },
    HideTrail(WeaponId),
}

/// Sink that records every trigger. Clones share the same log, so a test can
/// keep one handle while the peer owns the other.
#[derive(Debug, Clone, Default)]
pub struct EffectRecorder {
    log: Arc<Mutex<Vec<Effect>>>,
}

impl EffectRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effects(&self) -> Vec<Effect> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Hit points of every trail shown so far
    pub fn trail_ends(&self) -> Vec<Vec3> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::ShowTrail { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }

    fn push(&self, effect: Effect) {
        if let Ok(mut log) = self.log.lock() {
            log.push(effect);
        }
    }
}

impl EffectSink for EffectRecorder {
    fn muzzle_flash(&mut self, weapon: WeaponId) {
        self.push(Effect::MuzzleFlash(weapon));
    }

    fn shell_eject(&mut self, weapon: WeaponId) {
        self.push(Effect::ShellEject(weapon));
    }

    fn shot_sound(&mut self, weapon: WeaponId) {
        self.push(Effect::ShotSound(weapon));
    }

    fn reload_sound(&mut self, weapon: WeaponId) {
        self.push(Effect::ReloadSound(weapon));
    }

    fn show_trail(&mut self, weapon: WeaponId, from: Vec3, to: Vec3) {
        self.push(Effect::ShowTrail { weapon, from, to });
    }

    fn hide_trail(&mut self, weapon: WeaponId) {
        self.push(Effect::HideTrail(weapon));
    }
}
