use crate::domain::world::{CombatWorld, TargetHandle};
use crate::handlers::bus::Dispatcher;
use crate::handlers::protocol::{FireRequest, RemoteCall, Target};
use crate::state::session::SessionRoles;
use crate::types::{PeerId, Vec3, WeaponId};

/// Where a resolved shot ended up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitOutcome {
    pub hit_point: Vec3,
    /// Zero when the shot hit nothing
    pub hit_normal: Vec3,
    pub target: Option<TargetHandle>,
}

/// Decides hits. Only does anything on the session's authoritative host, and
/// never touches ammo: that bookkeeping stays with the shooter.
#[derive(Debug, Clone, Copy)]
pub struct HitResolver {
    local: PeerId,
    roles: SessionRoles,
}

impl HitResolver {
    pub fn new(local: PeerId, roles: SessionRoles) -> Self {
        Self { local, roles }
    }

    pub fn is_authoritative(&self) -> bool {
        self.roles.is_host(self.local)
    }

    /// Cast, apply damage, and broadcast the hit effect to every peer.
    /// Returns None when the request was ignored.
    pub fn resolve(
        &self,
        weapon: WeaponId,
        request: &FireRequest,
        damage: f32,
        world: &mut dyn CombatWorld,
        out: &mut dyn Dispatcher,
    ) -> Option<HitOutcome> {
        if !self.is_authoritative() {
            log::warn!(
                "{} is not the host ({}); ignoring fire request for {} from {}",
                self.local,
                self.roles.host(),
                weapon,
                request.requester
            );
            return None;
        }

        let direction = request.direction.normalize_or_zero();
        if direction == Vec3::ZERO
            || !request.origin.is_finite()
            || !request.max_range.is_finite()
            || request.max_range < 0.0
        {
            log::debug!("Malformed fire request for {} from {}: {:?}", weapon, request.requester, request);
            return None;
        }

        let outcome = match world.cast(request.origin, direction, request.max_range) {
            Some(hit) => {
                if let Some(handle) = hit.target {
                    if let Some(target) = world.damageable(handle) {
                        target.on_damage(damage, hit.point, hit.normal);
                    }
                }
                HitOutcome {
                    hit_point: hit.point,
                    hit_normal: hit.normal,
                    target: hit.target,
                }
            }
            None => HitOutcome {
                hit_point: request.origin + direction * request.max_range,
                hit_normal: Vec3::ZERO,
                target: None,
            },
        };

        log::debug!(
            "{} fired by {}: hit {:?} target {:?}",
            weapon,
            request.requester,
            outcome.hit_point,
            outcome.target
        );

        out.dispatch(Target::All, RemoteCall::NotifyHitEffect {
            weapon,
            hit_point: outcome.hit_point,
        });
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::world::Arena;
    use crate::handlers::bus::Outbox;

    const HOST: PeerId = PeerId(1);
    const GUEST: PeerId = PeerId(2);

    fn request(direction: Vec3) -> FireRequest {
        FireRequest {
            origin: Vec3::new(0.0, 1.0, 0.0),
            direction,
            max_range: 50.0,
            requester: GUEST,
        }
    }

    fn range_with_dummy() -> (Arena, TargetHandle) {
        let mut arena = Arena::new();
        let dummy = arena.add_dummy(Vec3::new(0.0, 1.0, 10.0), 0.5, 100.0);
        (arena, dummy)
    }

    #[test]
    fn test_hit_damages_target_and_broadcasts() {
        let resolver = HitResolver::new(HOST, SessionRoles::new(HOST));
        let (mut arena, dummy) = range_with_dummy();
        let mut out = Outbox::default();

        let outcome = resolver
            .resolve(WeaponId(2), &request(Vec3::Z), 25.0, &mut arena, &mut out)
            .unwrap();

        assert_eq!(outcome.hit_point, Vec3::new(0.0, 1.0, 9.5));
        assert_eq!(outcome.hit_normal, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(outcome.target, Some(dummy));

        let target = arena.dummy(dummy).unwrap();
        assert_eq!(target.health, 75.0);
        assert_eq!(target.last_hit, Some((outcome.hit_point, outcome.hit_normal)));

        let sent = out.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Target::All);
        assert_eq!(sent[0].1, RemoteCall::NotifyHitEffect {
            weapon: WeaponId(2),
            hit_point: outcome.hit_point,
        });
    }

    #[test]
    fn test_scenario_d_miss_uses_max_range() {
        let resolver = HitResolver::new(HOST, SessionRoles::new(HOST));
        let (mut arena, dummy) = range_with_dummy();
        let mut out = Outbox::default();

        let outcome = resolver
            .resolve(WeaponId(2), &request(Vec3::X), 25.0, &mut arena, &mut out)
            .unwrap();

        assert_eq!(outcome.hit_point, Vec3::new(50.0, 1.0, 0.0));
        assert_eq!(outcome.hit_normal, Vec3::ZERO);
        assert_eq!(outcome.target, None);
        assert_eq!(arena.dummy(dummy).unwrap().hits, 0);
        assert_eq!(out.drain(), vec![(
            Target::All,
            RemoteCall::NotifyHitEffect { weapon: WeaponId(2), hit_point: Vec3::new(50.0, 1.0, 0.0) },
        )]);
    }

    #[test]
    fn test_wall_hit_without_target() {
        let resolver = HitResolver::new(HOST, SessionRoles::new(HOST));
        let mut arena = Arena::new();
        arena.add_wall(Vec3::new(0.0, 1.0, 5.0), 1.0);
        let mut out = Outbox::default();

        let outcome = resolver
            .resolve(WeaponId(1), &request(Vec3::Z), 25.0, &mut arena, &mut out)
            .unwrap();
        assert_eq!(outcome.hit_point, Vec3::new(0.0, 1.0, 4.0));
        assert_eq!(outcome.target, None);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_non_host_does_nothing() {
        let resolver = HitResolver::new(GUEST, SessionRoles::new(HOST));
        assert!(!resolver.is_authoritative());
        let (mut arena, dummy) = range_with_dummy();
        let mut out = Outbox::default();

        let outcome = resolver.resolve(WeaponId(2), &request(Vec3::Z), 25.0, &mut arena, &mut out);
        assert!(outcome.is_none());
        assert_eq!(arena.dummy(dummy).unwrap().hits, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_zero_direction_is_dropped() {
        let resolver = HitResolver::new(HOST, SessionRoles::new(HOST));
        let (mut arena, _) = range_with_dummy();
        let mut out = Outbox::default();
        assert!(resolver
            .resolve(WeaponId(2), &request(Vec3::ZERO), 25.0, &mut arena, &mut out)
            .is_none());
        assert!(out.is_empty());
    }
}
