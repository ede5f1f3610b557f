//! Collaborator seams for hit resolution, plus a small sphere-based arena
//! that implements them for the demo session and tests.

use std::collections::HashMap;
use crate::types::Vec3;

/// Opaque reference to something that can take damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub target: Option<TargetHandle>,
}

pub trait RayCaster {
    /// Nearest obstruction along the ray within `max_range`
    fn cast(&self, origin: Vec3, direction: Vec3, max_range: f32) -> Option<RayHit>;
}

/// The one capability the combat core needs from a target
pub trait Damageable {
    fn on_damage(&mut self, amount: f32, point: Vec3, normal: Vec3);
}

/// Everything the host needs to resolve a shot
pub trait CombatWorld: RayCaster + Send + Sync {
    fn damageable(&mut self, handle: TargetHandle) -> Option<&mut dyn Damageable>;

    /// Remaining health, for worlds that track it
    fn target_health(&self, _handle: TargetHandle) -> Option<f32> {
        None
    }
}

/// Training target
#[derive(Debug, Clone)]
pub struct Dummy {
    pub health: f32,
    pub max_health: f32,
    pub dead: bool,
    pub hits: u32,
    pub last_hit: Option<(Vec3, Vec3)>,
}

impl Dummy {
    pub fn new(max_health: f32) -> Self {
        Self {
            health: max_health,
            max_health,
            dead: false,
            hits: 0,
            last_hit: None,
        }
    }
}

impl Damageable for Dummy {
    fn on_damage(&mut self, amount: f32, point: Vec3, normal: Vec3) {
        self.hits += 1;
        self.last_hit = Some((point, normal));
        if self.dead {
            return;
        }
        self.health = (self.health - amount).max(0.0);
        if self.health <= 0.0 {
            self.dead = true;
            log::info!("Dummy destroyed at {:?}", point);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sphere {
    center: Vec3,
    radius: f32,
    target: Option<TargetHandle>,
}

impl Sphere {
    /// Distance along a unit ray to the first surface crossing
    fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let oc = origin - self.center;
        let b = oc.dot(direction);
        let c = oc.length_squared() - self.radius * self.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let root = disc.sqrt();
        let near = -b - root;
        if near >= 0.0 {
            return Some(near);
        }
        let far = -b + root;
        (far >= 0.0).then_some(far)
    }
}

/// Static scene of spheres, some of which are dummies
#[derive(Debug, Clone, Default)]
pub struct Arena {
    obstacles: Vec<Sphere>,
    dummies: HashMap<TargetHandle, Dummy>,
    next_handle: u32,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// A row of dummies down the +Z lane, one per shooter slot, with open
    /// lanes past the last one.
    pub fn shooting_range(dummies: u32) -> Self {
        let mut arena = Self::new();
        for lane in 0..dummies {
            arena.add_dummy(Vec3::new(lane as f32 * 2.0, 1.0, 10.0), 0.5, 100.0);
        }
        arena.add_wall(Vec3::new(-20.0, 1.0, 20.0), 4.0);
        arena
    }

    pub fn add_wall(&mut self, center: Vec3, radius: f32) {
        self.obstacles.push(Sphere { center, radius, target: None });
    }

    pub fn add_dummy(&mut self, center: Vec3, radius: f32, health: f32) -> TargetHandle {
        self.next_handle += 1;
        let handle = TargetHandle(self.next_handle);
        self.obstacles.push(Sphere { center, radius, target: Some(handle) });
        self.dummies.insert(handle, Dummy::new(health));
        handle
    }

    pub fn dummy(&self, handle: TargetHandle) -> Option<&Dummy> {
        self.dummies.get(&handle)
    }

    pub fn dummies(&self) -> impl Iterator<Item = (&TargetHandle, &Dummy)> {
        self.dummies.iter()
    }
}

impl RayCaster for Arena {
    fn cast(&self, origin: Vec3, direction: Vec3, max_range: f32) -> Option<RayHit> {
        self.obstacles
            .iter()
            .filter_map(|sphere| sphere.intersect(origin, direction).map(|t| (t, sphere)))
            .filter(|(t, _)| *t <= max_range)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(t, sphere)| {
                let point = origin + direction * t;
                RayHit {
                    point,
                    normal: (point - sphere.center).normalize_or_zero(),
                    target: sphere.target,
                }
            })
    }
}

impl CombatWorld for Arena {
    fn damageable(&mut self, handle: TargetHandle) -> Option<&mut dyn Damageable> {
        self.dummies.get_mut(&handle).map(|d| d as &mut dyn Damageable)
    }

    fn target_health(&self, handle: TargetHandle) -> Option<f32> {
        self.dummies.get(&handle).map(|d| d.health)
    }
}
