use std::collections::HashMap;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::{SyncError, SyncResult};
use crate::tick::replication::MAX_COUNT;

/// Static tuning for one kind of gun
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponData {
    pub id: u32,
    pub name: String,
    /// Damage applied per confirmed hit, decided on the host
    pub damage: f32,
    /// Minimum seconds between two shots
    pub fire_interval: f32,
    /// Hitscan range in world units
    pub range: f32,
    pub reload_time: f32,
    pub magazine_capacity: u32,
    /// Reserve ammo granted on spawn
    pub starting_reserve: u32,
}

impl WeaponData {
    pub fn fire_interval(&self) -> Duration {
        Duration::from_secs_f32(self.fire_interval.max(0.0))
    }

    pub fn reload_duration(&self) -> Duration {
        Duration::from_secs_f32(self.reload_time.max(0.0))
    }

    /// Check tuning a weapon can actually be built from
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.magazine_capacity == 0 {
            return Err("magazine capacity must be positive");
        }
        if self.magazine_capacity > MAX_COUNT || self.starting_reserve > MAX_COUNT {
            return Err("ammo count too large for a snapshot");
        }
        for value in [self.fire_interval, self.reload_time, self.range, self.damage] {
            if !value.is_finite() || value < 0.0 {
                return Err("timings, range and damage must be finite and non-negative");
            }
        }
        Ok(())
    }
}

/// Immutable weapon database - loaded once at startup
/// Zero contention, passed by Arc reference
#[derive(Debug, Clone)]
pub struct WeaponDb {
    weapons: HashMap<u32, WeaponData>,
}

impl WeaponDb {
    /// Built-in weapon table
    pub fn load() -> Self {
        let mut weapons = HashMap::new();

        weapons.insert(1, WeaponData {
            id: 1,
            name: "Rifle".to_string(),
            damage: 25.0,
            fire_interval: 0.12,
            range: 50.0,
            reload_time: 1.8,
            magazine_capacity: 25,
            starting_reserve: 100,
        });

        weapons.insert(2, WeaponData {
            id: 2,
            name: "Golden Friend".to_string(),
            damage: 20.0,
            fire_interval: 0.25,
            range: 100.0,
            reload_time: 1.0,
            magazine_capacity: 20,
            starting_reserve: 60,
        });

        weapons.insert(3, WeaponData {
            id: 3,
            name: "Prototype".to_string(),
            damage: 30.0,
            fire_interval: 0.5,
            range: 150.0,
            reload_time: 1.5,
            magazine_capacity: 8,
            starting_reserve: 24,
        });

        Self { weapons }
    }

    /// Parse a JSON array of weapon entries
    pub fn from_json(raw: &str) -> SyncResult<Self> {
        let entries: Vec<WeaponData> = serde_json::from_str(raw)?;
        for entry in &entries {
            entry
                .validate()
                .map_err(|reason| SyncError::InvalidWeapon { id: entry.id, reason })?;
        }
        let weapons = entries.into_iter().map(|w| (w.id, w)).collect();
        Ok(Self { weapons })
    }

    /// Get weapon by ID
    pub fn get(&self, id: u32) -> Option<&WeaponData> {
        self.weapons.get(&id)
    }

    /// Check if weapon exists
    pub fn contains(&self, id: u32) -> bool {
        self.weapons.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.weapons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weapons.is_empty()
    }

    /// Every peer spawns with the rifle
    pub fn default_weapon_id() -> u32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weapon_db_load() {
        let db = WeaponDb::load();
        assert_eq!(db.len(), 3);
    }

    #[test]
    fn test_default_weapon_matches_rifle() {
        let db = WeaponDb::load();
        let rifle = db.get(WeaponDb::default_weapon_id()).unwrap();
        assert_eq!(rifle.name, "Rifle");
        assert_eq!(rifle.magazine_capacity, 25);
        assert_eq!(rifle.starting_reserve, 100);
        assert_eq!(rifle.damage, 25.0);
        assert_eq!(rifle.range, 50.0);
        assert_eq!(rifle.fire_interval(), Duration::from_secs_f32(0.12));
        assert_eq!(rifle.reload_duration(), Duration::from_secs_f32(1.8));
    }

    #[test]
    fn test_weapon_contains() {
        let db = WeaponDb::load();
        assert!(db.contains(1));
        assert!(db.contains(3));
        assert!(!db.contains(999));
    }

    #[test]
    fn test_from_json() {
        let raw = r#"[{
            "id": 7, "name": "Test", "damage": 10.0, "fire_interval": 0.1,
            "range": 20.0, "reload_time": 0.5, "magazine_capacity": 5, "starting_reserve": 10
        }]"#;
        let db = WeaponDb::from_json(raw).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db.get(7).unwrap().magazine_capacity, 5);
    }

    #[test]
    fn test_from_json_rejects_bad_tuning() {
        let zero_capacity = r#"[{
            "id": 7, "name": "Test", "damage": 10.0, "fire_interval": 0.1,
            "range": 20.0, "reload_time": 0.5, "magazine_capacity": 0, "starting_reserve": 10
        }]"#;
        assert!(matches!(
            WeaponDb::from_json(zero_capacity),
            Err(SyncError::InvalidWeapon { id: 7, .. })
        ));

        let negative_reload = r#"[{
            "id": 8, "name": "Test", "damage": 10.0, "fire_interval": 0.1,
            "range": 20.0, "reload_time": -1.0, "magazine_capacity": 5, "starting_reserve": 10
        }]"#;
        assert!(WeaponDb::from_json(negative_reload).is_err());
    }

    #[test]
    fn test_builtin_weapons_are_valid() {
        let db = WeaponDb::load();
        for id in 1..=3 {
            assert_eq!(db.get(id).unwrap().validate(), Ok(()));
        }
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(WeaponDb::from_json("{ not json").is_err());
    }
}
