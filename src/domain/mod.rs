pub mod effects;
pub mod hit_resolver;
pub mod items;
pub mod weapon;
pub mod world;
