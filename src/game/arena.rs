//! Match arena: the default wall layout and team spawn areas.

use once_cell::sync::Lazy;
use rand::Rng;

use crate::config;
use crate::game::player::Team;
use crate::systems::walls::{Material, Wall};

/// The default map, loaded once at match start. Mirrored layout so neither
/// team starts with better cover.
static DEFAULT_LAYOUT: Lazy<Vec<Wall>> = Lazy::new(|| {
    vec![
        // Forward cover near each spawn
        Wall::new(1, 100.0, 56.0, 40.0, 8.0, Material::Concrete),
        Wall::new(2, 340.0, 56.0, 40.0, 8.0, Material::Concrete),
        Wall::new(3, 100.0, 206.0, 40.0, 8.0, Material::Wood),
        Wall::new(4, 340.0, 206.0, 40.0, 8.0, Material::Wood),
        // Mid-lane pillars
        Wall::new(5, 150.0, 115.0, 8.0, 40.0, Material::Metal),
        Wall::new(6, 322.0, 115.0, 8.0, 40.0, Material::Metal),
        // Center structure: glass sightlines above and below
        Wall::new(7, 220.0, 80.0, 40.0, 8.0, Material::Glass),
        Wall::new(8, 220.0, 182.0, 40.0, 8.0, Material::Glass),
        Wall::new(9, 236.0, 115.0, 8.0, 40.0, Material::Concrete),
        // Flank cover on the long walls
        Wall::new(10, 56.0, 131.0, 40.0, 8.0, Material::Wood),
        Wall::new(11, 384.0, 131.0, 40.0, 8.0, Material::Wood),
    ]
});

pub fn create_walls() -> Vec<Wall> {
    DEFAULT_LAYOUT.clone()
}

/// Random spawn inside the team's strip of the arena.
pub fn spawn_position(team: Team) -> (f64, f64) {
    let mut rng = rand::thread_rng();
    let x = match team {
        Team::Red => rng.gen_range(20.0..44.0),
        Team::Blue => rng.gen_range(config::ARENA_WIDTH - 44.0..config::ARENA_WIDTH - 20.0),
    };
    let y = rng.gen_range(40.0..config::ARENA_HEIGHT - 40.0);
    (x, y)
}
