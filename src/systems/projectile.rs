//! Projectile engine: rockets, grenades, and generic bullets.
//!
//! Projectiles live in world-space and advance once per tick. Grenades
//! bounce off walls and explode on a fuse; rockets explode on their first
//! terminal collision or at the end of their range budget.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

use crate::config;
use crate::msg::events::GameEvent;
use crate::systems::walls::WallStore;
use crate::systems::weapon::{get_weapon_config, WeaponKind};

// ─── Projectile ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectileKind {
    Bullet,
    Rocket,
    Grenade,
}

static NEXT_PROJECTILE_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u32,
    pub kind: ProjectileKind,
    pub owner_id: u32,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub damage: f64,
    /// Remaining travel budget in game units.
    pub range_left: f64,
    /// 0 for projectiles that do not explode.
    pub explosion_radius: f64,
    /// Grenade charge level 1-3; 0 for other kinds.
    pub charge_level: u8,
    pub created_at: i64,
    pub alive: bool,
}

fn next_id() -> u32 {
    NEXT_PROJECTILE_ID.fetch_add(1, Ordering::Relaxed)
}

pub fn create_rocket(owner_id: u32, x: f64, y: f64, angle: f64, now: i64) -> Projectile {
    let config = get_weapon_config(WeaponKind::Rocket);
    Projectile {
        id: next_id(),
        kind: ProjectileKind::Rocket,
        owner_id,
        x,
        y,
        vx: angle.cos() * config.projectile_speed,
        vy: angle.sin() * config.projectile_speed,
        damage: config.damage,
        range_left: config.range,
        explosion_radius: config.explosion_radius,
        charge_level: 0,
        created_at: now,
        alive: true,
    }
}

/// Charge level 1-3 scales both throw speed and range budget.
pub fn create_grenade(owner_id: u32, x: f64, y: f64, angle: f64, charge_level: u8, now: i64) -> Projectile {
    let config = get_weapon_config(WeaponKind::Grenade);
    let charge = charge_level.clamp(1, 3);
    let speed =
        config::GRENADE_BASE_THROW_SPEED + (charge - 1) as f64 * config::GRENADE_CHARGE_SPEED_BONUS;
    let range = config.range * (1.0 + (charge - 1) as f64 * 0.5);
    Projectile {
        id: next_id(),
        kind: ProjectileKind::Grenade,
        owner_id,
        x,
        y,
        vx: angle.cos() * speed,
        vy: angle.sin() * speed,
        damage: config.damage,
        range_left: range,
        explosion_radius: config.explosion_radius,
        charge_level: charge,
        created_at: now,
        alive: true,
    }
}

// ─── Tick processing ─────────────────────────────────────────────────

/// Spatial data for a living player, collected before mutation.
pub struct ProjectileTarget {
    pub id: u32,
    pub x: f64,
    pub y: f64,
}

/// A non-explosive projectile struck a player directly.
#[derive(Debug, Clone)]
pub struct DirectHit {
    pub target_id: u32,
    pub owner_id: u32,
    pub damage: f64,
    pub position: (f64, f64),
}

/// An explosion scheduled by this tick, resolved by the orchestrator after
/// all projectiles have moved.
#[derive(Debug, Clone)]
pub struct PendingExplosion {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub damage: f64,
    pub source_player_id: u32,
}

#[derive(Debug, Default)]
pub struct StepOutcome {
    pub explosions: Vec<PendingExplosion>,
    pub direct_hits: Vec<DirectHit>,
}

/// Advance every live projectile by `dt` seconds: fuse checks, wall
/// collision (grenades bounce, everything else terminates), player
/// collision, range bookkeeping. Dead projectiles are dropped from the vec.
pub fn step_projectiles(
    projectiles: &mut Vec<Projectile>,
    walls: &WallStore,
    targets: &[ProjectileTarget],
    dt: f64,
    now: i64,
    events: &mut Vec<GameEvent>,
) -> StepOutcome {
    let mut outcome = StepOutcome::default();

    for proj in projectiles.iter_mut() {
        // Grenade fuse runs on creation time, wherever the grenade is
        if proj.kind == ProjectileKind::Grenade
            && now - proj.created_at >= config::GRENADE_FUSE_MS
        {
            explode(proj, &mut outcome, events);
            continue;
        }

        // Move, stopping at the first blocking wall slice
        let step_x = proj.vx * dt;
        let step_y = proj.vy * dt;
        let step_len = (step_x * step_x + step_y * step_y).sqrt();

        if step_len > 1e-12 {
            let dir_x = step_x / step_len;
            let dir_y = step_y / step_len;

            match walls.cast_projectile_ray(proj.x, proj.y, dir_x, dir_y, step_len) {
                Some(hit) => {
                    proj.range_left -= hit.t;
                    // Rest just off the struck face
                    proj.x += dir_x * hit.t + hit.nx * 0.01;
                    proj.y += dir_y * hit.t + hit.ny * 0.01;

                    if proj.kind == ProjectileKind::Grenade {
                        // Reflect the normal component, keep the tangent
                        if hit.nx != 0.0 {
                            proj.vx = -proj.vx * config::GRENADE_RESTITUTION;
                        } else {
                            proj.vy = -proj.vy * config::GRENADE_RESTITUTION;
                        }
                        events.push(GameEvent::ProjectileUpdated {
                            id: proj.id,
                            position: (proj.x, proj.y),
                            velocity: (proj.vx, proj.vy),
                        });
                    } else {
                        explode(proj, &mut outcome, events);
                        continue;
                    }
                }
                None => {
                    proj.x += step_x;
                    proj.y += step_y;
                    proj.range_left -= step_len;
                }
            }
        }

        // Player collision — grenades roll right past players
        if proj.kind != ProjectileKind::Grenade {
            let hit_target = targets.iter().find(|t| {
                t.id != proj.owner_id
                    && (t.x - proj.x).powi(2) + (t.y - proj.y).powi(2)
                        <= config::PLAYER_SIZE * config::PLAYER_SIZE
            });
            if let Some(target) = hit_target {
                if proj.explosion_radius > 0.0 {
                    explode(proj, &mut outcome, events);
                } else {
                    outcome.direct_hits.push(DirectHit {
                        target_id: target.id,
                        owner_id: proj.owner_id,
                        damage: proj.damage,
                        position: (proj.x, proj.y),
                    });
                    proj.alive = false;
                }
                continue;
            }
        }

        // Range budget
        if proj.range_left <= 0.0 {
            match proj.kind {
                // Grenades come to rest and wait out their fuse
                ProjectileKind::Grenade => {
                    proj.vx = 0.0;
                    proj.vy = 0.0;
                    proj.range_left = 0.0;
                }
                ProjectileKind::Rocket => explode(proj, &mut outcome, events),
                ProjectileKind::Bullet => proj.alive = false,
            }
        }
    }

    projectiles.retain(|p| p.alive);
    outcome
}

fn explode(proj: &mut Projectile, outcome: &mut StepOutcome, events: &mut Vec<GameEvent>) {
    proj.alive = false;
    if proj.explosion_radius <= 0.0 {
        return;
    }
    events.push(GameEvent::ProjectileExploded {
        id: proj.id,
        position: (proj.x, proj.y),
        radius: proj.explosion_radius,
    });
    outcome.explosions.push(PendingExplosion {
        x: proj.x,
        y: proj.y,
        radius: proj.explosion_radius,
        damage: proj.damage,
        source_player_id: proj.owner_id,
    });
}

// ─── Explosion resolution ────────────────────────────────────────────

/// Players caught in the blast with a clear line of sight to its center.
/// Returns `(player_id, damage)` pairs; damage falls off linearly to zero
/// at the blast radius.
pub fn explosion_player_hits(
    x: f64,
    y: f64,
    radius: f64,
    damage: f64,
    walls: &WallStore,
    targets: &[ProjectileTarget],
) -> Vec<(u32, f64)> {
    let mut hits = Vec::new();
    for target in targets {
        let d = ((target.x - x).powi(2) + (target.y - y).powi(2)).sqrt();
        if d > radius {
            continue;
        }
        // Intact cover shadows the blast
        if walls.segment_blocked(x, y, target.x, target.y) {
            continue;
        }
        hits.push((target.id, damage * (1.0 - d / radius)));
    }
    hits
}

/// Splash damage to every wall slice whose extent intersects the blast
/// disk, falling off with the distance to the nearest point of the slice.
pub fn explosion_wall_damage(
    x: f64,
    y: f64,
    radius: f64,
    damage: f64,
    walls: &mut WallStore,
    events: &mut Vec<GameEvent>,
) {
    // Collect first; damage application needs the store mutably
    let mut pending: Vec<(u32, usize, f64)> = Vec::new();
    for wall in walls.iter() {
        for slice in 0..config::WALL_SLICES {
            if wall.slice_destroyed(slice) {
                continue;
            }
            let rect = wall.slice_rect(slice);
            let nearest_x = x.clamp(rect.x, rect.x + rect.w);
            let nearest_y = y.clamp(rect.y, rect.y + rect.h);
            let d = ((nearest_x - x).powi(2) + (nearest_y - y).powi(2)).sqrt();
            if d <= radius {
                pending.push((wall.id, slice, damage * (1.0 - d / radius)));
            }
        }
    }
    for (wall_id, slice, slice_damage) in pending {
        walls.damage_slice(wall_id, slice, slice_damage, events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::walls::{Material, Wall};

    const DT: f64 = 1.0 / 60.0;

    fn no_walls() -> WallStore {
        WallStore::new(vec![])
    }

    fn wall_at_120() -> WallStore {
        // Vertical wall: x in [120, 128], y in [80, 120]
        WallStore::new(vec![Wall::new(1, 120.0, 80.0, 8.0, 40.0, Material::Concrete)])
    }

    // ── 1. Creation ─────────────────────────────────────────────────────

    #[test]
    fn rocket_velocity_matches_config_speed() {
        let rocket = create_rocket(1, 0.0, 0.0, 0.0, 0);
        let config = get_weapon_config(WeaponKind::Rocket);
        let speed = (rocket.vx * rocket.vx + rocket.vy * rocket.vy).sqrt();
        assert!((speed - config.projectile_speed).abs() < 1e-9);
        assert_eq!(rocket.range_left, config.range);
        assert_eq!(rocket.explosion_radius, config.explosion_radius);
    }

    #[test]
    fn grenade_charge_scales_speed_and_range() {
        let config = get_weapon_config(WeaponKind::Grenade);

        let g1 = create_grenade(1, 0.0, 0.0, 0.0, 1, 0);
        assert!((g1.vx - config::GRENADE_BASE_THROW_SPEED).abs() < 1e-9);
        assert_eq!(g1.range_left, config.range);

        let g3 = create_grenade(1, 0.0, 0.0, 0.0, 3, 0);
        let expected =
            config::GRENADE_BASE_THROW_SPEED + 2.0 * config::GRENADE_CHARGE_SPEED_BONUS;
        assert!((g3.vx - expected).abs() < 1e-9);
        assert_eq!(g3.range_left, config.range * 2.0);
    }

    // ── 2. Wall interaction ─────────────────────────────────────────────

    #[test]
    fn grenade_bounces_with_restitution() {
        let walls = wall_at_120();
        let mut grenade = create_grenade(1, 118.0, 100.0, 0.0, 1, 0);
        let vx_in = grenade.vx;
        let mut projectiles = vec![grenade.clone()];
        let mut events = Vec::new();

        // Enough ticks to cover the 2 units to the wall
        for _ in 0..3 {
            step_projectiles(&mut projectiles, &walls, &[], DT, 0, &mut events);
        }
        grenade = projectiles[0].clone();

        assert!(grenade.alive);
        assert!(grenade.vx < 0.0, "normal component should reverse");
        assert!((grenade.vx + vx_in * config::GRENADE_RESTITUTION).abs() < 1e-9);
        assert_eq!(grenade.vy, 0.0);
        assert!(grenade.x <= 120.0);
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::ProjectileUpdated { .. })));
    }

    #[test]
    fn rocket_explodes_on_wall_impact() {
        let walls = wall_at_120();
        let mut projectiles = vec![create_rocket(1, 118.0, 100.0, 0.0, 0)];
        let mut events = Vec::new();

        let mut explosions = Vec::new();
        for _ in 0..5 {
            let outcome = step_projectiles(&mut projectiles, &walls, &[], DT, 0, &mut events);
            explosions.extend(outcome.explosions);
        }

        assert!(projectiles.is_empty());
        assert_eq!(explosions.len(), 1);
        assert!((explosions[0].x - 120.0).abs() < 0.1);
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::ProjectileExploded { .. })));
    }

    // ── 3. Player interaction ───────────────────────────────────────────

    #[test]
    fn rocket_detonates_on_player_contact() {
        let walls = no_walls();
        let targets = [ProjectileTarget { id: 2, x: 10.0, y: 0.0 }];
        let mut projectiles = vec![create_rocket(1, 0.0, 0.0, 0.0, 0)];
        let mut events = Vec::new();

        let mut explosions = Vec::new();
        for _ in 0..10 {
            let outcome = step_projectiles(&mut projectiles, &walls, &targets, DT, 0, &mut events);
            explosions.extend(outcome.explosions);
        }
        assert_eq!(explosions.len(), 1);
        assert!(projectiles.is_empty());
    }

    #[test]
    fn projectile_never_hits_its_owner() {
        let walls = no_walls();
        let targets = [ProjectileTarget { id: 1, x: 1.0, y: 0.0 }];
        let mut projectiles = vec![create_rocket(1, 0.0, 0.0, 0.0, 0)];
        let mut events = Vec::new();

        let outcome = step_projectiles(&mut projectiles, &walls, &targets, DT, 0, &mut events);
        assert!(outcome.explosions.is_empty());
        assert_eq!(projectiles.len(), 1);
    }

    #[test]
    fn grenade_rolls_past_players() {
        let walls = no_walls();
        let targets = [ProjectileTarget { id: 2, x: 4.0, y: 0.0 }];
        let mut projectiles = vec![create_grenade(1, 0.0, 0.0, 0.0, 1, 0)];
        let mut events = Vec::new();

        for _ in 0..10 {
            let outcome = step_projectiles(&mut projectiles, &walls, &targets, DT, 0, &mut events);
            assert!(outcome.explosions.is_empty());
            assert!(outcome.direct_hits.is_empty());
        }
        assert_eq!(projectiles.len(), 1);
    }

    #[test]
    fn bullet_damages_player_directly() {
        let walls = no_walls();
        let targets = [ProjectileTarget { id: 2, x: 10.0, y: 0.0 }];
        let mut projectiles = vec![Projectile {
            id: next_id(),
            kind: ProjectileKind::Bullet,
            owner_id: 1,
            x: 0.0,
            y: 0.0,
            vx: 600.0,
            vy: 0.0,
            damage: 12.0,
            range_left: 100.0,
            explosion_radius: 0.0,
            charge_level: 0,
            created_at: 0,
            alive: true,
        }];
        let mut events = Vec::new();

        let outcome = step_projectiles(&mut projectiles, &walls, &targets, DT, 0, &mut events);
        assert_eq!(outcome.direct_hits.len(), 1);
        assert_eq!(outcome.direct_hits[0].target_id, 2);
        assert_eq!(outcome.direct_hits[0].damage, 12.0);
        assert!(projectiles.is_empty());
    }

    // ── 4. Fuse and range ───────────────────────────────────────────────

    #[test]
    fn grenade_explodes_when_fuse_elapses() {
        let walls = no_walls();
        let mut projectiles = vec![create_grenade(1, 0.0, 0.0, 0.0, 1, 1_000)];
        let mut events = Vec::new();

        let before = step_projectiles(
            &mut projectiles,
            &walls,
            &[],
            DT,
            1_000 + config::GRENADE_FUSE_MS - 1,
            &mut events,
        );
        assert!(before.explosions.is_empty());

        let after = step_projectiles(
            &mut projectiles,
            &walls,
            &[],
            DT,
            1_000 + config::GRENADE_FUSE_MS,
            &mut events,
        );
        assert_eq!(after.explosions.len(), 1);
        assert!(projectiles.is_empty());
    }

    #[test]
    fn grenade_stops_when_range_budget_runs_out() {
        let walls = no_walls();
        let mut grenade = create_grenade(1, 0.0, 0.0, 0.0, 1, 0);
        grenade.range_left = 1.0;
        let mut projectiles = vec![grenade];
        let mut events = Vec::new();

        let outcome = step_projectiles(&mut projectiles, &walls, &[], DT, 0, &mut events);
        assert!(outcome.explosions.is_empty());
        assert_eq!(projectiles.len(), 1);
        assert_eq!(projectiles[0].vx, 0.0);
    }

    #[test]
    fn rocket_explodes_at_end_of_range() {
        let walls = no_walls();
        let mut rocket = create_rocket(1, 0.0, 0.0, 0.0, 0);
        rocket.range_left = 1.0;
        let mut projectiles = vec![rocket];
        let mut events = Vec::new();

        let outcome = step_projectiles(&mut projectiles, &walls, &[], DT, 0, &mut events);
        assert_eq!(outcome.explosions.len(), 1);
        assert!(projectiles.is_empty());
    }

    // ── 5. Explosion resolution ─────────────────────────────────────────

    #[test]
    fn explosion_damage_falls_off_linearly() {
        let walls = no_walls();
        let targets = [
            ProjectileTarget { id: 2, x: 0.0, y: 0.0 },
            ProjectileTarget { id: 3, x: 20.0, y: 0.0 },
            ProjectileTarget { id: 4, x: 100.0, y: 0.0 },
        ];
        let hits = explosion_player_hits(0.0, 0.0, 40.0, 80.0, &walls, &targets);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], (2, 80.0));
        assert_eq!(hits[1], (3, 40.0)); // half radius -> half damage
    }

    #[test]
    fn intact_cover_blocks_explosion() {
        let walls = wall_at_120();
        // Explosion left of the wall, target right behind it
        let targets = [ProjectileTarget { id: 2, x: 131.0, y: 100.0 }];
        let hits = explosion_player_hits(115.0, 100.0, 40.0, 80.0, &walls, &targets);
        assert!(hits.is_empty());
    }

    #[test]
    fn explosion_splashes_nearby_wall_slices() {
        let mut walls = wall_at_120();
        let mut events = Vec::new();
        // Centered on the wall's middle slice; radius covers some neighbours
        explosion_wall_damage(124.0, 100.0, 15.0, 60.0, &mut walls, &mut events);

        let wall = walls.get(1).unwrap();
        // Middle slice (y 96..104) contains the blast center: full damage
        assert!(wall.slice_health[2] < config::WALL_MAX_HEALTH);
        // End slice (y 80..88): nearest point is y=88, distance 12 < 15
        assert!(wall.slice_health[0] < config::WALL_MAX_HEALTH);
        assert!(wall.slice_health[2] < wall.slice_health[0]);
        assert!(!events.is_empty());
    }
}
