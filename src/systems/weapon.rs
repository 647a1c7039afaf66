//! Weapon definitions, per-player weapon state, and hitscan resolution.
//!
//! The registry is a static table loaded once; per-player state tracks ammo
//! and the reload/fire clocks. Reload completion is observed by the game
//! loop polling `reload_end` at tick boundaries.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::game::player::MovementMode;
use crate::systems::walls::WallStore;

// ─── Weapon kinds ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaponKind {
    Rifle = 0,
    Pistol = 1,
    Grenade = 2,
    Rocket = 3,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; 4] = [Self::Rifle, Self::Pistol, Self::Grenade, Self::Rocket];

    /// Keyboard slot 1-4 -> weapon.
    pub fn from_slot(slot: u8) -> Option<Self> {
        match slot {
            1 => Some(Self::Rifle),
            2 => Some(Self::Pistol),
            3 => Some(Self::Grenade),
            4 => Some(Self::Rocket),
            _ => None,
        }
    }
}

// ─── Registry ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WeaponConfig {
    pub kind: WeaponKind,
    pub name: &'static str,
    /// Instantaneous ray resolution; false means the weapon spawns a projectile.
    pub hitscan: bool,
    /// Damage at point blank.
    pub damage: f64,
    /// Damage at maximum range. Equal to `damage` for weapons without falloff.
    pub min_damage: f64,
    /// Maximum range in game units.
    pub range: f64,
    pub magazine: u32,
    pub reserve: u32,
    /// Rounds per minute.
    pub rpm: f64,
    pub reload_ms: i64,
    /// Base spread half-angle in radians.
    pub spread: f64,
    /// Projectile travel speed (grenades compute theirs from charge level).
    pub projectile_speed: f64,
    /// 0 for weapons that do not explode.
    pub explosion_radius: f64,
}

pub static WEAPON_CONFIGS: [WeaponConfig; 4] = [
    WeaponConfig {
        kind: WeaponKind::Rifle,
        name: "Rifle",
        hitscan: true,
        damage: 25.0,
        min_damage: 10.0,
        range: 250.0,
        magazine: 30,
        reserve: 90,
        rpm: 600.0,
        reload_ms: 2_500,
        spread: 0.030,
        projectile_speed: 0.0,
        explosion_radius: 0.0,
    },
    WeaponConfig {
        kind: WeaponKind::Pistol,
        name: "Pistol",
        hitscan: true,
        damage: 20.0,
        min_damage: 20.0,
        range: 150.0,
        magazine: 12,
        reserve: 48,
        rpm: 300.0,
        reload_ms: 1_500,
        spread: 0.020,
        projectile_speed: 0.0,
        explosion_radius: 0.0,
    },
    WeaponConfig {
        kind: WeaponKind::Grenade,
        name: "Grenade",
        hitscan: false,
        damage: 75.0,
        min_damage: 75.0,
        range: 120.0,
        magazine: 3,
        reserve: 6,
        rpm: 40.0,
        reload_ms: 2_000,
        spread: 0.0,
        projectile_speed: 0.0,
        explosion_radius: 40.0,
    },
    WeaponConfig {
        kind: WeaponKind::Rocket,
        name: "Rocket",
        hitscan: false,
        damage: 100.0,
        min_damage: 100.0,
        range: 400.0,
        magazine: 1,
        reserve: 3,
        rpm: 30.0,
        reload_ms: 3_000,
        spread: 0.010,
        projectile_speed: 200.0,
        explosion_radius: 50.0,
    },
];

pub fn get_weapon_config(kind: WeaponKind) -> &'static WeaponConfig {
    &WEAPON_CONFIGS[kind as usize]
}

// ─── Per-player weapon state ─────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WeaponState {
    pub kind: WeaponKind,
    pub config: &'static WeaponConfig,
    pub current_ammo: u32,
    pub reserve_ammo: u32,
    pub is_reloading: bool,
    /// Millisecond timestamp at which the pending reload completes.
    pub reload_end: i64,
    /// Millisecond timestamp of the last accepted shot.
    pub last_fire: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireError {
    Reloading,
    Empty,
    Cooldown,
}

impl std::fmt::Display for FireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reloading => write!(f, "weapon is reloading"),
            Self::Empty => write!(f, "magazine is empty"),
            Self::Cooldown => write!(f, "weapon on cooldown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadError {
    AlreadyReloading,
    MagazineFull,
    NoReserve,
}

impl std::fmt::Display for ReloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyReloading => write!(f, "already reloading"),
            Self::MagazineFull => write!(f, "magazine is full"),
            Self::NoReserve => write!(f, "no reserve ammo"),
        }
    }
}

impl WeaponState {
    pub fn new(kind: WeaponKind) -> Self {
        let config = get_weapon_config(kind);
        Self {
            kind,
            config,
            current_ammo: config.magazine,
            reserve_ammo: config.reserve,
            is_reloading: false,
            reload_end: 0,
            last_fire: 0,
        }
    }

    /// Milliseconds between shots at the configured RPM.
    pub fn fire_interval_ms(&self) -> f64 {
        60_000.0 / self.config.rpm
    }

    /// Liveness is the caller's check; this validates the weapon clocks only.
    pub fn can_fire(&self, now: i64) -> Result<(), FireError> {
        if self.is_reloading {
            return Err(FireError::Reloading);
        }
        if self.current_ammo == 0 {
            return Err(FireError::Empty);
        }
        if ((now - self.last_fire) as f64) < self.fire_interval_ms() {
            return Err(FireError::Cooldown);
        }
        Ok(())
    }

    /// Validate and consume one round.
    pub fn try_fire(&mut self, now: i64) -> Result<(), FireError> {
        self.can_fire(now)?;
        self.current_ammo -= 1;
        self.last_fire = now;
        Ok(())
    }

    /// Start a reload; completion is polled at tick boundaries.
    /// Returns the completion timestamp.
    pub fn begin_reload(&mut self, now: i64) -> Result<i64, ReloadError> {
        if self.is_reloading {
            return Err(ReloadError::AlreadyReloading);
        }
        if self.current_ammo >= self.config.magazine {
            return Err(ReloadError::MagazineFull);
        }
        if self.reserve_ammo == 0 {
            return Err(ReloadError::NoReserve);
        }
        self.is_reloading = true;
        self.reload_end = now + self.config.reload_ms;
        Ok(self.reload_end)
    }

    pub fn reload_due(&self, now: i64) -> bool {
        self.is_reloading && self.reload_end <= now
    }

    /// Complete the pending reload atomically: transfer up to a full
    /// magazine from reserve. Returns (magazine, reserve) after transfer.
    pub fn finish_reload(&mut self) -> (u32, u32) {
        let transfer = (self.config.magazine - self.current_ammo).min(self.reserve_ammo);
        self.current_ammo += transfer;
        self.reserve_ammo -= transfer;
        self.is_reloading = false;
        self.reload_end = 0;
        (self.current_ammo, self.reserve_ammo)
    }

    /// Abort a pending reload without consuming reserve (weapon switch).
    pub fn cancel_reload(&mut self) {
        self.is_reloading = false;
        self.reload_end = 0;
    }
}

// ─── Damage falloff ──────────────────────────────────────────────────

/// Linear interpolation from full damage at the muzzle down to `min_damage`
/// at maximum range; constant when no falloff is configured.
pub fn falloff_damage(config: &WeaponConfig, distance: f64) -> f64 {
    if config.min_damage >= config.damage {
        return config.damage;
    }
    let t = (distance / config.range).clamp(0.0, 1.0);
    config.damage + (config.min_damage - config.damage) * t
}

// ─── Spread ──────────────────────────────────────────────────────────

/// Spread half-angle after stance modifiers.
pub fn effective_spread(base: f64, mode: MovementMode, is_ads: bool) -> f64 {
    let stance = match mode {
        MovementMode::Running => 1.6,
        MovementMode::Sneaking => 0.7,
        MovementMode::Idle | MovementMode::Walking => 1.0,
    };
    let ads = if is_ads { 0.4 } else { 1.0 };
    base * stance * ads
}

/// Perturb an aim angle by a uniform random offset within ±spread.
pub fn apply_spread(angle: f64, spread: f64) -> f64 {
    if spread <= 0.0 {
        return angle;
    }
    let mut rng = rand::thread_rng();
    angle + rng.gen_range(-spread..spread)
}

// ─── Hitscan resolution ──────────────────────────────────────────────

/// A living player eligible to be hit (the shooter is excluded by the caller).
pub struct HitscanTarget {
    pub id: u32,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone)]
pub enum HitscanOutcome {
    Player {
        id: u32,
        point: (f64, f64),
        distance: f64,
    },
    Wall {
        wall_id: u32,
        slice: usize,
        point: (f64, f64),
        distance: f64,
    },
    Miss {
        end: (f64, f64),
    },
}

/// Cast a hitscan ray and return the closest blocking hit.
///
/// Wall slices block while they have health, regardless of whether they are
/// see-through; destroyed slices are passed through, so a ray can stop on
/// the far side of a partially destroyed wall.
pub fn resolve_hitscan(
    ox: f64,
    oy: f64,
    angle: f64,
    range: f64,
    walls: &WallStore,
    targets: &[HitscanTarget],
) -> HitscanOutcome {
    let dx = angle.cos();
    let dy = angle.sin();

    let wall_hit = walls.cast_projectile_ray(ox, oy, dx, dy, range);

    let mut player_hit: Option<(u32, f64)> = None;
    for target in targets {
        if let Some(t) = ray_circle(ox, oy, dx, dy, target.x, target.y, config::PLAYER_SIZE) {
            if t <= range && player_hit.map(|(_, best)| t < best).unwrap_or(true) {
                player_hit = Some((target.id, t));
            }
        }
    }

    match (wall_hit, player_hit) {
        (Some(w), Some((pid, pt))) => {
            if pt < w.t {
                HitscanOutcome::Player {
                    id: pid,
                    point: (ox + dx * pt, oy + dy * pt),
                    distance: pt,
                }
            } else {
                HitscanOutcome::Wall {
                    wall_id: w.wall_id,
                    slice: w.slice,
                    point: (ox + dx * w.t, oy + dy * w.t),
                    distance: w.t,
                }
            }
        }
        (Some(w), None) => HitscanOutcome::Wall {
            wall_id: w.wall_id,
            slice: w.slice,
            point: (ox + dx * w.t, oy + dy * w.t),
            distance: w.t,
        },
        (None, Some((pid, pt))) => HitscanOutcome::Player {
            id: pid,
            point: (ox + dx * pt, oy + dy * pt),
            distance: pt,
        },
        (None, None) => HitscanOutcome::Miss {
            end: (ox + dx * range, oy + dy * range),
        },
    }
}

/// Smallest positive ray parameter at which the ray enters the circle.
fn ray_circle(ox: f64, oy: f64, dx: f64, dy: f64, cx: f64, cy: f64, radius: f64) -> Option<f64> {
    let fx = cx - ox;
    let fy = cy - oy;
    let b = fx * dx + fy * dy;
    let c = fx * fx + fy * fy - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_d = disc.sqrt();
    let t = b - sqrt_d;
    if t >= 0.0 {
        Some(t)
    } else {
        let t2 = b + sqrt_d;
        // Origin inside the circle
        if t2 >= 0.0 {
            Some(0.0)
        } else {
            None
        }
    }
}
