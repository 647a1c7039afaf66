//! Outbound simulation events.
//!
//! Every observable state change inside a tick is recorded as one tagged
//! event; the orchestrator drains its buffer into an `EventBatchPayload`
//! broadcast after the snapshot. Events keep the order they were produced.

use serde::Serialize;

use crate::systems::projectile::ProjectileKind;
use crate::systems::weapon::WeaponKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Player,
    Wall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    Bullet,
    Explosion,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameEvent {
    WeaponFired {
        player_id: u32,
        weapon: WeaponKind,
        position: (f64, f64),
        direction: f64,
    },
    WeaponHit {
        player_id: u32,
        position: (f64, f64),
        target_type: TargetType,
        target_id: u32,
    },
    WeaponMiss {
        player_id: u32,
        position: (f64, f64),
        direction: f64,
    },
    WeaponReload {
        player_id: u32,
        weapon: WeaponKind,
        reload_end: i64,
    },
    WeaponReloaded {
        player_id: u32,
        weapon: WeaponKind,
        ammo: u32,
        reserve: u32,
    },
    WeaponSwitched {
        player_id: u32,
        from: WeaponKind,
        to: WeaponKind,
    },
    PlayerDamaged {
        player_id: u32,
        damage: i32,
        damage_type: DamageType,
        source_player_id: u32,
        position: (f64, f64),
        new_health: i32,
        is_killed: bool,
        timestamp: i64,
    },
    PlayerKilled {
        player_id: u32,
        killer_id: u32,
        position: (f64, f64),
        timestamp: i64,
    },
    WallDamaged {
        wall_id: u32,
        slice_index: usize,
        new_health: f64,
        is_destroyed: bool,
    },
    WallDestroyed {
        wall_id: u32,
        slice_index: usize,
    },
    ProjectileCreated {
        id: u32,
        kind: ProjectileKind,
        owner_id: u32,
        position: (f64, f64),
        velocity: (f64, f64),
    },
    /// Emitted on discrete trajectory changes (grenade bounces); continuous
    /// motion is carried by the snapshot instead.
    ProjectileUpdated {
        id: u32,
        position: (f64, f64),
        velocity: (f64, f64),
    },
    ProjectileExploded {
        id: u32,
        position: (f64, f64),
        radius: f64,
    },
    ExplosionCreated {
        position: (f64, f64),
        radius: f64,
        damage: f64,
        source_player_id: u32,
    },
    GrenadeThrown {
        player_id: u32,
        charge_level: u8,
        position: (f64, f64),
        velocity: (f64, f64),
    },
}

/// S->C: all events produced during one tick (0x09).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBatchPayload {
    pub tick: u64,
    pub events: Vec<GameEvent>,
}
