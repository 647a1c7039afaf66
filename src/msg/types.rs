#![allow(dead_code)]
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::game::player::{MovementMode, Team};
use crate::systems::projectile::ProjectileKind;
use crate::systems::walls::Material;
use crate::systems::weapon::WeaponKind;

// ─── Core payloads (0x01-0x08) ──────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloPayload {
    pub version: u32,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomePayload {
    pub player_id: u32,
    pub tick_rate: u32,
    pub team: Team,
    pub spawn_pos: (f64, f64),
    pub walls: Vec<WallState>,
}

/// Key state bitfield expanded into named booleans — matches the client's
/// input sampler. The digit keys select weapon slots.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyState {
    pub w: bool,
    pub a: bool,
    pub s: bool,
    pub d: bool,
    pub r: bool,
    pub g: bool,
    pub shift: bool,
    pub ctrl: bool,
    #[serde(rename = "1")]
    pub slot1: bool,
    #[serde(rename = "2")]
    pub slot2: bool,
    #[serde(rename = "3")]
    pub slot3: bool,
    #[serde(rename = "4")]
    pub slot4: bool,
}

/// Mouse sample. `buttons` is the held-button bitmask (left=1, right=2,
/// middle=4); the `*_pressed` flags are edge events for this packet.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseState {
    pub x: f64,
    pub y: f64,
    pub buttons: u8,
    pub left_pressed: bool,
    pub right_pressed: bool,
}

/// C->S: one sampled input frame (0x03).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputPacket {
    pub sequence: u32,
    /// Client wall-clock milliseconds.
    pub timestamp: i64,
    pub keys: KeyState,
    pub mouse: MouseState,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatePayload {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub scale: f64,
    pub vx: f64,
    pub vy: f64,
    pub health: i32,
    pub armor: i32,
    pub team: Team,
    pub weapon: WeaponKind,
    pub is_alive: bool,
    pub movement_mode: MovementMode,
    pub is_ads: bool,
    pub kills: u32,
    pub deaths: u32,
    pub last_processed_input: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WallState {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub material: Material,
    pub max_health: f64,
    pub slice_health: Vec<f64>,
    /// 1 per destroyed slice, 0 per intact slice.
    pub destruction_mask: [u8; 5],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileState {
    pub id: u32,
    pub kind: ProjectileKind,
    pub owner_id: u32,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

/// S->C: authoritative world snapshot, sent every tick (0x04).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    pub players: HashMap<u32, PlayerStatePayload>,
    pub walls: HashMap<u32, WallState>,
    pub projectiles: Vec<ProjectileState>,
    pub timestamp: i64,
    pub tick_rate: u16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinedPayload {
    pub id: u32,
    pub name: String,
    pub team: Team,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeftPayload {
    pub id: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingPayload {
    pub client_time: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PongPayload {
    pub client_time: f64,
}

// ─── Simulation payloads (0x0A-0x0D) ────────────────────────────────

/// S->C: the viewer's own visibility polygon for this tick (0x0A).
/// The first vertex is the viewer position; the rest wind in increasing
/// angle relative to the viewer's heading.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityPayload {
    pub vertices: Vec<(f64, f64)>,
}

/// C->S: dead player asks to come back (0x0B). Body is empty.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespawnRequestPayload {}

/// S->C: respawn accepted (0x0C).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RespawnPayload {
    pub x: f64,
    pub y: f64,
    pub health: i32,
    pub armor: i32,
}

/// S->C: an action was rejected; no state changed (0x0D).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDeniedPayload {
    pub action: String,
    pub reason: String,
}
