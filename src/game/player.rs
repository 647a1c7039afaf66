use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config;
use crate::msg::types::{InputPacket, PlayerStatePayload};
use crate::systems::weapon::{WeaponKind, WeaponState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementMode {
    Idle,
    Walking,
    Running,
    Sneaking,
}

pub struct Player {
    pub id: u32,
    pub name: String,

    // Pose
    pub x: f64,
    pub y: f64,
    /// Aim angle in radians.
    pub rotation: f64,
    pub scale: f64,
    pub vx: f64,
    pub vy: f64,

    // Vitals
    pub health: i32,
    pub armor: i32,
    pub team: Team,
    pub is_alive: bool,
    pub last_damage_time: i64,
    pub death_time: Option<i64>,
    pub kills: u32,
    pub deaths: u32,

    // Weapons
    pub current_weapon: WeaponKind,
    pub weapons: HashMap<WeaponKind, WeaponState>,

    // Stance
    pub movement_mode: MovementMode,
    pub is_ads: bool,

    // Input
    pub last_processed_input: u32,
    input_buffer: Vec<InputPacket>,
    last_activity: Instant,

    // Connection state
    pub is_disconnected: bool,
}

impl Player {
    pub fn new(id: u32, spawn_x: f64, spawn_y: f64, name: String, team: Team) -> Self {
        Self {
            id,
            name,
            x: spawn_x,
            y: spawn_y,
            rotation: 0.0,
            scale: 1.0,
            vx: 0.0,
            vy: 0.0,
            health: config::PLAYER_HEALTH,
            armor: config::PLAYER_ARMOR,
            team,
            is_alive: true,
            last_damage_time: 0,
            death_time: None,
            kills: 0,
            deaths: 0,
            current_weapon: WeaponKind::Rifle,
            weapons: default_loadout(),
            movement_mode: MovementMode::Idle,
            is_ads: false,
            last_processed_input: 0,
            input_buffer: Vec::new(),
            last_activity: Instant::now(),
            is_disconnected: false,
        }
    }

    // ─── Input buffering ─────────────────────────────────────────────

    pub fn push_input(&mut self, input: InputPacket) {
        if self.input_buffer.len() < config::MAX_INPUT_BUFFER_SIZE {
            self.input_buffer.push(input);
        }
        self.last_activity = Instant::now();
    }

    pub fn consume_inputs(&mut self) -> Vec<InputPacket> {
        std::mem::take(&mut self.input_buffer)
    }

    /// Removal happens at the next tick boundary so all player mutation
    /// stays inside the tick.
    pub fn mark_disconnected(&mut self) {
        self.is_disconnected = true;
    }

    /// Milliseconds since this player last sent anything.
    pub fn idle_ms(&self) -> u64 {
        self.last_activity.elapsed().as_millis() as u64
    }

    // ─── Weapons ─────────────────────────────────────────────────────

    pub fn weapon(&self) -> &WeaponState {
        &self.weapons[&self.current_weapon]
    }

    pub fn weapon_mut(&mut self) -> &mut WeaponState {
        self.weapons.get_mut(&self.current_weapon).expect("current weapon always present")
    }

    // ─── Damage, death, respawn ──────────────────────────────────────

    pub fn apply_damage(&mut self, amount: f64, now: i64) -> DamageOutcome {
        let total = (amount.round() as i32).max(1);
        self.last_damage_time = now;

        // Armor absorbs first; remainder hits health
        let armor_absorbed = self.armor.min(total);
        self.armor -= armor_absorbed;
        let health_damage = self.health.min(total - armor_absorbed);
        self.health -= health_damage;

        let killed = self.is_alive && self.health <= 0;
        if killed {
            self.is_alive = false;
            self.death_time = Some(now);
            self.deaths += 1;
        }

        DamageOutcome {
            total,
            armor_absorbed,
            health_damage,
            new_health: self.health,
            killed,
        }
    }

    pub fn can_respawn(&self, now: i64) -> bool {
        !self.is_alive
            && self
                .death_time
                .map(|t| now - t >= config::RESPAWN_DELAY_MS)
                .unwrap_or(true)
    }

    /// Bring the player back at a spawn point with full vitals and a fresh
    /// loadout.
    pub fn respawn(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
        self.vx = 0.0;
        self.vy = 0.0;
        self.health = config::PLAYER_HEALTH;
        self.armor = config::PLAYER_ARMOR;
        self.is_alive = true;
        self.death_time = None;
        self.current_weapon = WeaponKind::Rifle;
        self.weapons = default_loadout();
        self.movement_mode = MovementMode::Idle;
        self.is_ads = false;
    }

    // ─── Snapshot ────────────────────────────────────────────────────

    pub fn to_payload(&self) -> PlayerStatePayload {
        PlayerStatePayload {
            id: self.id,
            x: self.x,
            y: self.y,
            rotation: self.rotation,
            scale: self.scale,
            vx: self.vx,
            vy: self.vy,
            health: self.health,
            armor: self.armor,
            team: self.team,
            weapon: self.current_weapon,
            is_alive: self.is_alive,
            movement_mode: self.movement_mode,
            is_ads: self.is_ads,
            kills: self.kills,
            deaths: self.deaths,
            last_processed_input: self.last_processed_input,
        }
    }
}

fn default_loadout() -> HashMap<WeaponKind, WeaponState> {
    WeaponKind::ALL
        .into_iter()
        .map(|kind| (kind, WeaponState::new(kind)))
        .collect()
}

#[derive(Debug, Clone)]
pub struct DamageOutcome {
    pub total: i32,
    pub armor_absorbed: i32,
    pub health_damage: i32,
    pub new_health: i32,
    pub killed: bool,
}
