#![allow(dead_code)]
/// All game constants — shared with the client, loaded once at startup.

pub const PORT: u16 = 8766;
pub const TICK_RATE: u32 = 60;
pub const TICK_INTERVAL_MS: u64 = 16; // ~1000 / TICK_RATE
pub const MAX_PLAYERS: usize = 16;
pub const PROTOCOL_VERSION: u32 = 1;
pub const DISCONNECT_TIMEOUT_MS: u64 = 60_000;
pub const MAX_INPUT_BUFFER_SIZE: usize = 32;

// Arena — game-space units; the client renders at SCALE_FACTOR x
pub const ARENA_WIDTH: f64 = 480.0;
pub const ARENA_HEIGHT: f64 = 270.0;
pub const SCALE_FACTOR: f64 = 4.0;

// Players
pub const PLAYER_HEALTH: i32 = 100;
pub const PLAYER_ARMOR: i32 = 50;
/// Collision circle radius in game units.
pub const PLAYER_SIZE: f64 = 6.0;
pub const PLAYER_SPEED_WALK: f64 = 100.0; // units/sec
pub const PLAYER_SPEED_RUN: f64 = 150.0;
pub const PLAYER_SPEED_SNEAK: f64 = 50.0;
/// Multiplicative velocity damping per tick when no movement keys are held.
pub const IDLE_DAMPING: f64 = 0.8;
pub const RESPAWN_DELAY_MS: i64 = 3_000;

// Input validation
pub const INPUT_MAX_AGE_MS: i64 = 1_000;
/// Out-of-order inputs up to this many sequence numbers old are tolerated.
pub const INPUT_REORDER_WINDOW: u32 = 10;

// Grenades
pub const GRENADE_BASE_THROW_SPEED: f64 = 150.0;
pub const GRENADE_CHARGE_SPEED_BONUS: f64 = 50.0;
pub const GRENADE_FUSE_MS: i64 = 3_000;
pub const GRENADE_RESTITUTION: f64 = 0.6;

// View cone
/// Half-angle of the view cone in radians (120 degree cone).
pub const VIEW_HALF_ANGLE: f64 = std::f64::consts::FRAC_PI_3;
pub const VIEW_DISTANCE: f64 = 160.0;
/// Maximum angular gap between interpolated arc samples (radians).
pub const VIEW_ARC_STEP: f64 = 10.0 * std::f64::consts::PI / 180.0;

// Walls
pub const WALL_SLICES: usize = 5;
pub const WALL_MAX_HEALTH: f64 = 150.0;
