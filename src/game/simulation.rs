//! Pure movement rules, applied by the game loop each tick.

use crate::config;
use crate::game::player::{MovementMode, Player};
use crate::msg::types::{KeyState, MouseState};

/// WASD -> integer direction in {-1, 0, 1}². Screen-space y grows downward.
pub fn movement_vector(keys: &KeyState) -> (i32, i32) {
    let mut dx = 0;
    let mut dy = 0;
    if keys.a {
        dx -= 1;
    }
    if keys.d {
        dx += 1;
    }
    if keys.w {
        dy -= 1;
    }
    if keys.s {
        dy += 1;
    }
    (dx, dy)
}

pub fn movement_mode(dx: i32, dy: i32, shift: bool, ctrl: bool) -> MovementMode {
    if dx == 0 && dy == 0 {
        MovementMode::Idle
    } else if shift {
        MovementMode::Running
    } else if ctrl {
        MovementMode::Sneaking
    } else {
        MovementMode::Walking
    }
}

pub fn speed_modifier(mode: MovementMode) -> f64 {
    match mode {
        MovementMode::Idle | MovementMode::Walking => 1.0,
        MovementMode::Running => config::PLAYER_SPEED_RUN / config::PLAYER_SPEED_WALK,
        MovementMode::Sneaking => config::PLAYER_SPEED_SNEAK / config::PLAYER_SPEED_WALK,
    }
}

/// Mouse coordinates may arrive in game space or in the client's scaled
/// screen space; map the latter back down.
pub fn normalize_mouse(mx: f64, my: f64) -> (f64, f64) {
    if mx >= 0.0 && mx <= config::ARENA_WIDTH && my >= 0.0 && my <= config::ARENA_HEIGHT {
        (mx, my)
    } else {
        (mx / config::SCALE_FACTOR, my / config::SCALE_FACTOR)
    }
}

/// Apply one input's movement and aim to the player. Diagonal input is
/// normalized so it is never faster than a single axis.
pub fn apply_movement(player: &mut Player, keys: &KeyState, mouse: &MouseState, dt: f64) {
    let (dx, dy) = movement_vector(keys);
    let mode = movement_mode(dx, dy, keys.shift, keys.ctrl);
    player.movement_mode = mode;

    if dx != 0 || dy != 0 {
        let mag = ((dx * dx + dy * dy) as f64).sqrt();
        let speed = config::PLAYER_SPEED_WALK * speed_modifier(mode);
        player.vx = dx as f64 / mag * speed;
        player.vy = dy as f64 / mag * speed;
    } else {
        damp_velocity(player);
    }

    player.x += player.vx * dt;
    player.y += player.vy * dt;

    let (mx, my) = normalize_mouse(mouse.x, mouse.y);
    player.rotation = (my - player.y).atan2(mx - player.x);
}

/// Tick a player that produced no input this tick: velocity decays, the
/// leftover momentum still moves them.
pub fn apply_idle_drift(player: &mut Player, dt: f64) {
    damp_velocity(player);
    player.x += player.vx * dt;
    player.y += player.vy * dt;
    player.movement_mode = MovementMode::Idle;
}

fn damp_velocity(player: &mut Player) {
    player.vx *= config::IDLE_DAMPING;
    player.vy *= config::IDLE_DAMPING;
    if player.vx.abs() < 1e-3 {
        player.vx = 0.0;
    }
    if player.vy.abs() < 1e-3 {
        player.vy = 0.0;
    }
}

/// Keep the whole collision circle inside the arena.
pub fn clamp_to_arena(player: &mut Player) {
    player.x = player
        .x
        .clamp(config::PLAYER_SIZE, config::ARENA_WIDTH - config::PLAYER_SIZE);
    player.y = player
        .y
        .clamp(config::PLAYER_SIZE, config::ARENA_HEIGHT - config::PLAYER_SIZE);
}
