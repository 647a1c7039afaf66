pub mod events;
pub mod types;

/// Message type IDs — must match the client exactly.
/// Using constants rather than an enum so we can match on u8 directly.
#[allow(dead_code)]
pub mod id {
    // Core (0x01-0x08)
    pub const HELLO: u8 = 0x01;
    pub const WELCOME: u8 = 0x02;
    pub const INPUT: u8 = 0x03;
    pub const SNAPSHOT: u8 = 0x04;
    pub const PLAYER_JOINED: u8 = 0x05;
    pub const PLAYER_LEFT: u8 = 0x06;
    pub const PING: u8 = 0x07;
    pub const PONG: u8 = 0x08;

    // Simulation (0x09-0x0D)
    pub const EVENTS: u8 = 0x09;
    pub const VISIBILITY: u8 = 0x0A;
    pub const RESPAWN_REQUEST: u8 = 0x0B;
    pub const RESPAWN: u8 = 0x0C;
    pub const ACTION_DENIED: u8 = 0x0D;
}
