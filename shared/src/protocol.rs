//! Lightyear network protocol definition
//!
//! The session core never parses packets itself; this only registers what gets replicated.

use bevy::prelude::*;
use lightyear::prelude::*;
use std::time::Duration;

use crate::components::Player;

// --- Protocol Plugin ---

pub struct ProtocolPlugin;

impl Plugin for ProtocolPlugin {
    fn build(&self, app: &mut App) {
        // Player entities are spawned by the host and mirrored on every client.
        // Movement replication is left to the transport layer.
        app.register_component::<Player>();
    }
}

// --- Network Configuration ---

pub const DEFAULT_PORT: u16 = 7777;
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1";
pub const PROTOCOL_ID: u64 = 0x4D4F_4445_5357_4954;

/// Address a host binds to. 0.0.0.0 accepts LAN and loopback peers alike.
pub fn host_bind_addr() -> &'static str {
    "0.0.0.0"
}

/// Shared private key for local development (use proper key management in production!)
pub const PRIVATE_KEY: [u8; 32] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08,
    0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10,
    0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18,
    0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f, 0x20,
];

/// Fixed timestep for game logic (60 Hz)
pub const FIXED_TIMESTEP_HZ: f64 = 60.0;

/// Tick duration for lightyear plugins
pub fn tick_duration() -> Duration {
    Duration::from_secs_f64(1.0 / FIXED_TIMESTEP_HZ)
}
