//! Player-related constants

/// Player movement speed (units per second)
pub const PLAYER_SPEED: f32 = 6.0;

/// Player height (for capsule)
pub const PLAYER_HEIGHT: f32 = 1.8;

/// Player radius (for capsule)
pub const PLAYER_RADIUS: f32 = 0.3;

/// Spawn position for new players
pub const SPAWN_POSITION: [f32; 3] = [0.0, 1.0, 0.0];

/// Horizontal spacing between players spawned by the host, so they don't overlap
pub const SPAWN_SPACING: f32 = 2.5;
