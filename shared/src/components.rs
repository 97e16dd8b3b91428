//! Shared ECS components used by both the host and its clients

use bevy::prelude::*;
use lightyear::prelude::PeerId;
use serde::{Deserialize, Serialize};

use crate::ids::ClientId;

/// Marker component for player entities.
///
/// Spawned by the host (one per connected peer, plus its own) and replicated to clients,
/// or spawned directly by the offline simulation.
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Player {
    pub client_id: PeerId,
}

impl Player {
    /// Identity of the process that owns this player.
    pub fn owner(&self) -> ClientId {
        ClientId::from(self.client_id)
    }
}

/// Tag for the one player entity this process has authority over
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct LocalPlayer;
