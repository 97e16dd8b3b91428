//! App state machine

use bevy::prelude::*;

/// Top-level screens. The game mode lives in [`crate::mode::ModeState`], not here.
#[derive(States, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GameState {
    #[default]
    MainMenu,
    /// The game scene, single player or multiplayer
    InGame,
}
