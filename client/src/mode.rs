//! Process-wide game mode
//!
//! Single-player and multiplayer are mutually exclusive. The mode only moves through
//! [`ModeState`]'s named transitions, and switching straight from one regime to the
//! other has to go through `None` first.

use bevy::prelude::*;
use thiserror::Error;

/// Which operating regime the client is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GameMode {
    /// Nothing selected yet (or the player went back to the main menu)
    #[default]
    None,
    SinglePlayer,
    Multiplayer,
}

impl GameMode {
    /// Whether `self -> to` is an edge of the transition table.
    pub fn can_transition_to(self, to: GameMode) -> bool {
        use GameMode::*;
        matches!(
            (self, to),
            (None, _)
                | (_, None)
                | (SinglePlayer, SinglePlayer)
                | (Multiplayer, Multiplayer)
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            GameMode::None => "None",
            GameMode::SinglePlayer => "Single Player",
            GameMode::Multiplayer => "Multiplayer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ModeTransitionError {
    #[error("mode change {from:?} -> {to:?} is not allowed; reset to None first")]
    Rejected { from: GameMode, to: GameMode },
}

/// The one game mode instance for the whole process.
///
/// Inserted once at startup and handed to systems as a resource.
#[derive(Resource, Debug, Default)]
pub struct ModeState {
    current: GameMode,
}

impl ModeState {
    pub fn current(&self) -> GameMode {
        self.current
    }

    pub fn is_mode_set(&self) -> bool {
        self.current != GameMode::None
    }

    pub fn set_single_player(&mut self) -> Result<(), ModeTransitionError> {
        self.transition(GameMode::SinglePlayer)
    }

    pub fn set_multiplayer(&mut self) -> Result<(), ModeTransitionError> {
        self.transition(GameMode::Multiplayer)
    }

    /// Back to `None`, e.g. when returning to the main menu. Always accepted.
    pub fn reset(&mut self) {
        if self.current != GameMode::None {
            info!("Game mode reset: {:?} -> None", self.current);
        }
        self.current = GameMode::None;
    }

    fn transition(&mut self, to: GameMode) -> Result<(), ModeTransitionError> {
        let from = self.current;
        if !from.can_transition_to(to) {
            warn!("Rejected game mode change {:?} -> {:?}", from, to);
            return Err(ModeTransitionError::Rejected { from, to });
        }
        if from == to {
            debug!("Game mode already {:?}", to);
        } else {
            info!("Game mode: {:?} -> {:?}", from, to);
        }
        self.current = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unset() {
        let mode = ModeState::default();
        assert_eq!(mode.current(), GameMode::None);
        assert!(!mode.is_mode_set());
    }

    #[test]
    fn test_selection_is_idempotent() {
        let mut mode = ModeState::default();
        assert!(mode.set_multiplayer().is_ok());
        assert!(mode.set_multiplayer().is_ok());
        assert_eq!(mode.current(), GameMode::Multiplayer);
        assert!(mode.is_mode_set());
    }

    #[test]
    fn test_direct_switch_is_rejected() {
        let mut mode = ModeState::default();
        mode.set_single_player().unwrap();

        let err = mode.set_multiplayer().unwrap_err();
        assert_eq!(
            err,
            ModeTransitionError::Rejected {
                from: GameMode::SinglePlayer,
                to: GameMode::Multiplayer,
            }
        );
        // Unchanged after a rejected edge
        assert_eq!(mode.current(), GameMode::SinglePlayer);
    }

    #[test]
    fn test_reset_then_switch() {
        let mut mode = ModeState::default();
        mode.set_multiplayer().unwrap();
        mode.reset();
        assert!(!mode.is_mode_set());
        mode.set_single_player().unwrap();
        assert_eq!(mode.current(), GameMode::SinglePlayer);
    }

    #[test]
    fn test_current_tracks_last_accepted_call() {
        let mut mode = ModeState::default();
        let script = [
            GameMode::SinglePlayer,
            GameMode::None,
            GameMode::Multiplayer,
            GameMode::Multiplayer,
            GameMode::SinglePlayer, // rejected
            GameMode::None,
            GameMode::None,
        ];
        let mut expected = GameMode::None;
        for step in script {
            let accepted = match step {
                GameMode::None => {
                    mode.reset();
                    true
                }
                GameMode::SinglePlayer => mode.set_single_player().is_ok(),
                GameMode::Multiplayer => mode.set_multiplayer().is_ok(),
            };
            if accepted {
                expected = step;
            }
            assert_eq!(mode.current(), expected);
            assert_eq!(mode.is_mode_set(), expected != GameMode::None);
        }
    }
}
