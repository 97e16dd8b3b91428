//! Scene-entry orchestration
//!
//! Once per scene load the orchestrator makes the scene's subsystems match the game mode:
//! single-player gets the offline simulation and a fully disabled transport, multiplayer
//! gets the transport and the multiplayer subsystem (which then starts the session).

use bevy::prelude::*;
use thiserror::Error;

use crate::mode::{GameMode, ModeState};
use crate::session::{NetworkSession, Transport};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Fatal to the scene: multiplayer cannot run without networking.
    #[error("multiplayer was selected but this scene has no transport subsystem")]
    MissingTransport,
}

/// What the orchestration ended up activating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneActivation {
    /// `shutdown_stalled`: the previous session's transport never acknowledged its
    /// shutdown and was abandoned.
    SinglePlayer {
        simulation_created: bool,
        shutdown_stalled: bool,
    },
    Multiplayer,
}

/// The subsystems of a loaded scene, as the orchestrator sees them.
pub trait SceneContext {
    /// The scene's transport subsystem, if it has one.
    fn transport(&mut self) -> Option<&mut dyn Transport>;

    /// Enable or fully disable the transport subsystem (no packets, no timers).
    fn set_transport_enabled(&mut self, enabled: bool);

    /// Activate the offline simulation, creating it if the scene has none.
    /// Returns `true` when it had to be created.
    fn activate_simulation(&mut self) -> bool;

    fn deactivate_simulation(&mut self);

    fn set_multiplayer_active(&mut self, active: bool);
}

/// Runs the scene-entry algorithm against the process mode and session.
pub struct SceneOrchestrator<'a> {
    mode: &'a mut ModeState,
    session: &'a mut NetworkSession,
}

impl<'a> SceneOrchestrator<'a> {
    pub fn new(mode: &'a mut ModeState, session: &'a mut NetworkSession) -> Self {
        Self { mode, session }
    }

    /// Make the scene match the current mode.
    pub fn enter_scene(
        &mut self,
        scene: &mut dyn SceneContext,
    ) -> Result<SceneActivation, OrchestratorError> {
        if !self.mode.is_mode_set() {
            warn!("No game mode selected at scene entry; defaulting to single player");
            // None -> SinglePlayer is always an allowed edge
            let _ = self.mode.set_single_player();
        }

        match self.mode.current() {
            GameMode::Multiplayer => self.activate_multiplayer(scene),
            GameMode::SinglePlayer | GameMode::None => self.activate_single_player(scene),
        }
    }

    /// Runtime switch (diagnostics/tests); re-runs the whole algorithm.
    pub fn switch_to_single_player(
        &mut self,
        scene: &mut dyn SceneContext,
    ) -> Result<SceneActivation, OrchestratorError> {
        if self.mode.current() != GameMode::SinglePlayer {
            self.mode.reset();
        }
        let _ = self.mode.set_single_player();
        self.enter_scene(scene)
    }

    /// Runtime switch (diagnostics/tests); re-runs the whole algorithm.
    pub fn switch_to_multiplayer(
        &mut self,
        scene: &mut dyn SceneContext,
    ) -> Result<SceneActivation, OrchestratorError> {
        if self.mode.current() != GameMode::Multiplayer {
            self.mode.reset();
        }
        let _ = self.mode.set_multiplayer();
        self.enter_scene(scene)
    }

    fn activate_single_player(
        &mut self,
        scene: &mut dyn SceneContext,
    ) -> Result<SceneActivation, OrchestratorError> {
        let mut shutdown_stalled = false;
        match scene.transport() {
            Some(transport) => {
                if self.session.is_transport_active() || transport.is_listening() {
                    warn!("Network transport still running at single-player scene entry; shutting it down");
                }
                // Shutdown has to finish before anything gets reconfigured.
                if let Err(err) = self.session.disconnect(transport) {
                    error!("Previous network session did not stop ({}); abandoning it", err);
                    self.session.abandon();
                    shutdown_stalled = true;
                }
            }
            None => self.session.abandon(),
        }
        scene.set_transport_enabled(false);

        let simulation_created = scene.activate_simulation();
        if simulation_created {
            info!("No single-player simulation in scene; created a default one");
        }
        scene.set_multiplayer_active(false);

        info!("Scene ready for single player");
        Ok(SceneActivation::SinglePlayer {
            simulation_created,
            shutdown_stalled,
        })
    }

    fn activate_multiplayer(
        &mut self,
        scene: &mut dyn SceneContext,
    ) -> Result<SceneActivation, OrchestratorError> {
        if scene.transport().is_none() {
            error!("Multiplayer scene has no transport subsystem; halting scene setup");
            return Err(OrchestratorError::MissingTransport);
        }

        scene.set_transport_enabled(true);
        scene.deactivate_simulation();
        scene.set_multiplayer_active(true);

        info!("Scene ready for multiplayer");
        Ok(SceneActivation::Multiplayer)
    }
}
