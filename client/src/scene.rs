//! Game scene wiring
//!
//! Runs the orchestrator when the game scene loads, hands multiplayer over to the
//! session, pumps transport events every frame and tears everything down on the way
//! back to the menu.

use bevy::prelude::*;
use shared::Player;

use crate::link::{self, LightyearTransport, TransportSubsystem};
use crate::mode::ModeState;
use crate::orchestrator::{OrchestratorError, SceneActivation, SceneContext, SceneOrchestrator};
use crate::pointer::PointerCapture;
use crate::session::{NetworkSession, SessionConfig, SessionRole, Transport};
use crate::simulation::SinglePlayerSimulation;
use crate::states::GameState;

/// The multiplayer-specific part of the scene. While active it owns the session hand-off.
#[derive(Resource, Debug, Default)]
pub struct MultiplayerSubsystem {
    active: bool,
}

impl MultiplayerSubsystem {
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Scene setup stopped on a configuration error; shown to the operator
#[derive(Resource, Debug, Clone)]
pub struct SceneFault(pub String);

/// The last session start (or the running link) failed; the player can retry or leave
#[derive(Resource, Debug, Clone)]
pub struct ConnectionFailure(pub String);

/// The Bevy world as the orchestrator sees it
pub struct BevyScene<'w> {
    transport: LightyearTransport<'w>,
}

impl<'w> BevyScene<'w> {
    pub fn new(world: &'w mut World) -> Self {
        Self {
            transport: LightyearTransport::new(world),
        }
    }
}

impl SceneContext for BevyScene<'_> {
    fn transport(&mut self) -> Option<&mut dyn Transport> {
        if self.transport.is_present() {
            Some(&mut self.transport)
        } else {
            None
        }
    }

    fn set_transport_enabled(&mut self, enabled: bool) {
        if let Some(mut links) = self.transport.world_mut().get_resource_mut::<TransportSubsystem>() {
            links.set_enabled(enabled);
        }
    }

    fn activate_simulation(&mut self) -> bool {
        let world = self.transport.world_mut();
        if let Some(mut simulation) = world.get_resource_mut::<SinglePlayerSimulation>() {
            simulation.set_active(true);
            return false;
        }
        let mut simulation = SinglePlayerSimulation::default();
        simulation.set_active(true);
        world.insert_resource(simulation);
        true
    }

    fn deactivate_simulation(&mut self) {
        let world = self.transport.world_mut();
        if let Some(mut simulation) = world.get_resource_mut::<SinglePlayerSimulation>() {
            simulation.set_active(false);
        }
    }

    fn set_multiplayer_active(&mut self, active: bool) {
        let world = self.transport.world_mut();
        if let Some(mut multiplayer) = world.get_resource_mut::<MultiplayerSubsystem>() {
            multiplayer.active = active;
            return;
        }
        if active {
            world.insert_resource(MultiplayerSubsystem { active });
        }
    }
}

type Orchestration = fn(&mut SceneOrchestrator<'_>, &mut BevyScene<'_>) -> Result<SceneActivation, OrchestratorError>;

fn orchestrate(world: &mut World, run: Orchestration) {
    world.init_resource::<ModeState>();
    world.init_resource::<NetworkSession>();
    world.remove_resource::<SceneFault>();

    let result = world.resource_scope(|world, mut mode: Mut<ModeState>| {
        world.resource_scope(|world, mut session: Mut<NetworkSession>| {
            let mut scene = BevyScene::new(world);
            let mut orchestrator = SceneOrchestrator::new(&mut mode, &mut session);
            run(&mut orchestrator, &mut scene)
        })
    });

    match result {
        Ok(SceneActivation::SinglePlayer {
            shutdown_stalled: true,
            ..
        }) => {
            // Single player still runs; the stuck transport is a network problem
            world.insert_resource(ConnectionFailure(
                "previous network session did not shut down".to_string(),
            ));
        }
        Ok(activation) => info!("Scene orchestrated: {:?}", activation),
        Err(err) => {
            error!("Scene setup halted: {}", err);
            world.insert_resource(SceneFault(err.to_string()));
        }
    }
}

/// Scene entry: make the subsystems match the game mode
pub fn enter_game_scene(world: &mut World) {
    orchestrate(world, |orchestrator, scene| orchestrator.enter_scene(scene));
}

/// Multiplayer hand-off: start the session from the persisted config
pub fn start_multiplayer_session(world: &mut World) {
    let wanted = world
        .get_resource::<MultiplayerSubsystem>()
        .is_some_and(|m| m.is_active());
    let running = world
        .get_resource::<NetworkSession>()
        .is_some_and(|s| s.is_transport_active());
    if !wanted || running {
        return;
    }

    let config = world
        .get_resource::<SessionConfig>()
        .cloned()
        .unwrap_or_default();
    world.init_resource::<NetworkSession>();
    world.init_resource::<PointerCapture>();
    world.remove_resource::<ConnectionFailure>();

    let result = world.resource_scope(|world, mut session: Mut<NetworkSession>| {
        world.resource_scope(|world, mut pointer: Mut<PointerCapture>| {
            let mut transport = LightyearTransport::new(world);
            session.auto_start(&mut transport, &mut pointer, &config)
        })
    });

    match result {
        Ok(()) => {
            if config.role == SessionRole::Host {
                link::spawn_host_player(world);
            }
        }
        Err(err) => {
            warn!("Session start failed: {}", err);
            world.insert_resource(ConnectionFailure(err.to_string()));
        }
    }
}

/// Deliver transport events to the session
pub fn pump_session(mut session: ResMut<NetworkSession>, mut pointer: ResMut<PointerCapture>) {
    session.pump(&mut pointer);
}

/// A link that closed underneath us is torn down and reported
pub fn handle_lost_link(world: &mut World) {
    let Some(failure) = world
        .get_resource::<NetworkSession>()
        .and_then(|s| s.link_failure())
        .map(|failure| failure.to_string())
    else {
        return;
    };

    stop_session(world);
    despawn_players(world);
    world.insert_resource(ConnectionFailure(failure));
}

/// R retries a failed start, on the same config
pub fn retry_connection(world: &mut World) {
    let retry = world
        .get_resource::<ButtonInput<KeyCode>>()
        .is_some_and(|keys| keys.just_pressed(KeyCode::KeyR));
    if !retry || !world.contains_resource::<ConnectionFailure>() {
        return;
    }
    info!("Retrying session start");
    start_multiplayer_session(world);
}

/// Escape goes back to the main menu
pub fn return_to_menu(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        next_state.set(GameState::MainMenu);
    }
}

/// F5/F6 force a runtime switch to single player / multiplayer
pub fn diagnostic_mode_switch(world: &mut World) {
    let Some(keys) = world.get_resource::<ButtonInput<KeyCode>>() else {
        return;
    };
    let to_single = keys.just_pressed(KeyCode::F5);
    let to_multi = keys.just_pressed(KeyCode::F6);

    if to_single {
        info!("Diagnostics: switching to single player");
        orchestrate(world, |orchestrator, scene| orchestrator.switch_to_single_player(scene));
        despawn_players(world);
    } else if to_multi {
        info!("Diagnostics: switching to multiplayer");
        orchestrate(world, |orchestrator, scene| orchestrator.switch_to_multiplayer(scene));
        start_multiplayer_session(world);
    }
}

/// Leaving the game scene: stop networking, drop players, back to no mode
pub fn leave_game_scene(world: &mut World) {
    stop_session(world);
    despawn_players(world);

    if let Some(mut simulation) = world.get_resource_mut::<SinglePlayerSimulation>() {
        simulation.set_active(false);
    }
    if let Some(mut multiplayer) = world.get_resource_mut::<MultiplayerSubsystem>() {
        multiplayer.active = false;
    }
    if let Some(mut links) = world.get_resource_mut::<TransportSubsystem>() {
        links.set_enabled(false);
    }
    if let Some(mut pointer) = world.get_resource_mut::<PointerCapture>() {
        pointer.release();
    }
    if let Some(mut mode) = world.get_resource_mut::<ModeState>() {
        mode.reset();
    }
    world.remove_resource::<SceneFault>();
    world.remove_resource::<ConnectionFailure>();
}

fn stop_session(world: &mut World) {
    if !world.contains_resource::<NetworkSession>() {
        return;
    }
    let result = world.resource_scope(|world, mut session: Mut<NetworkSession>| {
        let mut transport = LightyearTransport::new(world);
        session.disconnect(&mut transport)
    });
    if let Err(err) = result {
        error!("Failed to stop network session: {}", err);
    }
}

fn despawn_players(world: &mut World) {
    let players: Vec<Entity> = world
        .query_filtered::<Entity, With<Player>>()
        .iter(world)
        .collect();
    for entity in players {
        if let Ok(player) = world.get_entity_mut(entity) {
            player.despawn();
        }
    }
}

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ModeState>();
        app.init_resource::<NetworkSession>();
        app.init_resource::<PointerCapture>();
        app.init_resource::<TransportSubsystem>();

        app.add_systems(
            OnEnter(GameState::InGame),
            (enter_game_scene, start_multiplayer_session).chain(),
        );
        app.add_systems(OnExit(GameState::InGame), leave_game_scene);

        app.add_systems(
            Update,
            (
                link::forward_host_link_events,
                link::forward_client_link_events,
            )
                .run_if(link::transport_enabled),
        );
        app.add_systems(
            Update,
            (
                pump_session,
                handle_lost_link,
                retry_connection,
                diagnostic_mode_switch,
                return_to_menu,
            )
                .chain()
                .after(link::forward_client_link_events)
                .run_if(in_state(GameState::InGame)),
        );
        app.add_systems(PostUpdate, crate::pointer::apply_pointer_capture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::GameMode;
    use crate::session::loopback::LoopbackTransport;
    use bevy::ecs::system::RunSystemOnce;
    use lightyear::prelude::PeerId;
    use shared::ClientId;
    use std::net::UdpSocket;

    fn scene_world() -> World {
        let mut world = World::new();
        world.init_resource::<ModeState>();
        world.init_resource::<NetworkSession>();
        world.init_resource::<PointerCapture>();
        world
    }

    /// Configure hosting on a port another socket holds; keep the socket alive
    fn host_on_blocked_port(world: &mut World) -> UdpSocket {
        let blocker = UdpSocket::bind("0.0.0.0:0").unwrap();
        let port = blocker.local_addr().unwrap().port();
        world.insert_resource(SessionConfig {
            role: SessionRole::Host,
            server_address: "127.0.0.1".to_string(),
            port,
        });
        blocker
    }

    fn press(world: &mut World, key: KeyCode) {
        let mut keys = ButtonInput::<KeyCode>::default();
        keys.press(key);
        world.insert_resource(keys);
    }

    fn spawn_player(world: &mut World, peer: PeerId) {
        world.spawn((Player { client_id: peer }, Transform::default()));
    }

    fn player_count(world: &mut World) -> usize {
        world.query::<&Player>().iter(world).count()
    }

    fn simulation_active(world: &World) -> bool {
        world
            .get_resource::<SinglePlayerSimulation>()
            .is_some_and(|sim| sim.is_active())
    }

    /// A client session on the loopback transport, as if the hand-off had dialed
    fn dialed_session(transport: &mut LoopbackTransport) -> NetworkSession {
        let mut session = NetworkSession::default();
        session.start_as_client(transport, "10.0.0.5", 7777).unwrap();
        session
    }

    #[test]
    fn test_entry_without_mode_runs_offline() {
        let mut world = scene_world();
        world.init_resource::<TransportSubsystem>();

        enter_game_scene(&mut world);

        assert_eq!(world.resource::<ModeState>().current(), GameMode::SinglePlayer);
        assert!(world.resource::<SinglePlayerSimulation>().is_active());
        assert!(!world.resource::<TransportSubsystem>().is_enabled());
        assert!(!world.resource::<NetworkSession>().is_transport_active());
        assert!(!world.contains_resource::<SceneFault>());
    }

    #[test]
    fn test_multiplayer_without_transport_faults() {
        let mut world = scene_world();
        world.resource_mut::<ModeState>().set_multiplayer().unwrap();

        enter_game_scene(&mut world);

        assert!(world.contains_resource::<SceneFault>());
        assert!(!world.contains_resource::<SinglePlayerSimulation>());
        assert!(!world.contains_resource::<MultiplayerSubsystem>());
    }

    #[test]
    fn test_multiplayer_entry_enables_transport() {
        let mut world = scene_world();
        world.init_resource::<TransportSubsystem>();
        world.insert_resource(SinglePlayerSimulation::default());
        world.resource_mut::<ModeState>().set_multiplayer().unwrap();

        enter_game_scene(&mut world);

        assert!(world.resource::<TransportSubsystem>().is_enabled());
        assert!(world.resource::<MultiplayerSubsystem>().is_active());
        assert!(!world.resource::<SinglePlayerSimulation>().is_active());
    }

    #[test]
    fn test_failed_start_is_reported_for_retry() {
        let mut world = scene_world();
        world.init_resource::<TransportSubsystem>();
        // Hold the port so the host cannot bind it
        let blocker = host_on_blocked_port(&mut world);
        world.resource_mut::<ModeState>().set_multiplayer().unwrap();

        enter_game_scene(&mut world);
        start_multiplayer_session(&mut world);

        assert!(world.contains_resource::<ConnectionFailure>());
        let session = world.resource::<NetworkSession>();
        assert!(!session.is_transport_active());
        assert_eq!(session.local_client_id(), None);
        assert!(!world.resource::<PointerCapture>().is_captured());
        assert!(world.query::<&Player>().iter(&world).next().is_none());
        drop(blocker);
    }

    #[test]
    fn test_lost_link_tears_session_down() {
        let mut world = scene_world();
        world.init_resource::<TransportSubsystem>();
        let mut transport = LoopbackTransport::new().assigning(ClientId(9));
        world.insert_resource(dialed_session(&mut transport));
        transport.accept_dial();
        world.run_system_once(pump_session).unwrap();
        assert!(world.resource::<PointerCapture>().is_captured());
        spawn_player(&mut world, PeerId::Server);
        spawn_player(&mut world, PeerId::Netcode(9));

        transport.drop_link("host went away");
        world.run_system_once(pump_session).unwrap();
        handle_lost_link(&mut world);

        let session = world.resource::<NetworkSession>();
        assert_eq!(session.state(), &crate::session::network::SessionState::default());
        assert!(!session.link_lost());
        let failure = world.resource::<ConnectionFailure>();
        assert!(failure.0.contains("connection lost"));
        assert_eq!(player_count(&mut world), 0);
    }

    #[test]
    fn test_refused_dial_reports_connect_failure() {
        let mut world = scene_world();
        world.init_resource::<TransportSubsystem>();
        let mut transport = LoopbackTransport::new().assigning(ClientId(9));
        world.insert_resource(dialed_session(&mut transport));

        transport.drop_link("connection timed out");
        world.run_system_once(pump_session).unwrap();
        handle_lost_link(&mut world);

        let failure = world.resource::<ConnectionFailure>();
        assert!(failure.0.contains("could not connect to 10.0.0.5:7777"));
        assert!(!world.resource::<NetworkSession>().is_transport_active());
        assert!(!world.resource::<PointerCapture>().is_captured());
    }

    #[test]
    fn test_healthy_link_is_left_alone() {
        let mut world = scene_world();
        let mut transport = LoopbackTransport::new().assigning(ClientId(9));
        world.insert_resource(dialed_session(&mut transport));

        handle_lost_link(&mut world);

        assert!(world.resource::<NetworkSession>().is_transport_active());
        assert!(!world.contains_resource::<ConnectionFailure>());
    }

    #[test]
    fn test_retry_restarts_the_session() {
        let mut world = scene_world();
        world.init_resource::<TransportSubsystem>();
        let blocker = host_on_blocked_port(&mut world);
        world.resource_mut::<ModeState>().set_multiplayer().unwrap();
        enter_game_scene(&mut world);
        world.insert_resource(ConnectionFailure("earlier attempt".to_string()));

        // No key, no retry
        world.init_resource::<ButtonInput<KeyCode>>();
        retry_connection(&mut world);
        assert_eq!(world.resource::<ConnectionFailure>().0, "earlier attempt");

        press(&mut world, KeyCode::KeyR);
        retry_connection(&mut world);

        // The new attempt ran and failed on the held port
        let failure = &world.resource::<ConnectionFailure>().0;
        assert!(failure.contains("could not bind port"), "{}", failure);
        drop(blocker);
    }

    #[test]
    fn test_diagnostic_switches_keep_modes_exclusive() {
        let mut world = scene_world();
        world.init_resource::<TransportSubsystem>();
        let blocker = host_on_blocked_port(&mut world);

        press(&mut world, KeyCode::F6);
        diagnostic_mode_switch(&mut world);
        assert_eq!(world.resource::<ModeState>().current(), GameMode::Multiplayer);
        assert!(world.resource::<MultiplayerSubsystem>().is_active());
        assert!(!simulation_active(&world));

        // A session the hand-off got running
        let mut transport = LoopbackTransport::new().assigning(ClientId(4));
        world.insert_resource(dialed_session(&mut transport));
        assert!(world.resource::<NetworkSession>().is_transport_active());

        press(&mut world, KeyCode::F5);
        diagnostic_mode_switch(&mut world);
        assert_eq!(world.resource::<ModeState>().current(), GameMode::SinglePlayer);
        assert!(simulation_active(&world));
        assert!(!world.resource::<NetworkSession>().is_transport_active());
        assert!(!world.resource::<MultiplayerSubsystem>().is_active());
        assert!(!world.resource::<TransportSubsystem>().is_enabled());
        drop(blocker);
    }

    #[test]
    fn test_leaving_resets_mode() {
        let mut world = scene_world();
        world.init_resource::<TransportSubsystem>();
        world.resource_mut::<ModeState>().set_single_player().unwrap();
        enter_game_scene(&mut world);

        leave_game_scene(&mut world);

        assert!(!world.resource::<ModeState>().is_mode_set());
        assert!(!world.resource::<SinglePlayerSimulation>().is_active());
    }
}
