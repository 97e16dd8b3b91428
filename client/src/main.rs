//! Game client with single-player and multiplayer modes
//!
//! The main menu picks a mode; the game scene then either runs the offline simulation
//! or hosts/joins a Lightyear session on the same binary.

mod authority;
mod link;
mod mode;
mod orchestrator;
mod pointer;
mod scene;
mod session;
mod simulation;
mod states;
mod ui;
mod world;

use bevy::prelude::*;
use bevy::window::WindowResolution;
use lightyear::prelude::client::ClientPlugins;
use lightyear::prelude::server::ServerPlugins;
use shared::{tick_duration, ProtocolPlugin};
use states::GameState;

fn main() {
    let mut app = App::new();

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: "Mode Switch".to_string(),
            resolution: WindowResolution::new(1280, 720),
            ..default()
        }),
        ..default()
    }));

    app.init_state::<GameState>();

    // Either side of a session can run in this process
    app.add_plugins(ClientPlugins {
        tick_duration: tick_duration(),
    });
    app.add_plugins(ServerPlugins {
        tick_duration: tick_duration(),
    });
    app.add_plugins(ProtocolPlugin);

    // Persisted session choice
    let prefs_path = session::prefs_path();
    let prefs = session::Preferences::load(&prefs_path);
    let config = session::SessionConfig::read(&prefs);
    info!(
        "Loaded preferences from {:?}: {:?} {}:{}",
        prefs_path, config.role, config.server_address, config.port
    );
    app.insert_resource(prefs);
    app.insert_resource(config);

    app.add_plugins(scene::ScenePlugin);
    app.add_plugins(ui::MainMenuPlugin);
    app.add_plugins(ui::StatusHudPlugin);

    app.init_resource::<authority::AuthorityLedger>();

    app.add_systems(Startup, world::setup_player_visual_assets);
    app.add_systems(OnEnter(GameState::MainMenu), spawn_menu_camera);
    app.add_systems(OnExit(GameState::MainMenu), despawn_menu_camera);
    app.add_systems(OnEnter(GameState::InGame), world::spawn_scene);
    app.add_systems(OnExit(GameState::InGame), world::despawn_scene);

    // Authority runs in every state: replicated players can arrive at any time
    app.add_systems(
        Update,
        (
            authority::resolve_spawned_players,
            authority::silence_remote_rigs,
            world::attach_player_visuals,
            authority::release_despawned_players,
            world::restore_overview_camera,
        )
            .chain(),
    );

    app.add_systems(
        Update,
        (
            simulation::sync_offline_player,
            authority::sample_input,
            simulation::move_offline_player,
        )
            .chain()
            .before(authority::resolve_spawned_players)
            .run_if(in_state(GameState::InGame)),
    );

    info!("Starting client");
    app.run();
}

/// 2D camera for the menu UI
#[derive(Component)]
struct MenuCamera;

fn spawn_menu_camera(mut commands: Commands) {
    commands.spawn((MenuCamera, Camera2d));
}

fn despawn_menu_camera(mut commands: Commands, cameras: Query<Entity, With<MenuCamera>>) {
    for entity in cameras.iter() {
        commands.entity(entity).despawn();
    }
}
