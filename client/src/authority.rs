//! Per-entity authority
//!
//! When a player entity spawns we decide, once, whether this process controls it.
//! The locally owned player gets input sampling, the one active camera and the audio
//! listener. Everyone else's player is a passive replica with all three switched off.

use bevy::audio::SpatialListener;
use bevy::prelude::*;
use shared::{ClientId, LocalPlayer, Player, PLAYER_HEIGHT};
use std::collections::HashMap;

use crate::pointer::PointerCapture;
use crate::session::NetworkSession;
use crate::simulation::SinglePlayerSimulation;

/// Eye height of the player camera above the entity origin
const CAMERA_EYE_HEIGHT: f32 = PLAYER_HEIGHT * 0.4;

/// Who owns a player entity, decided at spawn and never re-evaluated
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorityRecord {
    owner: ClientId,
    locally_owned: bool,
}

impl AuthorityRecord {
    pub fn owner(&self) -> ClientId {
        self.owner
    }

    pub fn is_locally_owned(&self) -> bool {
        self.locally_owned
    }
}

/// Compare an entity's owner against this process's identity.
///
/// With no local identity (no session, no offline simulation) nothing is local.
pub fn resolve_authority(owner: ClientId, local: Option<ClientId>) -> AuthorityRecord {
    AuthorityRecord {
        owner,
        locally_owned: local == Some(owner),
    }
}

/// This process's identity for ownership checks
pub fn local_identity(
    session: &NetworkSession,
    simulation: Option<&SinglePlayerSimulation>,
) -> Option<ClientId> {
    session.local_client_id().or_else(|| {
        simulation
            .filter(|sim| sim.is_active())
            .map(|_| ClientId::HOST)
    })
}

/// A camera claiming to be the scene's main view.
///
/// At most one of these may render (with its listener) at a time.
#[derive(Component, Debug, Default)]
pub struct MainCamera;

/// The camera rig attached to a player entity
#[derive(Component, Debug)]
pub struct PlayerCamera {
    pub owner: Entity,
}

/// Keyboard input sampling for one player entity
#[derive(Component, Debug, Default)]
pub struct InputSampler {
    enabled: bool,
    movement: Vec2,
}

impl InputSampler {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Latest movement intent (x = strafe, y = forward), zero when disabled
    pub fn movement(&self) -> Vec2 {
        self.movement
    }
}

/// Authority records of live player entities, kept so despawns can be classified
#[derive(Resource, Debug, Default)]
pub struct AuthorityLedger {
    records: HashMap<Entity, AuthorityRecord>,
}

impl AuthorityLedger {
    pub fn get(&self, entity: Entity) -> Option<&AuthorityRecord> {
        self.records.get(&entity)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Resolve and enforce authority for newly spawned players
pub fn resolve_spawned_players(
    mut commands: Commands,
    mut ledger: ResMut<AuthorityLedger>,
    mut pointer: ResMut<PointerCapture>,
    session: Res<NetworkSession>,
    simulation: Option<Res<SinglePlayerSimulation>>,
    spawned: Query<(Entity, &Player), Added<Player>>,
    mut main_cameras: Query<(Entity, &mut Camera), With<MainCamera>>,
) {
    let local = local_identity(&session, simulation.as_deref());

    for (entity, player) in spawned.iter() {
        let record = resolve_authority(player.owner(), local);
        ledger.records.insert(entity, record);

        if record.is_locally_owned() {
            info!("Player {} spawned with local authority", record.owner());

            // Exactly one camera/listener pair in the scene: ours.
            for (camera_entity, mut camera) in main_cameras.iter_mut() {
                camera.is_active = false;
                commands.entity(camera_entity).remove::<SpatialListener>();
            }

            commands.entity(entity).insert((
                record,
                LocalPlayer,
                InputSampler {
                    enabled: true,
                    ..default()
                },
            ));
            commands.entity(entity).with_children(|rig| {
                rig.spawn((
                    PlayerCamera { owner: entity },
                    MainCamera,
                    Camera3d::default(),
                    Camera {
                        is_active: true,
                        ..default()
                    },
                    Transform::from_xyz(0.0, CAMERA_EYE_HEIGHT, 0.0),
                    SpatialListener::new(0.1),
                ));
            });
            pointer.capture();
        } else {
            debug!("Player {} spawned as a remote replica", record.owner());
            commands.entity(entity).insert((record, InputSampler::default()));
        }
    }
}

/// Remote replicas must never end up rendering or listening
pub fn silence_remote_rigs(
    mut commands: Commands,
    ledger: Res<AuthorityLedger>,
    mut rigs: Query<(Entity, &PlayerCamera, &mut Camera), Added<PlayerCamera>>,
) {
    for (rig, player_camera, mut camera) in rigs.iter_mut() {
        let local = ledger
            .get(player_camera.owner)
            .is_some_and(|r| r.is_locally_owned());
        if !local {
            camera.is_active = false;
            commands.entity(rig).remove::<SpatialListener>();
        }
    }
}

/// Drop authority records for despawned players; losing our own player frees the pointer
pub fn release_despawned_players(
    mut removed: RemovedComponents<Player>,
    mut ledger: ResMut<AuthorityLedger>,
    mut pointer: ResMut<PointerCapture>,
) {
    for entity in removed.read() {
        let Some(record) = ledger.records.remove(&entity) else {
            continue;
        };
        if record.is_locally_owned() {
            info!("Local player {} despawned; releasing pointer", record.owner());
            pointer.release();
        }
    }
}

/// Sample movement keys for the authoritative player only
pub fn sample_input(
    keyboard: Option<Res<ButtonInput<KeyCode>>>,
    mut samplers: Query<&mut InputSampler>,
) {
    let Some(keyboard) = keyboard else {
        return;
    };

    let mut movement = Vec2::ZERO;
    if keyboard.pressed(KeyCode::KeyW) {
        movement.y += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyS) {
        movement.y -= 1.0;
    }
    if keyboard.pressed(KeyCode::KeyD) {
        movement.x += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyA) {
        movement.x -= 1.0;
    }
    let movement = movement.normalize_or_zero();

    for mut sampler in samplers.iter_mut() {
        sampler.movement = if sampler.enabled { movement } else { Vec2::ZERO };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::loopback::LoopbackTransport;
    use lightyear::prelude::PeerId;

    fn authority_app(session: NetworkSession) -> App {
        let mut app = App::new();
        app.insert_resource(session);
        app.init_resource::<AuthorityLedger>();
        app.init_resource::<PointerCapture>();
        app.add_systems(
            Update,
            (
                resolve_spawned_players,
                silence_remote_rigs,
                release_despawned_players,
            )
                .chain(),
        );
        app
    }

    fn client_session(local: ClientId) -> NetworkSession {
        let mut transport = LoopbackTransport::new().assigning(local);
        let mut session = NetworkSession::default();
        session
            .start_as_client(&mut transport, "10.0.0.5", 7777)
            .unwrap();
        session
    }

    /// Cameras that render with a listener attached
    fn active_camera_listener_pairs(app: &mut App) -> usize {
        let world = app.world_mut();
        world
            .query::<(&Camera, &SpatialListener)>()
            .iter(world)
            .filter(|(camera, _)| camera.is_active)
            .count()
    }

    #[test]
    fn test_resolve_authority() {
        assert!(resolve_authority(ClientId(4), Some(ClientId(4))).is_locally_owned());
        assert!(!resolve_authority(ClientId(4), Some(ClientId(5))).is_locally_owned());
        assert!(!resolve_authority(ClientId(4), None).is_locally_owned());
    }

    #[test]
    fn test_offline_identity_is_host() {
        let session = NetworkSession::default();
        let mut simulation = SinglePlayerSimulation::default();
        assert_eq!(local_identity(&session, Some(&simulation)), None);
        simulation.set_active(true);
        assert_eq!(local_identity(&session, Some(&simulation)), Some(ClientId::HOST));
    }

    #[test]
    fn test_local_spawn_takes_the_only_camera() {
        let mut app = authority_app(client_session(ClientId(42)));
        // Scene overview camera that also claims main
        app.world_mut().spawn((
            MainCamera,
            Camera3d::default(),
            Camera::default(),
            SpatialListener::new(0.1),
        ));

        let player = app
            .world_mut()
            .spawn(Player {
                client_id: PeerId::Netcode(42),
            })
            .id();
        app.update();

        let record = *app.world().get::<AuthorityRecord>(player).unwrap();
        assert!(record.is_locally_owned());
        assert_eq!(record.owner(), ClientId(42));
        assert!(app.world().get::<LocalPlayer>(player).is_some());
        assert!(app.world().get::<InputSampler>(player).unwrap().is_enabled());
        assert!(app.world().resource::<PointerCapture>().is_captured());
        assert_eq!(active_camera_listener_pairs(&mut app), 1);
    }

    #[test]
    fn test_remote_spawn_stays_passive() {
        let mut app = authority_app(client_session(ClientId(42)));
        let remote = app
            .world_mut()
            .spawn(Player {
                client_id: PeerId::Netcode(7),
            })
            .id();
        app.update();

        let record = *app.world().get::<AuthorityRecord>(remote).unwrap();
        assert!(!record.is_locally_owned());
        assert!(!app.world().get::<InputSampler>(remote).unwrap().is_enabled());
        assert!(app.world().get::<LocalPlayer>(remote).is_none());
        assert!(app.world().get::<Children>(remote).is_none());
        assert_eq!(active_camera_listener_pairs(&mut app), 0);
        assert!(!app.world().resource::<PointerCapture>().is_captured());
    }

    #[test]
    fn test_remote_rig_is_switched_off() {
        let mut app = authority_app(client_session(ClientId(42)));
        let remote = app
            .world_mut()
            .spawn(Player {
                client_id: PeerId::Netcode(7),
            })
            .id();
        app.update();

        // A rig that came along with the replica
        app.world_mut().spawn((
            PlayerCamera { owner: remote },
            Camera3d::default(),
            Camera::default(),
            SpatialListener::new(0.1),
        ));
        app.update();

        assert_eq!(active_camera_listener_pairs(&mut app), 0);
    }

    #[test]
    fn test_local_despawn_releases_pointer() {
        let mut app = authority_app(client_session(ClientId(42)));
        let local = app
            .world_mut()
            .spawn(Player {
                client_id: PeerId::Netcode(42),
            })
            .id();
        let remote = app
            .world_mut()
            .spawn(Player {
                client_id: PeerId::Netcode(9),
            })
            .id();
        app.update();
        assert_eq!(app.world().resource::<AuthorityLedger>().len(), 2);

        app.world_mut().despawn(remote);
        app.update();
        assert!(app.world().resource::<PointerCapture>().is_captured());

        app.world_mut().despawn(local);
        app.update();
        assert!(!app.world().resource::<PointerCapture>().is_captured());
        assert!(app.world().resource::<AuthorityLedger>().is_empty());
    }

    #[test]
    fn test_disabled_sampler_reads_nothing() {
        let mut app = App::new();
        let mut keyboard = ButtonInput::<KeyCode>::default();
        keyboard.press(KeyCode::KeyW);
        app.insert_resource(keyboard);
        app.add_systems(Update, sample_input);

        let local = app
            .world_mut()
            .spawn(InputSampler {
                enabled: true,
                ..default()
            })
            .id();
        let remote = app.world_mut().spawn(InputSampler::default()).id();
        app.update();

        assert_eq!(app.world().get::<InputSampler>(local).unwrap().movement(), Vec2::Y);
        assert_eq!(app.world().get::<InputSampler>(remote).unwrap().movement(), Vec2::ZERO);
    }
}
