//! Game scene visuals
//!
//! A ground plane, a light, the overview camera that renders until a local player takes
//! over, and a capsule for every player entity.

use bevy::audio::SpatialListener;
use bevy::prelude::*;
use shared::{Player, PLAYER_HEIGHT, PLAYER_RADIUS, SPAWN_POSITION};

use crate::authority::MainCamera;

/// Root entity for all scene visuals
#[derive(Component)]
pub struct SceneRoot;

/// Camera showing the scene while no local player exists
#[derive(Component)]
pub struct OverviewCamera;

/// Shared player capsule assets
#[derive(Resource)]
pub struct PlayerVisualAssets {
    mesh: Handle<Mesh>,
    local_material: Handle<StandardMaterial>,
    remote_material: Handle<StandardMaterial>,
}

pub fn setup_player_visual_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    // Capsule3d length is the cylinder part only
    let mesh = meshes.add(Capsule3d::new(PLAYER_RADIUS, PLAYER_HEIGHT - PLAYER_RADIUS * 2.0));
    let local_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.77, 0.47, 0.20),
        perceptual_roughness: 0.8,
        ..default()
    });
    let remote_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.30, 0.45, 0.70),
        perceptual_roughness: 0.8,
        ..default()
    });
    commands.insert_resource(PlayerVisualAssets {
        mesh,
        local_material,
        remote_material,
    });
}

pub fn spawn_scene(
    mut commands: Commands,
    roots: Query<Entity, With<SceneRoot>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if !roots.is_empty() {
        return;
    }

    commands
        .spawn((SceneRoot, Transform::default(), Visibility::default()))
        .with_children(|root| {
            root.spawn((
                Mesh3d(meshes.add(Plane3d::default().mesh().size(80.0, 80.0))),
                MeshMaterial3d(materials.add(StandardMaterial {
                    base_color: Color::srgb(0.55, 0.50, 0.42),
                    perceptual_roughness: 0.95,
                    ..default()
                })),
                Transform::default(),
            ));

            root.spawn((
                DirectionalLight {
                    shadows_enabled: true,
                    color: Color::srgb(1.0, 0.98, 0.92),
                    ..default()
                },
                Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, -0.7, 0.3, 0.0)),
            ));

            root.spawn((
                OverviewCamera,
                MainCamera,
                Camera3d::default(),
                Camera::default(),
                Transform::from_xyz(0.0, 12.0, 18.0).looking_at(Vec3::ZERO, Vec3::Y),
                SpatialListener::new(0.1),
            ));
        });

    commands.insert_resource(AmbientLight {
        color: Color::srgb(0.9, 0.85, 0.75),
        brightness: 80.0,
        affects_lightmapped_meshes: true,
    });

    info!("Spawned game scene visuals");
}

pub fn despawn_scene(mut commands: Commands, roots: Query<Entity, With<SceneRoot>>) {
    for entity in roots.iter() {
        commands.entity(entity).despawn();
    }
}

/// Give new players a body. Replicated players arrive without a transform.
pub fn attach_player_visuals(
    mut commands: Commands,
    assets: Option<Res<PlayerVisualAssets>>,
    spawned: Query<(Entity, Has<Transform>, Has<shared::LocalPlayer>), Added<Player>>,
) {
    let Some(assets) = assets else {
        return;
    };

    for (entity, has_transform, is_local) in spawned.iter() {
        let material = if is_local {
            assets.local_material.clone()
        } else {
            assets.remote_material.clone()
        };
        let mut player = commands.entity(entity);
        player.insert((
            Mesh3d(assets.mesh.clone()),
            MeshMaterial3d(material),
            Visibility::default(),
        ));
        if !has_transform {
            player.insert(Transform::from_translation(Vec3::from(SPAWN_POSITION)));
        }
    }
}

/// The overview camera comes back when no player rig is rendering
pub fn restore_overview_camera(
    mut commands: Commands,
    player_rigs: Query<&Camera, (With<MainCamera>, Without<OverviewCamera>)>,
    mut overview: Query<(Entity, &mut Camera, Has<SpatialListener>), With<OverviewCamera>>,
) {
    let rig_active = player_rigs.iter().any(|camera| camera.is_active);
    let Ok((entity, mut camera, has_listener)) = overview.single_mut() else {
        return;
    };
    if rig_active || camera.is_active {
        return;
    }
    camera.is_active = true;
    if !has_listener {
        commands.entity(entity).insert(SpatialListener::new(0.1));
    }
}
