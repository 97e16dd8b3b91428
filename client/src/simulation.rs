//! Offline single-player simulation
//!
//! While active it owns one player entity (identity [`ClientId::HOST`]) and moves it
//! from the sampled input. It never touches the network.

use bevy::prelude::*;
use lightyear::prelude::PeerId;
use shared::{Player, PLAYER_SPEED, SPAWN_POSITION};

use crate::authority::InputSampler;

/// Marker for the player spawned by the offline simulation
#[derive(Component)]
pub struct OfflinePlayer;

#[derive(Resource, Debug, Default)]
pub struct SinglePlayerSimulation {
    active: bool,
}

impl SinglePlayerSimulation {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        if self.active != active {
            info!("Single-player simulation {}", if active { "activated" } else { "deactivated" });
        }
        self.active = active;
    }
}

/// Spawn the offline player when the simulation activates, remove it when it stops
pub fn sync_offline_player(
    mut commands: Commands,
    simulation: Option<Res<SinglePlayerSimulation>>,
    offline_players: Query<Entity, With<OfflinePlayer>>,
) {
    let active = simulation.is_some_and(|sim| sim.is_active());

    if active && offline_players.is_empty() {
        commands.spawn((
            OfflinePlayer,
            Player {
                client_id: PeerId::Local(0),
            },
            Transform::from_translation(Vec3::from(SPAWN_POSITION)),
        ));
        info!("Spawned offline player");
    } else if !active {
        for entity in offline_players.iter() {
            commands.entity(entity).despawn();
        }
    }
}

/// Move the offline player from its sampled input
pub fn move_offline_player(
    time: Res<Time>,
    mut players: Query<(&InputSampler, &mut Transform), With<OfflinePlayer>>,
) {
    for (sampler, mut transform) in players.iter_mut() {
        let movement = sampler.movement();
        if movement == Vec2::ZERO {
            continue;
        }
        // Forward is -Z, strafe is +X
        let step = Vec3::new(movement.x, 0.0, -movement.y) * PLAYER_SPEED * time.delta_secs();
        transform.translation += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_player_follows_activation() {
        let mut app = App::new();
        app.init_resource::<SinglePlayerSimulation>();
        app.add_systems(Update, sync_offline_player);

        app.update();
        let count = |app: &mut App| {
            let world = app.world_mut();
            world.query::<&OfflinePlayer>().iter(world).count()
        };
        assert_eq!(count(&mut app), 0);

        app.world_mut().resource_mut::<SinglePlayerSimulation>().set_active(true);
        app.update();
        app.update();
        assert_eq!(count(&mut app), 1);

        app.world_mut().resource_mut::<SinglePlayerSimulation>().set_active(false);
        app.update();
        assert_eq!(count(&mut app), 0);
    }
}
