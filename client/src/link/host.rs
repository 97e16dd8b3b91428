//! Host side of the Lightyear transport: the listening server link, its client links,
//! and the player entities the host spawns for every member of its session.

use bevy::prelude::*;
use lightyear::prelude::*;
use lightyear::prelude::server::*;
use shared::{
    host_bind_addr, tick_duration, ClientId, Player, PRIVATE_KEY, PROTOCOL_ID, SPAWN_POSITION,
    SPAWN_SPACING,
};
use std::net::{SocketAddr, UdpSocket};

use super::{SessionLink, TransportSubsystem};
use crate::session::TransportError;

/// Spawn and start the server link listening on `port`
pub(super) fn spawn_server_link(world: &mut World, port: u16) -> Result<Entity, TransportError> {
    let bind_addr: SocketAddr = format!("{}:{}", host_bind_addr(), port)
        .parse()
        .map_err(|e| TransportError::BindFailed {
            port,
            reason: format!("invalid bind address: {}", e),
        })?;

    // Bind once up front so "address in use" reaches the caller now
    let socket = UdpSocket::bind(bind_addr).map_err(|e| TransportError::BindFailed {
        port,
        reason: e.to_string(),
    })?;
    drop(socket);

    info!("Spawning server link, binding to {:?}", bind_addr);
    let server = world
        .spawn((
            SessionLink,
            Server::default(),
            ServerUdpIo::default(),
            LocalAddr(bind_addr),
            NetcodeServer::new(NetcodeConfig {
                protocol_id: PROTOCOL_ID,
                private_key: PRIVATE_KEY,
                ..default()
            }),
        ))
        .id();

    world.trigger(Start { entity: server });
    world.flush();
    Ok(server)
}

/// Every client link currently attached to a server
pub(super) fn client_links(world: &mut World) -> Vec<Entity> {
    world
        .query_filtered::<Entity, With<ClientOf>>()
        .iter(world)
        .collect()
}

fn spawn_point(index: usize) -> Vec3 {
    Vec3::from(SPAWN_POSITION) + Vec3::X * SPAWN_SPACING * index as f32
}

/// The host's own player, replicated to everyone
pub fn spawn_host_player(world: &mut World) {
    let already_spawned = world
        .query::<&Player>()
        .iter(world)
        .any(|p| p.owner() == ClientId::HOST);
    if already_spawned {
        return;
    }

    world.spawn((
        Player {
            client_id: PeerId::Server,
        },
        Transform::from_translation(spawn_point(0)),
        Replicate::new(ReplicationMode::SingleServer(NetworkTarget::All)),
    ));
    info!("Spawned host player");
}

/// Turn Lightyear client-link changes into transport events, and spawn/despawn the
/// matching replicated players.
pub fn forward_host_link_events(
    mut commands: Commands,
    mut links: ResMut<TransportSubsystem>,
    joined: Query<(Entity, &RemoteId), (With<ClientOf>, Added<Connected>)>,
    dropped: Query<Entity, (With<ClientOf>, Added<Disconnected>)>,
    mut removed: RemovedComponents<ClientOf>,
    players: Query<(Entity, &Player)>,
) {
    for (link, remote_id) in joined.iter() {
        let peer_id = remote_id.0;
        let id = ClientId::from(peer_id);
        info!("Client link connected: {:?}", peer_id);

        // Replication out: host -> this client
        commands.entity(link).insert(ReplicationSender::new(
            tick_duration(),
            SendUpdatesMode::SinceLastAck,
            false,
        ));

        links.peer_joined(link, id);

        if !players.iter().any(|(_, p)| p.client_id == peer_id) {
            commands.spawn((
                Player { client_id: peer_id },
                Transform::from_translation(spawn_point(links.connected.len())),
                Replicate::new(ReplicationMode::SingleServer(NetworkTarget::All)),
            ));
        }
    }

    for link in dropped.iter().chain(removed.read()) {
        let Some(id) = links.peer_left(link) else {
            continue;
        };
        info!("Client link dropped: {}", id);
        for (entity, player) in players.iter() {
            if player.owner() == id {
                commands.entity(entity).despawn();
            }
        }
    }
}
