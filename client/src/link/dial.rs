//! Client side of the Lightyear transport: dialing a host and watching our own link.

use bevy::prelude::*;
use lightyear::prelude::*;
use lightyear::prelude::client::*;
use shared::{ClientId, PRIVATE_KEY, PROTOCOL_ID};
use std::net::{SocketAddr, ToSocketAddrs};

use super::{SessionLink, TransportSubsystem};
use crate::session::TransportError;

/// Spawn a client link dialing `address:port` and trigger the connect.
///
/// Returns the link entity and the id this process will be known by.
pub(super) fn spawn_client_link(
    world: &mut World,
    address: &str,
    port: u16,
) -> Result<(Entity, ClientId), TransportError> {
    let target = format!("{}:{}", address, port);
    let connect_failed = |reason: String| TransportError::ConnectFailed {
        address: target.clone(),
        reason,
    };

    let server_addr: SocketAddr = (address, port)
        .to_socket_addrs()
        .map_err(|e| connect_failed(e.to_string()))?
        .next()
        .ok_or_else(|| connect_failed("address did not resolve".to_string()))?;
    let local_addr = SocketAddr::from(([0, 0, 0, 0], 0));

    // Netcode client ids are picked by the client
    let client_id = rand::random::<u64>();

    let auth = Authentication::Manual {
        server_addr,
        protocol_id: PROTOCOL_ID,
        private_key: PRIVATE_KEY,
        client_id,
    };
    let netcode = NetcodeClient::new(auth, NetcodeConfig::default())
        .map_err(|e| connect_failed(format!("netcode setup failed: {:?}", e)))?;

    let client = world
        .spawn((
            SessionLink,
            Client::default(),
            UdpIo::default(),
            LocalAddr(local_addr),
            PeerAddr(server_addr),
            netcode,
            // Without this the client never receives replicated players
            ReplicationReceiver::default(),
        ))
        .id();

    world.trigger(Connect { entity: client });
    world.flush();

    info!("Client link spawned towards {}, client_id: {}", server_addr, client_id);
    Ok((client, ClientId(client_id)))
}

/// Turn our own client link's connect/disconnect into transport events
pub fn forward_client_link_events(
    mut links: ResMut<TransportSubsystem>,
    connected: Query<(), (With<SessionLink>, With<Client>, Added<Connected>)>,
    disconnected: Query<Ref<Client>, (With<SessionLink>, Added<Disconnected>)>,
) {
    if !connected.is_empty() {
        info!("Connected to host!");
        links.own_link_connected();
    }

    // A link that starts out disconnected has not failed yet
    if disconnected.iter().any(|client| !client.is_added()) {
        warn!("Connection failed or disconnected");
        links.own_link_closed("connection to host failed or was closed");
    }
}
