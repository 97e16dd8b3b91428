//! Lightyear transport
//!
//! [`TransportSubsystem`] is the scene's transport object: it remembers which Lightyear
//! link entities the session spawned and fans connect/disconnect notifications out to
//! subscribers. [`LightyearTransport`] implements the session's [`Transport`] boundary
//! on top of it with direct `World` access, so a shutdown completes synchronously.

mod dial;
mod host;

use bevy::prelude::*;
use shared::ClientId;
use std::collections::{BTreeSet, HashMap};

use crate::session::{EventHub, Subscription, Transport, TransportError, TransportEvent};

pub use dial::forward_client_link_events;
pub use host::{forward_host_link_events, spawn_host_player};

/// Marker for the Lightyear server/client entities owned by the session
#[derive(Component)]
pub struct SessionLink;

/// The transport subsystem of the game scene.
///
/// Disabled means fully off: no new links can be opened and the bridge systems don't run.
#[derive(Resource, Default)]
pub struct TransportSubsystem {
    enabled: bool,
    hub: EventHub,
    server: Option<Entity>,
    client: Option<Entity>,
    local_id: Option<ClientId>,
    /// Host side: connected client link entity -> peer
    peers: HashMap<Entity, ClientId>,
    connected: BTreeSet<ClientId>,
    listening: bool,
    /// Entities torn down by the last shutdown, awaiting acknowledgement
    stopping: Option<Vec<Entity>>,
}

impl TransportSubsystem {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!("Transport subsystem {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
    }

    fn peer_joined(&mut self, link: Entity, id: ClientId) {
        self.peers.insert(link, id);
        if self.connected.insert(id) {
            self.hub.publish(TransportEvent::ClientConnected(id));
        }
    }

    fn peer_left(&mut self, link: Entity) -> Option<ClientId> {
        let id = self.peers.remove(&link)?;
        if self.connected.remove(&id) {
            self.hub.publish(TransportEvent::ClientDisconnected(id));
        }
        Some(id)
    }

    fn own_link_connected(&mut self) {
        let Some(id) = self.local_id else {
            return;
        };
        if self.connected.insert(id) {
            self.hub.publish(TransportEvent::ClientConnected(id));
        }
    }

    fn own_link_closed(&mut self, reason: &str) {
        if let Some(id) = self.local_id {
            if self.connected.remove(&id) {
                self.hub.publish(TransportEvent::ClientDisconnected(id));
            }
        }
        self.hub.publish(TransportEvent::LinkClosed {
            reason: reason.to_string(),
        });
    }
}

/// Run condition: the transport subsystem exists and is enabled
pub fn transport_enabled(links: Option<Res<TransportSubsystem>>) -> bool {
    links.is_some_and(|l| l.is_enabled())
}

/// [`Transport`] over the Lightyear entities in `world`.
pub struct LightyearTransport<'w> {
    world: &'w mut World,
}

impl<'w> LightyearTransport<'w> {
    pub fn new(world: &'w mut World) -> Self {
        Self { world }
    }

    /// Whether the scene has a transport subsystem at all
    pub fn is_present(&self) -> bool {
        self.world.contains_resource::<TransportSubsystem>()
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.world
    }

    fn ensure_enabled(&self) -> Result<(), TransportError> {
        match self.world.get_resource::<TransportSubsystem>() {
            None => Err(TransportError::Unavailable),
            Some(links) if !links.is_enabled() => Err(TransportError::Disabled),
            Some(_) => Ok(()),
        }
    }

    fn links_mut(&mut self) -> Result<Mut<'_, TransportSubsystem>, TransportError> {
        self.world
            .get_resource_mut::<TransportSubsystem>()
            .ok_or(TransportError::Unavailable)
    }
}

impl Transport for LightyearTransport<'_> {
    fn listen(&mut self, port: u16) -> Result<ClientId, TransportError> {
        self.ensure_enabled()?;
        let server = host::spawn_server_link(self.world, port)?;

        let mut links = self.links_mut()?;
        links.server = Some(server);
        links.local_id = Some(ClientId::HOST);
        links.listening = true;
        links.stopping = None;
        // The host is a member of its own session
        if links.connected.insert(ClientId::HOST) {
            links.hub.publish(TransportEvent::ClientConnected(ClientId::HOST));
        }
        Ok(ClientId::HOST)
    }

    fn dial(&mut self, address: &str, port: u16) -> Result<ClientId, TransportError> {
        self.ensure_enabled()?;
        let (client, local_id) = dial::spawn_client_link(self.world, address, port)?;

        let mut links = self.links_mut()?;
        links.client = Some(client);
        links.local_id = Some(local_id);
        links.listening = true;
        links.stopping = None;
        Ok(local_id)
    }

    fn shutdown(&mut self) {
        let mut doomed: Vec<Entity> = match self.world.get_resource_mut::<TransportSubsystem>() {
            Some(mut links) => {
                let peers: Vec<Entity> = links.peers.drain().map(|(link, _)| link).collect();
                links
                    .client
                    .take()
                    .into_iter()
                    .chain(links.server.take())
                    .chain(peers)
                    .collect()
            }
            None => return,
        };
        // Links the bridge has not seen yet
        doomed.extend(host::client_links(self.world));

        for entity in &doomed {
            if let Ok(link) = self.world.get_entity_mut(*entity) {
                link.despawn();
            }
        }
        debug!("Transport shutdown issued for {} link entities", doomed.len());

        if let Some(mut links) = self.world.get_resource_mut::<TransportSubsystem>() {
            links.stopping = Some(doomed);
        }
    }

    fn poll(&mut self) {
        self.world.flush();

        let Some(pending) = self
            .world
            .get_resource::<TransportSubsystem>()
            .and_then(|links| links.stopping.clone())
        else {
            return;
        };
        if pending.iter().any(|e| self.world.get_entity(*e).is_ok()) {
            return;
        }

        if let Some(mut links) = self.world.get_resource_mut::<TransportSubsystem>() {
            links.stopping = None;
            links.listening = false;
            links.local_id = None;
            links.connected.clear();
            debug!("Transport shutdown acknowledged");
        }
    }

    fn is_listening(&self) -> bool {
        self.world
            .get_resource::<TransportSubsystem>()
            .is_some_and(|links| links.listening)
    }

    fn connected_clients(&self) -> Vec<ClientId> {
        self.world
            .get_resource::<TransportSubsystem>()
            .map(|links| links.connected.iter().copied().collect())
            .unwrap_or_default()
    }

    fn subscribe(&mut self) -> Subscription {
        match self.world.get_resource_mut::<TransportSubsystem>() {
            Some(mut links) => links.hub.subscribe(),
            // Nothing will ever publish to it
            None => EventHub::default().subscribe(),
        }
    }

    fn unsubscribe(&mut self, subscription: Subscription) {
        if let Some(mut links) = self.world.get_resource_mut::<TransportSubsystem>() {
            links.hub.unsubscribe(subscription);
        }
    }
}
