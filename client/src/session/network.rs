//! Network session lifecycle
//!
//! [`NetworkSession`] decides when the transport starts and stops and keeps track of who
//! is connected. The transport and the pointer are passed in by the caller on every
//! operation; the session never goes looking for them.

use bevy::prelude::*;
use shared::ClientId;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

use super::config::{SessionConfig, SessionRole};
use super::transport::{Subscription, Transport, TransportError, TransportEvent};
use crate::pointer::PointerCapture;

/// How many times `disconnect` polls the transport before giving up
const SHUTDOWN_POLL_LIMIT: u32 = 200;
/// Wait between shutdown polls (bounds the blocking wait to ~2s)
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a {role:?} session is already running")]
    AlreadyActive { role: SessionRole },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("transport still listening after {polls} shutdown polls")]
    ShutdownStalled { polls: u32 },
}

/// Everything the session knows about the running transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    transport_active: bool,
    role: Option<SessionRole>,
    connected_client_ids: BTreeSet<ClientId>,
    local_client_id: Option<ClientId>,
}

/// Start/stop lifecycle of the transport plus session membership.
#[derive(Resource, Default)]
pub struct NetworkSession {
    state: SessionState,
    /// Held exactly while the transport runs
    subscription: Option<Subscription>,
    endpoint: Option<String>,
    /// A client link stays unconfirmed until the host accepts it
    link_established: bool,
    link_failure: Option<TransportError>,
}

impl NetworkSession {
    /// Listen on `port` as the host.
    pub fn start_as_host(
        &mut self,
        transport: &mut dyn Transport,
        pointer: &mut PointerCapture,
        port: u16,
    ) -> Result<(), SessionError> {
        self.ensure_idle()?;

        // Subscribe first so the host's own connect notification is not missed.
        let subscription = transport.subscribe();
        let local_id = match transport.listen(port) {
            Ok(id) => id,
            Err(err) => {
                transport.unsubscribe(subscription);
                warn!("Hosting on port {} failed: {}", port, err);
                return Err(err.into());
            }
        };

        self.enter_session(subscription, SessionRole::Host, local_id, format!("port {}", port));
        self.link_established = true;
        pointer.capture();
        info!("Hosting session on port {} as {}", port, local_id);
        Ok(())
    }

    /// Dial `address:port` as a client.
    ///
    /// The link is only confirmed once the host accepts it (see [`NetworkSession::pump`]);
    /// the pointer is captured then, and a link closing before that is a connect failure.
    pub fn start_as_client(
        &mut self,
        transport: &mut dyn Transport,
        address: &str,
        port: u16,
    ) -> Result<(), SessionError> {
        self.ensure_idle()?;

        let subscription = transport.subscribe();
        let local_id = match transport.dial(address, port) {
            Ok(id) => id,
            Err(err) => {
                transport.unsubscribe(subscription);
                warn!("Connecting to {}:{} failed: {}", address, port, err);
                return Err(err.into());
            }
        };

        self.enter_session(
            subscription,
            SessionRole::Client,
            local_id,
            format!("{}:{}", address, port),
        );
        info!("Dialing {}:{} as {}", address, port, local_id);
        Ok(())
    }

    /// Start whichever side the persisted config asks for.
    pub fn auto_start(
        &mut self,
        transport: &mut dyn Transport,
        pointer: &mut PointerCapture,
        config: &SessionConfig,
    ) -> Result<(), SessionError> {
        match config.role {
            SessionRole::Host => self.start_as_host(transport, pointer, config.port),
            SessionRole::Client => {
                self.start_as_client(transport, &config.server_address, config.port)
            }
        }
    }

    /// Shut the transport down and wait until it stops listening.
    ///
    /// Also stops a transport that is still listening although no session was started
    /// through this object (left over from an earlier scene).
    pub fn disconnect(&mut self, transport: &mut dyn Transport) -> Result<(), SessionError> {
        if self.state.transport_active || transport.is_listening() {
            if !self.state.transport_active {
                warn!("Transport still listening without an active session; forcing shutdown");
            }
            transport.shutdown();

            let mut polls = 0;
            loop {
                transport.poll();
                if !transport.is_listening() {
                    break;
                }
                polls += 1;
                if polls >= SHUTDOWN_POLL_LIMIT {
                    error!("Transport did not stop after {} polls", polls);
                    return Err(SessionError::ShutdownStalled { polls });
                }
                std::thread::sleep(SHUTDOWN_POLL_INTERVAL);
            }
            info!(
                "Session closed ({} client(s) were connected)",
                self.state.connected_client_ids.len()
            );
        }

        if let Some(subscription) = self.subscription.take() {
            transport.unsubscribe(subscription);
        }
        self.clear();
        Ok(())
    }

    /// Forget the session without touching a transport.
    ///
    /// For scenes that have no transport subsystem to shut down; whatever was running is
    /// left to the scene that owned it.
    pub fn abandon(&mut self) {
        if self.state.transport_active {
            warn!(
                "Abandoning {:?} session without a transport to shut down",
                self.state.role
            );
        }
        // Dropping the subscription ends delivery
        self.subscription = None;
        self.clear();
    }

    fn clear(&mut self) {
        self.state = SessionState::default();
        self.endpoint = None;
        self.link_established = false;
        self.link_failure = None;
    }

    /// Apply every transport event delivered since the last call.
    ///
    /// A client's own connect confirms its link and captures the pointer. Returns how
    /// many events were handled.
    pub fn pump(&mut self, pointer: &mut PointerCapture) -> usize {
        let Some(subscription) = self.subscription.as_ref() else {
            return 0;
        };
        let events = subscription.drain();
        let count = events.len();

        for event in events {
            match event {
                TransportEvent::ClientConnected(id) => {
                    self.on_client_connected(id);
                    if !self.link_established && self.state.local_client_id == Some(id) {
                        info!("Link to {} established", self.endpoint().unwrap_or("host"));
                        self.link_established = true;
                        pointer.capture();
                    }
                }
                TransportEvent::ClientDisconnected(id) => self.on_client_disconnected(id),
                TransportEvent::LinkClosed { reason } => self.on_link_closed(reason),
            }
        }
        count
    }

    fn on_client_connected(&mut self, id: ClientId) {
        if self.state.connected_client_ids.insert(id) {
            info!("Client {} connected ({} total)", id, self.state.connected_client_ids.len());
        }
    }

    fn on_link_closed(&mut self, reason: String) {
        let failure = if self.link_established {
            TransportError::LinkLost { reason }
        } else {
            TransportError::ConnectFailed {
                address: self.endpoint.clone().unwrap_or_default(),
                reason,
            }
        };
        warn!("Session link closed: {}", failure);
        self.link_failure = Some(failure);
    }

    fn on_client_disconnected(&mut self, id: ClientId) {
        if self.state.connected_client_ids.remove(&id) {
            info!("Client {} disconnected ({} left)", id, self.state.connected_client_ids.len());
        }
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        match (self.state.transport_active, self.state.role) {
            (true, Some(role)) => Err(SessionError::AlreadyActive { role }),
            _ => Ok(()),
        }
    }

    fn enter_session(
        &mut self,
        subscription: Subscription,
        role: SessionRole,
        local_id: ClientId,
        endpoint: String,
    ) {
        self.subscription = Some(subscription);
        self.state.role = Some(role);
        self.state.local_client_id = Some(local_id);
        self.state.transport_active = true;
        self.endpoint = Some(endpoint);
        self.link_established = false;
        self.link_failure = None;
    }

    // --- Status queries ---

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_transport_active(&self) -> bool {
        self.state.transport_active
    }

    pub fn role(&self) -> Option<SessionRole> {
        self.state.role
    }

    pub fn local_client_id(&self) -> Option<ClientId> {
        self.state.local_client_id
    }

    pub fn connected_client_ids(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.state.connected_client_ids.iter().copied()
    }

    pub fn connected_count(&self) -> usize {
        self.state.connected_client_ids.len()
    }

    /// Human-readable address of the session ("port 7777" or "10.0.0.5:7777")
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// The link closed underneath an active session
    pub fn link_lost(&self) -> bool {
        self.link_failure.is_some()
    }

    /// Why the link closed: `ConnectFailed` if it never came up, `LinkLost` otherwise
    pub fn link_failure(&self) -> Option<&TransportError> {
        self.link_failure.as_ref()
    }

    /// Active and confirmed by the other end
    pub fn is_connected(&self) -> bool {
        self.state.transport_active && self.link_established
    }
}
