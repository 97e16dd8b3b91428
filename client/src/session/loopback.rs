//! In-process transport used by the session tests
//!
//! Behaves like a transport with no wire: the host is listening as soon as `listen`
//! returns, dialed links connect when the test says so, and shutdown completes after a
//! configurable number of polls.

use shared::ClientId;
use std::collections::{BTreeSet, HashSet};

use super::transport::{EventHub, Subscription, Transport, TransportError, TransportEvent};

pub struct LoopbackTransport {
    hub: EventHub,
    listening: bool,
    listening_port: Option<u16>,
    last_dial: Option<(String, u16)>,
    assigned_id: ClientId,
    local_id: Option<ClientId>,
    connected: BTreeSet<ClientId>,
    ports_in_use: HashSet<u16>,
    unreachable: HashSet<String>,
    shutdown_latency: u32,
    shutdown_remaining: Option<u32>,
    polls: u32,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            hub: EventHub::default(),
            listening: false,
            listening_port: None,
            last_dial: None,
            assigned_id: ClientId(1),
            local_id: None,
            connected: BTreeSet::new(),
            ports_in_use: HashSet::new(),
            unreachable: HashSet::new(),
            shutdown_latency: 0,
            shutdown_remaining: None,
            polls: 0,
        }
    }

    /// Id handed to this process when it dials
    pub fn assigning(mut self, id: ClientId) -> Self {
        self.assigned_id = id;
        self
    }

    pub fn with_port_in_use(mut self, port: u16) -> Self {
        self.ports_in_use.insert(port);
        self
    }

    pub fn with_unreachable(mut self, address: &str) -> Self {
        self.unreachable.insert(address.to_string());
        self
    }

    /// Extra polls needed before a shutdown is acknowledged
    pub fn with_shutdown_latency(mut self, polls: u32) -> Self {
        self.shutdown_latency = polls;
        self
    }

    pub fn last_dial(&self) -> Option<(&str, u16)> {
        self.last_dial.as_ref().map(|(a, p)| (a.as_str(), *p))
    }

    pub fn listening_port(&self) -> Option<u16> {
        self.listening_port
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn live_subscribers(&self) -> usize {
        self.hub.live_subscribers()
    }

    /// The dialed host accepted us
    pub fn accept_dial(&mut self) {
        if let Some(id) = self.local_id {
            self.peer_joins(id);
        }
    }

    pub fn peer_joins(&mut self, id: ClientId) {
        if self.connected.insert(id) {
            self.hub.publish(TransportEvent::ClientConnected(id));
        }
    }

    pub fn peer_leaves(&mut self, id: ClientId) {
        if self.connected.remove(&id) {
            self.hub.publish(TransportEvent::ClientDisconnected(id));
        }
    }

    /// The remote end went away
    pub fn drop_link(&mut self, reason: &str) {
        if let Some(id) = self.local_id {
            self.peer_leaves(id);
        }
        self.hub.publish(TransportEvent::LinkClosed {
            reason: reason.to_string(),
        });
    }
}

impl Transport for LoopbackTransport {
    fn listen(&mut self, port: u16) -> Result<ClientId, TransportError> {
        if self.ports_in_use.contains(&port) {
            return Err(TransportError::BindFailed {
                port,
                reason: "address already in use".to_string(),
            });
        }
        self.listening = true;
        self.listening_port = Some(port);
        self.local_id = Some(ClientId::HOST);
        self.peer_joins(ClientId::HOST);
        Ok(ClientId::HOST)
    }

    fn dial(&mut self, address: &str, port: u16) -> Result<ClientId, TransportError> {
        self.last_dial = Some((address.to_string(), port));
        if self.unreachable.contains(address) {
            return Err(TransportError::ConnectFailed {
                address: format!("{}:{}", address, port),
                reason: "connection refused".to_string(),
            });
        }
        self.listening = true;
        self.local_id = Some(self.assigned_id);
        Ok(self.assigned_id)
    }

    fn shutdown(&mut self) {
        if self.listening && self.shutdown_remaining.is_none() {
            self.shutdown_remaining = Some(self.shutdown_latency);
        }
    }

    fn poll(&mut self) {
        self.polls += 1;
        match self.shutdown_remaining {
            Some(0) => {
                self.shutdown_remaining = None;
                self.listening = false;
                self.listening_port = None;
                self.local_id = None;
                self.connected.clear();
            }
            Some(n) => self.shutdown_remaining = Some(n - 1),
            None => {}
        }
    }

    fn is_listening(&self) -> bool {
        self.listening
    }

    fn connected_clients(&self) -> Vec<ClientId> {
        self.connected.iter().copied().collect()
    }

    fn subscribe(&mut self) -> Subscription {
        self.hub.subscribe()
    }

    fn unsubscribe(&mut self, subscription: Subscription) {
        self.hub.unsubscribe(subscription);
    }
}
