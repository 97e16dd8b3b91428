//! The transport boundary
//!
//! The session only talks to the network layer through [`Transport`]. Connect and
//! disconnect notifications are delivered through a [`Subscription`] that the session
//! holds for exactly as long as the transport is running.

use crossbeam_channel::{Receiver, Sender};
use shared::ClientId;
use std::sync::{Arc, Weak};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("could not bind port {port}: {reason}")]
    BindFailed { port: u16, reason: String },
    #[error("could not connect to {address}: {reason}")]
    ConnectFailed { address: String, reason: String },
    #[error("connection lost: {reason}")]
    LinkLost { reason: String },
    #[error("transport subsystem is disabled")]
    Disabled,
    #[error("no transport subsystem in this scene")]
    Unavailable,
}

/// Notifications published by a running transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    ClientConnected(ClientId),
    ClientDisconnected(ClientId),
    /// The link went away without a local shutdown (peer dropped us, dial refused).
    LinkClosed { reason: String },
}

/// Operations the session needs from the network layer.
pub trait Transport {
    /// Listen on `port` as the host. Returns the host's own client id.
    fn listen(&mut self, port: u16) -> Result<ClientId, TransportError>;

    /// Dial `address:port` as a client. Returns the id assigned to this process.
    fn dial(&mut self, address: &str, port: u16) -> Result<ClientId, TransportError>;

    /// Begin shutting down. Completion is observed through [`Transport::is_listening`].
    fn shutdown(&mut self);

    /// Advance pending work (shutdown acknowledgement in particular).
    fn poll(&mut self);

    fn is_listening(&self) -> bool;

    fn connected_clients(&self) -> Vec<ClientId>;

    fn subscribe(&mut self) -> Subscription;

    fn unsubscribe(&mut self, subscription: Subscription);
}

/// A live registration for transport events.
///
/// Dropping it (or handing it back through [`Transport::unsubscribe`]) ends delivery.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: Receiver<TransportEvent>,
    _alive: Arc<()>,
}

impl Subscription {
    /// Everything delivered since the last drain, in order.
    pub fn drain(&self) -> Vec<TransportEvent> {
        self.receiver.try_iter().collect()
    }
}

struct Subscriber {
    id: u64,
    sender: Sender<TransportEvent>,
    alive: Weak<()>,
}

/// Fan-out of transport events to current subscribers
#[derive(Default)]
pub struct EventHub {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

impl EventHub {
    pub fn subscribe(&mut self) -> Subscription {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let alive = Arc::new(());
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            sender,
            alive: Arc::downgrade(&alive),
        });
        Subscription {
            id,
            receiver,
            _alive: alive,
        }
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) {
        self.subscribers.retain(|s| s.id != subscription.id);
    }

    pub fn publish(&mut self, event: TransportEvent) {
        self.prune();
        for subscriber in &self.subscribers {
            // A failed send means the receiver is gone; prune catches it next time.
            let _ = subscriber.sender.send(event.clone());
        }
    }

    /// Number of subscriptions still held by someone.
    pub fn live_subscribers(&self) -> usize {
        self.subscribers
            .iter()
            .filter(|s| s.alive.strong_count() > 0)
            .count()
    }

    fn prune(&mut self) {
        self.subscribers.retain(|s| s.alive.strong_count() > 0);
    }
}
