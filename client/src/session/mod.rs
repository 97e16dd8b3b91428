//! Network session: persisted connection parameters, the transport boundary and the
//! session lifecycle built on top of it.

pub mod config;
#[cfg(test)]
pub mod loopback;
pub mod network;
pub mod transport;

pub use config::{prefs_path, Preferences, SessionConfig, SessionRole};
pub use network::NetworkSession;
pub use transport::{EventHub, Subscription, Transport, TransportError, TransportEvent};
