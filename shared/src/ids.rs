//! Client identity within a session

use lightyear::prelude::PeerId;
use std::fmt;

/// Identity of one participant in a session.
///
/// Every transport peer id collapses into a plain `u64` so that ownership checks do not
/// depend on which transport backend produced the id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl ClientId {
    /// The hosting process. Offline play reuses it as its own identity.
    pub const HOST: ClientId = ClientId(0);
}

impl From<PeerId> for ClientId {
    fn from(peer_id: PeerId) -> Self {
        let raw = match peer_id {
            PeerId::Netcode(id) => id,
            PeerId::Steam(id) => id,
            PeerId::Local(id) => id,
            PeerId::Entity(id) => id,
            PeerId::Raw(addr) => {
                // Hash the socket address to a u64
                use std::hash::{Hash, Hasher};
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                addr.hash(&mut hasher);
                hasher.finish()
            }
            PeerId::Server => 0,
        };
        ClientId(raw)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_peer_is_host() {
        assert_eq!(ClientId::from(PeerId::Server), ClientId::HOST);
    }

    #[test]
    fn test_netcode_peer_keeps_raw_id() {
        assert_eq!(ClientId::from(PeerId::Netcode(42)), ClientId(42));
        assert_eq!(ClientId::from(PeerId::Local(7)), ClientId(7));
    }
}
