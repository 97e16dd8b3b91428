//! Types shared by every process taking part in a session
//!
//! Protocol registration, replicated components and the client identity type.

pub mod components;
pub mod ids;
pub mod player;
pub mod protocol;

pub use components::*;
pub use ids::ClientId;
pub use player::*;
pub use protocol::*;
