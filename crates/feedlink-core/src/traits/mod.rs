//! Collaborator traits — the seams between the client facade and the outside world.

pub mod identity;
pub mod transport;

pub use identity::{IdentityProvider, StaticIdentity};
pub use transport::{ChannelHandle, EventSink, Transport, TransportEvent, TransportEventKind};
