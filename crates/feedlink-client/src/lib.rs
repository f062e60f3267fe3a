//! # FeedLink Client
//! Keeps a notification feed current: live channel with heartbeat and
//! reconnect, snapshot polling, and optimistic acknowledgements.

pub mod api;
pub mod backoff;
pub mod events;
pub mod facade;
pub mod notify;
pub mod optimistic;
pub mod snapshot;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{FeedApi, HttpFeedApi};
pub use backoff::ReconnectPolicy;
pub use events::{FeedEvent, FeedView, Subscription};
pub use facade::{Collaborators, FeedClient};
pub use notify::{DesktopNotifier, LogNotifier, NoopNotifier, Notifier};
pub use optimistic::{AckScope, PendingAcks, TentativeAck};
pub use snapshot::SnapshotLoader;
pub use store::{FeedStore, MergeOutcome};
