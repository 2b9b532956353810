//! Real-time slice sync: every committed change reaches every viewer.

mod publisher;
mod reconnect;
mod snapshot;

pub use publisher::{Subscription, SyncPublisher};
pub use reconnect::{BackoffPolicy, ReconnectingSubscription, SnapshotFeed, SnapshotStream};
pub use snapshot::SliceSnapshot;
