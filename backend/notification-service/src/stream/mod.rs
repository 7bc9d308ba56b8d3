/// Real-time notification streams
///
/// Architecture:
/// 1. StreamConnection: one Server-Sent Events channel to one client, with a lifecycle
/// 2. SubscriptionRegistry: user id -> open connections, copy-on-write snapshots
/// 3. StreamHub: opens connections and drives every one of them to a terminal state
/// 4. FrameSink: the transport seam, backed by the HTTP response body in production
pub mod connection;
pub mod frames;
pub mod hub;
pub mod registry;
pub mod sink;

pub use connection::{ConnectionId, ConnectionState, StreamConnection};
pub use frames::StreamFrame;
pub use hub::{StreamHub, StreamSettings};
pub use registry::{ConnectionSnapshot, SubscriptionRegistry};
pub use sink::{ChannelSink, FrameSink};
