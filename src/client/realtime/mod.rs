//! # Realtime Updates
//!
//! Server-pushed task mutations.
//!
//! - **Channel**: reconnecting connection and subscriber fan-out
//! - **Transport**: how a connection is opened and framed
//! - **Feed**: filtered accumulation for a set of task ids

pub mod channel;
pub mod feed;
pub mod transport;

pub use channel::{ConnectionStatus, RealtimeChannel, Subscription};
pub use feed::TaskUpdateFeed;
pub use transport::{
    HttpPushTransport, LineBuffer, PushScheme, PushStream, PushTransport, WsPushTransport,
};
