//! Courtside sync: client-side live match state over a reconnecting stream.
//!
//! Responsibilities:
//! - owning the websocket lifecycle, with bounded reconnection and an observable terminal state
//! - normalizing the wire shapes the match server has used into one partial-update envelope
//! - merging partial updates into the ordered match collection field by field
//! - publishing each resulting snapshot, with its LIVE count, to registered observers
//!
//! Data flows one way: frame → [`protocol::normalize`] → [`merge()`] →
//! [`SnapshotStore`] → observers. The host drives [`Supervisor::connect`],
//! [`Supervisor::disconnect`] and [`Supervisor::send`]; everything else is
//! reported through [`SyncEvent`]s and [`SupervisorStatus`].

pub mod config;
pub mod endpoint;
pub mod error;
pub mod merge;
pub mod metrics;
pub mod model;
pub mod protocol;
pub mod store;
pub mod supervisor;
pub mod transport;

pub use config::{Backoff, SupervisorConfig};
pub use endpoint::{Endpoint, DEFAULT_STREAM_PATH};
pub use error::{EndpointError, ParseError, SyncError, TransportError};
pub use merge::{merge, merge_in_place};
pub use model::{Match, MatchStatus, MatchUpdate};
pub use protocol::normalize;
pub use store::{Snapshot, SnapshotStore, Subscription};
pub use supervisor::{ConnectionState, Supervisor, SupervisorStatus, SyncEvent};
pub use transport::{Connector, Link, LinkEvent, WebSocketConnector};
