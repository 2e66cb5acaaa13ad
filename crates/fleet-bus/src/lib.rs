//! # Fleet Bus - Command Bus Between Main and Workers
//!
//! Best-effort signaling over a broadcast pub/sub backend.
//!
//! ```text
//! ┌──────────────┐  publish_command()   ┌──────────────────┐
//! │  Publisher   │ ───────────────────→ │  <prefix>.commands│ ──→ every Subscriber
//! │ (stamps id)  │                      └──────────────────┘      (self-origin dropped)
//! │              │  publish_worker_     ┌────────────────────────┐
//! │              │  response()  ──────→ │ <prefix>.worker-response│ ──→ main only
//! └──────────────┘                      └────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! - **Regular mode** never opens a transport connection; publishes are no-ops.
//! - **Sender identity** is stamped by the [`Publisher`], never by callers.
//! - **Per-message failures** (decode, handler) stay inside the receive loop.
//! - **No durability**: a command published while a receiver reconnects is lost.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod memory;
pub mod publisher;
pub mod redis_transport;
pub mod registry;
pub mod sink;
pub mod subscriber;
pub mod transport;

// Re-export main types
pub use channel::{Channel, ChannelNames};
pub use config::{BusConfig, ReconnectPolicy};
pub use dispatcher::{DiscardReason, DispatchOutcome, Dispatcher};
pub use error::{BusError, ConfigurationError, HandlerError, TransportError};
pub use memory::InMemoryBroker;
pub use publisher::Publisher;
pub use redis_transport::RedisTransport;
pub use registry::{CommandHandler, CommandRegistry, WorkerResponseHandler};
pub use sink::{EventSink, LogSink};
pub use subscriber::{Subscriber, SubscriberState};
pub use transport::{ClientPurpose, MessageStream, PubSubClient, TransportProvider};

/// Channel namespace used when none is configured.
pub const DEFAULT_CHANNEL_PREFIX: &str = "fleet";

/// Maximum messages buffered per in-memory channel before receivers lag.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
