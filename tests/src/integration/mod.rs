//! # Integration Scenarios
//!
//! Main and workers as separate [`BusContext`](fleet_node::BusContext)s on a
//! shared in-memory broker.
//!
//! - `command_flow` - self-filtering, targeting, main-side handlers
//! - `worker_responses` - answers reach main only
//! - `resilience` - bad input, failing handlers, dropped subscriptions, shutdown

pub mod command_flow;
pub mod resilience;
pub mod worker_responses;
