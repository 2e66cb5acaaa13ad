//! # Fleet Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # In-memory fleet: broker, nodes, recording services
//! └── integration/      # Main and workers talking over one broker
//!     ├── command_flow.rs
//!     ├── worker_responses.rs
//!     └── resilience.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p fleet-tests
//!
//! # By category
//! cargo test -p fleet-tests integration::command_flow
//!
//! # Benchmarks
//! cargo bench -p fleet-tests
//! ```

pub mod harness;
pub mod integration;
