//! Conduit: heterogeneous execution resources
//!
//! Facade over the workspace crates:
//! - [`conduit_resources`] - resources, events, stream pools and backends
//! - [`conduit_tracing`] - shared subscriber setup and timing helpers

pub use conduit_resources::*;
pub use conduit_tracing as telemetry;
