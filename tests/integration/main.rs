//! Workspace-level integration tests

mod concurrency;
mod pipeline;
