//! Retention and garbage collection for CI test logs.
//!
//! Tests and their logs are removed once they pass the retention cutoff,
//! unless the test was flagged failed. Per-build cleanup jobs consult the CI
//! task-status authority and either delete a successful build's data or flag
//! its tests so retention keeps them.

pub mod config;
pub mod db;
pub mod events;
pub mod jobs;
pub mod models;
pub mod observability;
pub mod retention;
pub mod status;
