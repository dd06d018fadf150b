//! Shared database repository test infrastructure
//!
//! The same test logic runs against both SQLite and PostgreSQL implementations:
//!
//! - **Unit tests (SQLite)**: Fast, in-memory tests that run with every `cargo test`
//! - **Integration tests (PostgreSQL)**: Slower tests using testcontainers, run with `cargo test -- --ignored`
//!
//! Each repository has a test module containing shared test functions that take
//! `&dyn XxxRepo`, followed by per-backend modules that instantiate them.

mod logs;
