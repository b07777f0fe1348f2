#![forbid(unsafe_code)]
//! tacks-core: configuration, domain model, and SQLite-backed persistence
//! for the tacks issue-board service.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` with `.context(...)` at every fallible
//!   boundary; read misses are `Ok(None)`, not errors.
//! - **Logging**: `tracing` macros only.

pub mod config;
pub mod db;
pub mod model;
