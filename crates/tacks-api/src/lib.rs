#![forbid(unsafe_code)]
//! HTTP surface for the tacks issue board: router, pipeline middleware,
//! handlers, payload validation, and the keepalive pinger. The binary in
//! `main.rs` wires these onto `tacks-core`.

pub mod auth;
pub mod handlers;
pub mod keepalive;
pub mod router;
pub mod validate;
