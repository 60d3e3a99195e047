//! PLM router HTTP gateway library.
//!
//! Exposes configuration, state, error handling and the router builder so
//! integration tests and the binary entrypoint share the same wiring.

pub mod build_info;
pub mod cli;
pub mod config;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
