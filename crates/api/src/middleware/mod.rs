//! Request guards and cross-cutting layers.
//!
//! - [`auth::RequireAuth`] -- Rejects requests without the configured Bearer token.
//! - [`body::ContentLength`] -- Validates `Content-Length` before a body is read.
//! - [`cors`] -- CORS layer and the `204` preflight rewrite.

pub mod auth;
pub mod body;
pub mod cors;
