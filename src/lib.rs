//! Library crate for climb-beat-back, exposing modules for binaries and integration tests.

mod config;
mod dto;
mod error;
/// HTTP, SSE and WebSocket routers.
pub mod routes;
/// Transport-agnostic session operations.
pub mod services;
pub mod state;
