//! Launcher API models
//!
//! Request and response bodies for the HTTP endpoints and the socket protocol.

pub mod models;

pub use models::*;
