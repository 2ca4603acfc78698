//! HTTP and socket server

pub mod auth;
pub mod handlers;
pub mod serve;
pub mod socket;
pub mod state;
