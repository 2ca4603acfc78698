//! Xylo Launcher Library
//!
//! Core modules for the Xylo bot launcher.

pub mod app;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod github;
pub mod logs;
pub mod models;
pub mod relay;
pub mod server;
pub mod session;
pub mod storage;
pub mod utils;
pub mod workers;
