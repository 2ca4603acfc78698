//! Configuration

pub mod settings;
