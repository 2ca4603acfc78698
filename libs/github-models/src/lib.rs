//! GitHub REST API models
//!
//! Only the fields the launcher reads or writes are modelled; unknown fields are ignored.

pub mod models;

pub use models::*;
