//! GitHub REST API wrapper

pub mod actions;
pub mod client;
pub mod contents;
pub mod oauth;
pub mod repos;

pub use client::{GitHubApi, GitHubClient};
