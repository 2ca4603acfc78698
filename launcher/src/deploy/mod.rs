//! Deployment of the bot onto a user's fork

pub mod fork;
pub mod fsm;
pub mod orchestrator;
pub mod patch;
pub mod template;

pub use orchestrator::{DeployOptions, DeployOutcome, Orchestrator};
