//! Integration tests for the launcher

mod common;
mod test_fsm;
mod test_handlers;
mod test_orchestrator;
