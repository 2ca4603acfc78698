//! Finite state machine for a single deployment step

use crate::models::deployment::LogStatus;

/// Step event
#[derive(Debug, Clone)]
pub enum StepEvent {
    /// Step started
    Start,

    /// Step completed
    Succeed(String),

    /// Step failed; the deployment aborts
    Fail(String),

    /// Step failed but the deployment continues
    Warn(String),
}

/// Step FSM
///
/// `pending -> running -> success | failed | warning`. A pending step may also
/// fail directly when it cannot be started at all.
#[derive(Debug, Clone)]
pub struct StepFsm {
    step: String,
    state: LogStatus,
    message: Option<String>,
}

impl StepFsm {
    /// Create a new FSM in pending state
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            state: LogStatus::Pending,
            message: None,
        }
    }

    /// Step name
    pub fn step(&self) -> &str {
        &self.step
    }

    /// Get current state
    pub fn state(&self) -> LogStatus {
        self.state
    }

    /// Message attached by the last terminal event
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Whether the step has ended
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: StepEvent) -> Result<LogStatus, String> {
        let new_state = match (self.state, &event) {
            (LogStatus::Pending, StepEvent::Start) => LogStatus::Running,
            (LogStatus::Pending, StepEvent::Fail(msg)) => {
                self.message = Some(msg.clone());
                LogStatus::Failed
            }

            (LogStatus::Running, StepEvent::Succeed(msg)) => {
                self.message = Some(msg.clone());
                LogStatus::Success
            }
            (LogStatus::Running, StepEvent::Fail(msg)) => {
                self.message = Some(msg.clone());
                LogStatus::Failed
            }
            (LogStatus::Running, StepEvent::Warn(msg)) => {
                self.message = Some(msg.clone());
                LogStatus::Warning
            }

            (state, event) => {
                return Err(format!(
                    "Invalid transition for step '{}': {:?} -> {:?}",
                    self.step, state, event
                ));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}
