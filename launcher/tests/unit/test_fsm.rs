//! Step FSM unit tests

use xylo_launcher::deploy::fsm::{StepEvent, StepFsm};
use xylo_launcher::models::deployment::LogStatus;

#[test]
fn test_fsm_initial_state() {
    let fsm = StepFsm::new("branch");
    assert_eq!(fsm.step(), "branch");
    assert_eq!(fsm.state(), LogStatus::Pending);
    assert!(fsm.message().is_none());
    assert!(!fsm.is_terminal());
}

#[test]
fn test_fsm_failure_flow() {
    let mut fsm = StepFsm::new("dispatch");

    fsm.process(StepEvent::Start).unwrap();
    let state = fsm
        .process(StepEvent::Fail("Workflow not found".to_string()))
        .unwrap();

    assert_eq!(state, LogStatus::Failed);
    assert_eq!(fsm.message(), Some("Workflow not found"));
    assert!(fsm.is_terminal());
}

#[test]
fn test_fsm_fail_before_start() {
    let mut fsm = StepFsm::new("authenticate");
    fsm.process(StepEvent::Fail("Bad credentials".to_string()))
        .unwrap();
    assert_eq!(fsm.state(), LogStatus::Failed);
}

#[test]
fn test_fsm_invalid_transitions() {
    let mut fsm = StepFsm::new("config");

    // Cannot finish a step that never started
    assert!(fsm.process(StepEvent::Succeed("done".to_string())).is_err());
    assert!(fsm.process(StepEvent::Warn("meh".to_string())).is_err());
    assert_eq!(fsm.state(), LogStatus::Pending);

    fsm.process(StepEvent::Start).unwrap();
    let err = fsm.process(StepEvent::Start).unwrap_err();
    assert!(err.contains("config"));
    assert_eq!(fsm.state(), LogStatus::Running);
}
