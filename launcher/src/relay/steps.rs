//! Workflow run steps as deployment log entries

use api_models::{LogEntry, LogStatus};
use chrono::{DateTime, Utc};
use github_models::{Conclusion, Job, RunStatus, WorkflowRun};

use crate::models::deployment::DeploymentStatus;

/// Flatten started steps of a run's jobs into log entries, ordered by start time
pub fn run_step_entries(jobs: &[Job], now: DateTime<Utc>) -> Vec<LogEntry> {
    let mut entries: Vec<LogEntry> = jobs
        .iter()
        .flat_map(|job| {
            job.steps
                .iter()
                .filter(|step| matches!(step.status, RunStatus::InProgress | RunStatus::Completed))
                .map(move |step| {
                    let status = step_status(step.status, step.conclusion);
                    LogEntry {
                        id: format!("{}-{}", job.id, step.number),
                        step: format!("{}: {}", job.name, step.name),
                        status,
                        message: step_message(step.status, step.conclusion),
                        timestamp: step.started_at.or(job.started_at).unwrap_or(now),
                    }
                })
        })
        .collect();

    entries.sort_by_key(|entry| entry.timestamp);
    entries
}

fn step_status(status: RunStatus, conclusion: Option<Conclusion>) -> LogStatus {
    match (status, conclusion) {
        (RunStatus::Completed, Some(Conclusion::Success)) => LogStatus::Success,
        (RunStatus::Completed, Some(Conclusion::Failure | Conclusion::TimedOut)) => {
            LogStatus::Failed
        }
        (RunStatus::Completed, _) => LogStatus::Warning,
        _ => LogStatus::Running,
    }
}

fn step_message(status: RunStatus, conclusion: Option<Conclusion>) -> String {
    match (status, conclusion) {
        (RunStatus::Completed, Some(conclusion)) => format!("Completed ({})", conclusion_name(conclusion)),
        (RunStatus::Completed, None) => "Completed".to_string(),
        _ => "In progress".to_string(),
    }
}

fn conclusion_name(conclusion: Conclusion) -> &'static str {
    match conclusion {
        Conclusion::Success => "success",
        Conclusion::Failure => "failure",
        Conclusion::Cancelled => "cancelled",
        Conclusion::Skipped => "skipped",
        Conclusion::TimedOut => "timed out",
        Conclusion::ActionRequired => "action required",
        Conclusion::Neutral => "neutral",
        Conclusion::Stale => "stale",
        Conclusion::Unknown => "unknown",
    }
}

/// Final deployment status implied by a finished run
pub fn completed_run_status(run: &WorkflowRun) -> Option<(DeploymentStatus, String)> {
    if run.status != RunStatus::Completed {
        return None;
    }
    match run.conclusion {
        Some(Conclusion::Success) => Some((
            DeploymentStatus::Success,
            "Workflow run completed successfully".to_string(),
        )),
        Some(conclusion) => Some((
            DeploymentStatus::Failed,
            format!("Workflow run finished: {}", conclusion_name(conclusion)),
        )),
        None => Some((DeploymentStatus::Failed, "Workflow run finished".to_string())),
    }
}
