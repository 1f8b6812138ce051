use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use state_machines::state_machine;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobState {
    #[serde(rename = "Running")]
    #[default]
    Running,
    #[serde(rename = "Finished")]
    Finished,
    #[serde(rename = "Failed")]
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Running => "Running",
            JobState::Finished => "Finished",
            JobState::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum JobTransition {
    Finish,
    Fail,
}

impl JobTransition {
    fn as_str(self) -> &'static str {
        match self {
            JobTransition::Finish => "finish",
            JobTransition::Fail => "fail",
        }
    }
}

mod lifecycle {
    use super::state_machine;

    state_machine! {
        name: JobLifecycleMachine,
        initial: Running,
        states: [Running, Finished, Failed],
        events {
            finish {
                transition: { from: Running, to: Finished }
            }
            fail {
                transition: { from: Running, to: Failed }
            }
        }
    }

    pub(super) fn running() -> JobLifecycleMachine<(), Running> {
        JobLifecycleMachine::new(())
    }
}

fn invalid_transition(state: JobState, event: JobTransition) -> AppError {
    AppError::Validation(format!(
        "Invalid job transition: {} -> {}",
        state.as_str(),
        event.as_str()
    ))
}

fn compute_next_state(state: JobState, event: JobTransition) -> Result<JobState, AppError> {
    use lifecycle::running;
    match (state, event) {
        (JobState::Running, JobTransition::Finish) => running()
            .finish()
            .map(|_| JobState::Finished)
            .map_err(|_| invalid_transition(state, event)),
        (JobState::Running, JobTransition::Fail) => running()
            .fail()
            .map(|_| JobState::Failed)
            .map_err(|_| invalid_transition(state, event)),
        _ => Err(invalid_transition(state, event)),
    }
}

/// One submitted query and the record of its asynchronous execution.
///
/// `response` is only ever set together with `JobState::Finished`, and
/// `error_message` only together with `JobState::Failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptJob {
    pub id: String,
    pub query: String,
    pub state: JobState,
    pub response: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromptJob {
    pub fn new(query: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            query: query.into(),
            state: JobState::Running,
            response: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the finished replacement record for this job.
    pub fn finished(&self, response: String) -> Result<Self, AppError> {
        let state = compute_next_state(self.state, JobTransition::Finish)?;
        Ok(Self {
            state,
            response: Some(response),
            error_message: None,
            updated_at: Utc::now(),
            ..self.clone()
        })
    }

    /// Returns the failed replacement record for this job.
    pub fn failed(&self, reason: String) -> Result<Self, AppError> {
        let state = compute_next_state(self.state, JobTransition::Fail)?;
        Ok(Self {
            state,
            response: None,
            error_message: Some(reason),
            updated_at: Utc::now(),
            ..self.clone()
        })
    }

    pub fn view(&self) -> JobView {
        match (self.state, &self.response) {
            (JobState::Running, _) => JobView::Running,
            (JobState::Finished, Some(response)) => JobView::Finished {
                response: response.clone(),
            },
            // A finished record always carries its response; anything else
            // is reported as a failure rather than a half-populated result.
            (JobState::Finished, None) | (JobState::Failed, _) => JobView::Failed,
        }
    }
}

/// What a poller observes for a job id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum JobView {
    Running,
    Finished { response: String },
    Failed,
    NotFound,
}

impl JobView {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobView::Finished { .. } | JobView::Failed)
    }
}
