use dashmap::{mapref::entry::Entry, DashMap};
use tracing::debug;

use crate::error::AppError;

use super::types::prompt_job::{JobState, JobView, PromptJob};

/// In-memory table of prompt jobs, keyed by job id.
///
/// Entries live for the lifetime of the store and are never removed. Each
/// entry is replaced as a whole under its shard lock, so readers see either
/// the previous record or the next one.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: DashMap<String, PromptJob>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: PromptJob) -> Result<(), AppError> {
        match self.jobs.entry(job.id.clone()) {
            Entry::Occupied(existing) => Err(AppError::Validation(format!(
                "Job {} already exists",
                existing.key()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(job);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<PromptJob> {
        self.jobs.get(id).map(|job| job.clone())
    }

    pub fn view(&self, id: &str) -> JobView {
        self.jobs.get(id).map_or(JobView::NotFound, |job| job.view())
    }

    /// Applies the single terminal transition for a job.
    ///
    /// `Ok` becomes `Finished` with the text as response, `Err` becomes
    /// `Failed`. A job that already reached a terminal state is left as is and
    /// the call returns a validation error.
    pub fn record_outcome(
        &self,
        id: &str,
        outcome: Result<String, AppError>,
    ) -> Result<JobState, AppError> {
        let mut entry = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Job {id}")))?;

        let next = match outcome {
            Ok(response) => entry.finished(response)?,
            Err(err) => entry.failed(err.to_string())?,
        };
        let state = next.state;
        *entry = next;
        debug!(job_id = %id, state = state.as_str(), "job record replaced");

        Ok(state)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_unknown_id_is_not_found() {
        let store = JobStore::new();
        assert_eq!(store.view("missing"), JobView::NotFound);
        assert!(store.get("missing").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_and_view() {
        let store = JobStore::new();
        let job = PromptJob::new("What is the total for Italy?");
        let id = job.id.clone();

        store.insert(job).expect("insert");

        assert_eq!(store.view(&id), JobView::Running);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let store = JobStore::new();
        let job = PromptJob::new("q");
        store.insert(job.clone()).expect("first insert");

        let result = store.insert(job);
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_record_success_outcome() {
        let store = JobStore::new();
        let job = PromptJob::new("q");
        let id = job.id.clone();
        store.insert(job).expect("insert");

        let state = store.record_outcome(&id, Ok("42".into())).expect("record");

        assert_eq!(state, JobState::Finished);
        assert_eq!(
            store.view(&id),
            JobView::Finished {
                response: "42".into()
            }
        );
    }

    #[test]
    fn test_record_failure_outcome() {
        let store = JobStore::new();
        let job = PromptJob::new("q");
        let id = job.id.clone();
        store.insert(job).expect("insert");

        let state = store
            .record_outcome(&id, Err(AppError::RemoteFailure("run failed".into())))
            .expect("record");

        assert_eq!(state, JobState::Failed);
        assert_eq!(store.view(&id), JobView::Failed);
        let stored = store.get(&id).expect("job exists");
        assert!(stored.response.is_none());
        assert!(stored
            .error_message
            .as_deref()
            .is_some_and(|msg| msg.contains("run failed")));
    }

    #[test]
    fn test_terminal_state_is_final() {
        let store = JobStore::new();
        let job = PromptJob::new("q");
        let id = job.id.clone();
        store.insert(job).expect("insert");
        store.record_outcome(&id, Ok("42".into())).expect("record");

        let second = store.record_outcome(&id, Err(AppError::Timeout("late".into())));
        assert!(matches!(second, Err(AppError::Validation(_))));

        let third = store.record_outcome(&id, Ok("43".into()));
        assert!(matches!(third, Err(AppError::Validation(_))));

        assert_eq!(
            store.view(&id),
            JobView::Finished {
                response: "42".into()
            }
        );
    }

    #[test]
    fn test_record_outcome_for_unknown_job() {
        let store = JobStore::new();
        let result = store.record_outcome("missing", Ok("42".into()));
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_never_see_partial_record() {
        let store = Arc::new(JobStore::new());
        let job = PromptJob::new("q");
        let id = job.id.clone();
        store.insert(job).expect("insert");

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = id.clone();
                tokio::spawn(async move {
                    let mut seen_terminal = false;
                    for _ in 0..500 {
                        let view = store.view(&id);
                        match view {
                            JobView::Running => assert!(!seen_terminal),
                            JobView::Finished { ref response } => {
                                assert_eq!(response, "42");
                                seen_terminal = true;
                            }
                            other => panic!("unexpected view {other:?}"),
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        tokio::task::yield_now().await;
        store.record_outcome(&id, Ok("42".into())).expect("record");

        for result in futures::future::join_all(readers).await {
            result.expect("reader task");
        }
        assert_eq!(
            store.view(&id),
            JobView::Finished {
                response: "42".into()
            }
        );
    }
}
