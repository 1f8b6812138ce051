use std::sync::Arc;

use answering_client::{AnsweringService, CorpusHandle};
use common::{
    error::AppError,
    storage::{
        job_store::JobStore,
        types::prompt_job::{JobState, JobView, PromptJob},
    },
};
use tracing::{debug, error, info, warn, Instrument};

/// Issues prompt jobs, runs them in the background and answers status reads.
#[derive(Clone)]
pub struct JobManager {
    store: Arc<JobStore>,
    service: Arc<dyn AnsweringService>,
    corpus: Arc<CorpusHandle>,
}

impl JobManager {
    pub fn new(
        store: Arc<JobStore>,
        service: Arc<dyn AnsweringService>,
        corpus: CorpusHandle,
    ) -> Self {
        Self {
            store,
            service,
            corpus: Arc::new(corpus),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn corpus(&self) -> &CorpusHandle {
        &self.corpus
    }

    /// Records a new running job and schedules its execution.
    ///
    /// The job is readable through [`JobManager::poll`] before this returns.
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, query: impl Into<String>) -> Result<String, AppError> {
        let job = PromptJob::new(query);
        let job_id = job.id.clone();
        let query = job.query.clone();

        self.store.insert(job)?;
        info!(job_id = %job_id, query_len = query.len(), "prompt job submitted");

        let span = tracing::info_span!("prompt_job", job_id = %job_id);
        tokio::spawn(
            execute(
                Arc::clone(&self.store),
                Arc::clone(&self.service),
                Arc::clone(&self.corpus),
                job_id.clone(),
                query,
            )
            .instrument(span),
        );

        Ok(job_id)
    }

    /// Latest recorded state of a job. Never waits on in-flight work.
    pub fn poll(&self, job_id: &str) -> JobView {
        let view = self.store.view(job_id);
        debug!(job_id, ?view, "prompt job polled");
        view
    }
}

/// Background unit of work for one job.
///
/// The remote call runs in its own task so that a panic inside the answering
/// service is observed here as a join error and recorded as a failure.
async fn execute(
    store: Arc<JobStore>,
    service: Arc<dyn AnsweringService>,
    corpus: Arc<CorpusHandle>,
    job_id: String,
    query: String,
) {
    let outcome = match tokio::spawn(async move { service.ask(&corpus, &query).await }).await {
        Ok(result) => result,
        Err(join_error) => Err(AppError::from(join_error)),
    };

    if let Err(err) = &outcome {
        warn!(job_id = %job_id, error = %err, "answering service failed");
    }

    match store.record_outcome(&job_id, outcome) {
        Ok(JobState::Finished) => info!(job_id = %job_id, "prompt job finished"),
        Ok(state) => info!(job_id = %job_id, state = state.as_str(), "prompt job ended"),
        Err(err) => error!(job_id = %job_id, error = %err, "failed to record job outcome"),
    }
}
