use prompt_jobs::JobManager;

#[derive(Clone)]
pub struct ApiState {
    pub jobs: JobManager,
}

impl ApiState {
    pub fn new(jobs: JobManager) -> Self {
        Self { jobs }
    }
}
