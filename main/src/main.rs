use std::sync::Arc;

use answering_client::{
    AnsweringService, AssistantAnsweringService, AssistantSettings, CorpusDocument,
};
use api_router::{api_routes, api_state::ApiState};
use axum::{extract::FromRef, Router};
use common::{
    error::AppError,
    storage::job_store::JobStore,
    utils::config::{get_config, AppConfig},
};
use partition_pipeline::build_corpus_files;
use prompt_jobs::JobManager;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;
    if config.openai_api_key.trim().is_empty() {
        return Err(AppError::Startup("openai_api_key is not configured".into()).into());
    }

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));
    let service: Arc<dyn AnsweringService> = Arc::new(AssistantAnsweringService::new(
        openai_client,
        AssistantSettings::from_config(&config),
    ));

    // Corpus preparation must finish before any submission is accepted
    let app = build_app(&config, service).await?;

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the corpus, binds it into a job manager and returns the router.
async fn build_app(
    config: &AppConfig,
    service: Arc<dyn AnsweringService>,
) -> Result<Router, AppError> {
    let files = build_corpus_files(config).await?;
    let documents = files
        .into_iter()
        .map(|path| CorpusDocument::new(path, &config.corpus_mime_type))
        .collect::<Result<Vec<_>, _>>()?;

    info!(documents = documents.len(), "Preparing answering corpus");
    let corpus = service.prepare_corpus(&documents).await?;
    info!(
        vector_store_id = %corpus.vector_store_id,
        assistant_id = %corpus.assistant_id,
        "Answering corpus ready"
    );

    let jobs = JobManager::new(Arc::new(JobStore::new()), service, corpus);
    let api_state = ApiState::new(jobs);

    Ok(Router::new()
        .merge(api_routes())
        .with_state(AppState { api_state }))
}

#[derive(Clone, FromRef)]
struct AppState {
    api_state: ApiState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use answering_client::CorpusHandle;
    use async_trait::async_trait;
    use axum::{body::Body, http::Request, http::StatusCode};
    use common::utils::config::CorpusLayout;
    use std::{path::Path, sync::Mutex};
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingService {
        prepared: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AnsweringService for RecordingService {
        async fn prepare_corpus(
            &self,
            documents: &[CorpusDocument],
        ) -> Result<CorpusHandle, AppError> {
            let mut prepared = self.prepared.lock().expect("lock");
            prepared.extend(documents.iter().map(CorpusDocument::upload_name));
            Ok(CorpusHandle {
                vector_store_id: "vs_smoke".into(),
                assistant_id: "asst_smoke".into(),
            })
        }

        async fn ask(&self, _corpus: &CorpusHandle, _query: &str) -> Result<String, AppError> {
            Ok("42".into())
        }
    }

    fn smoke_test_config(data_dir: &Path) -> AppConfig {
        let sources = data_dir.join("sources");
        std::fs::create_dir_all(&sources).expect("failed to create sources directory");
        for category in ["confirmed", "deaths", "recovered"] {
            std::fs::write(
                sources.join(format!("time_series_covid19_{category}_global.csv")),
                "Province/State,Country/Region,1/22/20\n,Italy,0\n,Spain,1\n",
            )
            .expect("failed to write source table");
        }

        AppConfig {
            openai_api_key: "test-key".into(),
            data_dir: data_dir.to_string_lossy().into_owned(),
            source_dir: sources.to_string_lossy().into_owned(),
            partition_output_dir: data_dir.join("partitioned").to_string_lossy().into_owned(),
            corpus_layout: CorpusLayout::Partitioned,
            http_port: 0,
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn smoke_startup_with_mock_answering_service() {
        let data_dir = tempfile::tempdir().expect("failed to create temp data directory");
        let config = smoke_test_config(data_dir.path());
        let service = Arc::new(RecordingService::default());

        let app = build_app(&config, Arc::clone(&service) as Arc<dyn AnsweringService>)
            .await
            .expect("startup should succeed");

        let prepared = service.prepared.lock().expect("lock").clone();
        assert_eq!(prepared.len(), 6);
        assert!(prepared.contains(&"Italy_Confirmed.json.txt".to_string()));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/live")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);

        let ready_response = app
            .oneshot(
                Request::builder()
                    .uri("/ready")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("ready response");
        assert_eq!(ready_response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn startup_fails_when_source_is_missing() {
        let data_dir = tempfile::tempdir().expect("failed to create temp data directory");
        let config = smoke_test_config(data_dir.path());
        std::fs::remove_file(
            Path::new(&config.source_dir).join("time_series_covid19_deaths_global.csv"),
        )
        .expect("remove source");
        let service = Arc::new(RecordingService::default());

        let result = build_app(&config, Arc::clone(&service) as Arc<dyn AnsweringService>).await;

        assert!(matches!(result, Err(AppError::SourceNotFound(_))));
        assert!(service.prepared.lock().expect("lock").is_empty());
        assert!(!data_dir.path().join("partitioned").exists());
    }
}
