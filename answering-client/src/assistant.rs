use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    types::{
        AssistantTools, AssistantToolsFileSearch, CreateAssistantRequestArgs,
        CreateAssistantToolFileSearchResources, CreateAssistantToolResources,
        CreateFileRequestArgs, CreateMessageRequestArgs, CreateRunRequestArgs,
        CreateThreadRequestArgs, CreateVectorStoreFileBatchRequestArgs,
        CreateVectorStoreRequestArgs, FileInput, FilePurpose, MessageContent, MessageObject,
        MessageRole, RunStatus, VectorStoreFileBatchStatus,
    },
    Client,
};
use async_trait::async_trait;
use common::{error::AppError, utils::config::AppConfig};
use tracing::{debug, info, warn};

use crate::{
    polling::{poll_until, PollOutcome, PollSettings},
    AnsweringService, CorpusDocument, CorpusHandle,
};

/// Upper bound on file ids attached to a vector store in one batch.
const FILE_BATCH_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub store_name: String,
    pub assistant_name: String,
    pub instructions: String,
    pub model: String,
    pub answer_poll: PollSettings,
    pub corpus_poll: PollSettings,
}

impl AssistantSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            store_name: config.corpus_store_name.clone(),
            assistant_name: config.assistant_name.clone(),
            instructions: config.assistant_instructions.clone(),
            model: config.assistant_model.clone(),
            answer_poll: PollSettings::from_config_values(
                config.answer_poll_interval_ms,
                config.answer_timeout_secs,
            ),
            corpus_poll: PollSettings::from_config_values(
                config.corpus_poll_interval_ms,
                config.corpus_timeout_secs,
            ),
        }
    }
}

/// How far an assistant run has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunProgress {
    Pending,
    Completed,
    Stopped(&'static str),
}

fn run_progress(status: &RunStatus) -> RunProgress {
    match status {
        RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling => RunProgress::Pending,
        RunStatus::Completed => RunProgress::Completed,
        RunStatus::RequiresAction => RunProgress::Stopped("requires_action"),
        RunStatus::Cancelled => RunProgress::Stopped("cancelled"),
        RunStatus::Failed => RunProgress::Stopped("failed"),
        RunStatus::Incomplete => RunProgress::Stopped("incomplete"),
        RunStatus::Expired => RunProgress::Stopped("expired"),
    }
}

/// Text of the newest assistant message, if any.
fn latest_answer(messages: &[MessageObject]) -> Option<String> {
    messages
        .iter()
        .find(|message| matches!(message.role, MessageRole::Assistant))
        .and_then(|message| {
            message.content.iter().find_map(|content| match content {
                MessageContent::Text(text) => Some(text.text.value.clone()),
                _ => None,
            })
        })
}

/// Answering service backed by an OpenAI assistant with file search over a
/// vector store.
pub struct AssistantAnsweringService {
    client: Arc<Client<OpenAIConfig>>,
    settings: AssistantSettings,
}

impl AssistantAnsweringService {
    pub fn new(client: Arc<Client<OpenAIConfig>>, settings: AssistantSettings) -> Self {
        Self { client, settings }
    }

    async fn upload_document(&self, document: &CorpusDocument) -> Result<String, AppError> {
        let bytes = tokio::fs::read(&document.path).await?;
        let upload_name = document.upload_name();

        let request = CreateFileRequestArgs::default()
            .file(FileInput::from_vec_u8(upload_name.clone(), bytes))
            .purpose(FilePurpose::Assistants)
            .build()?;
        let file = self.client.files().create(request).await?;

        debug!(
            file_id = %file.id,
            upload_name,
            mime_type = %document.mime_type,
            "uploaded corpus document"
        );
        Ok(file.id)
    }

    async fn attach_batch(&self, vector_store_id: &str, file_ids: &[String]) -> Result<(), AppError> {
        let request = CreateVectorStoreFileBatchRequestArgs::default()
            .file_ids(file_ids.to_vec())
            .build()?;
        let created = self
            .client
            .vector_stores()
            .file_batches(vector_store_id)
            .create(request)
            .await?;

        let client = &self.client;
        let batch_id = created.id.as_str();
        let batch = poll_until(&self.settings.corpus_poll, "vector store file batch", move || async move {
            let batch = client
                .vector_stores()
                .file_batches(vector_store_id)
                .retrieve(batch_id)
                .await?;
            Ok::<_, AppError>(match batch.status {
                VectorStoreFileBatchStatus::InProgress => PollOutcome::Pending,
                _ => PollOutcome::Ready(batch),
            })
        })
        .await?;

        match batch.status {
            VectorStoreFileBatchStatus::Completed => {
                if batch.file_counts.failed > 0 {
                    warn!(
                        batch_id = %batch.id,
                        failed = batch.file_counts.failed,
                        completed = batch.file_counts.completed,
                        "some corpus documents failed to index"
                    );
                }
                info!(
                    batch_id = %batch.id,
                    completed = batch.file_counts.completed,
                    "file batch indexed"
                );
                Ok(())
            }
            status => Err(AppError::Startup(format!(
                "file batch {} ended as {status:?}",
                batch.id
            ))),
        }
    }

    async fn create_assistant(&self, vector_store_id: &str) -> Result<String, AppError> {
        let request = CreateAssistantRequestArgs::default()
            .name(&self.settings.assistant_name)
            .instructions(&self.settings.instructions)
            .model(&self.settings.model)
            .tools(vec![AssistantTools::FileSearch(
                AssistantToolsFileSearch::default(),
            )])
            .tool_resources(CreateAssistantToolResources {
                file_search: Some(CreateAssistantToolFileSearchResources {
                    vector_store_ids: Some(vec![vector_store_id.to_string()]),
                    vector_stores: None,
                }),
                code_interpreter: None,
            })
            .build()?;

        let assistant = self.client.assistants().create(request).await?;
        info!(assistant_id = %assistant.id, vector_store_id, "assistant linked to vector store");
        Ok(assistant.id)
    }

    async fn build_corpus(&self, documents: &[CorpusDocument]) -> Result<CorpusHandle, AppError> {
        if documents.is_empty() {
            return Err(AppError::Startup("no corpus documents to upload".into()));
        }

        let request = CreateVectorStoreRequestArgs::default()
            .name(&self.settings.store_name)
            .build()?;
        let vector_store = self.client.vector_stores().create(request).await?;
        info!(vector_store_id = %vector_store.id, "vector store created");

        let mut file_ids = Vec::with_capacity(documents.len());
        for document in documents {
            file_ids.push(self.upload_document(document).await?);
        }
        info!(uploaded = file_ids.len(), "corpus documents uploaded");

        for batch in file_ids.chunks(FILE_BATCH_LIMIT) {
            self.attach_batch(&vector_store.id, batch).await?;
        }

        let assistant_id = self.create_assistant(&vector_store.id).await?;

        Ok(CorpusHandle {
            vector_store_id: vector_store.id,
            assistant_id,
        })
    }
}

#[async_trait]
impl AnsweringService for AssistantAnsweringService {
    #[tracing::instrument(skip_all, fields(documents = documents.len()))]
    async fn prepare_corpus(&self, documents: &[CorpusDocument]) -> Result<CorpusHandle, AppError> {
        self.build_corpus(documents).await.map_err(|err| match err {
            AppError::Startup(_) => err,
            other => AppError::Startup(other.to_string()),
        })
    }

    #[tracing::instrument(skip_all, fields(assistant_id = %corpus.assistant_id))]
    async fn ask(&self, corpus: &CorpusHandle, query: &str) -> Result<String, AppError> {
        let thread = self
            .client
            .threads()
            .create(CreateThreadRequestArgs::default().build()?)
            .await?;

        let message = CreateMessageRequestArgs::default()
            .role(MessageRole::User)
            .content(query.to_string())
            .build()?;
        self.client
            .threads()
            .messages(&thread.id)
            .create(message)
            .await?;

        let run_request = CreateRunRequestArgs::default()
            .assistant_id(&corpus.assistant_id)
            .build()?;
        let started = self
            .client
            .threads()
            .runs(&thread.id)
            .create(run_request)
            .await?;
        debug!(thread_id = %thread.id, run_id = %started.id, "assistant run started");

        let client = &self.client;
        let thread_id = thread.id.as_str();
        let run_id = started.id.as_str();
        let run = poll_until(&self.settings.answer_poll, "assistant run", move || async move {
            let run = client.threads().runs(thread_id).retrieve(run_id).await?;
            Ok::<_, AppError>(match run_progress(&run.status) {
                RunProgress::Pending => PollOutcome::Pending,
                RunProgress::Completed | RunProgress::Stopped(_) => PollOutcome::Ready(run),
            })
        })
        .await?;

        if let RunProgress::Stopped(label) = run_progress(&run.status) {
            return Err(AppError::RemoteFailure(format!(
                "run {} ended as {label}",
                run.id
            )));
        }

        let messages = self
            .client
            .threads()
            .messages(thread_id)
            .list(&[("order", "desc"), ("limit", "5")])
            .await?;

        latest_answer(&messages.data).ok_or_else(|| {
            AppError::RemoteFailure(format!("run {} produced no text answer", run.id))
        })
    }
}
