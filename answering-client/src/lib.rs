#![allow(clippy::missing_docs_in_private_items)]

pub mod assistant;
pub mod polling;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use common::error::AppError;
use mime::Mime;
use serde::Serialize;

pub use assistant::{AssistantAnsweringService, AssistantSettings};
pub use polling::{poll_until, PollOutcome, PollSettings};

/// A reference document handed to the answering service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusDocument {
    pub path: PathBuf,
    pub mime_type: Mime,
}

impl CorpusDocument {
    /// Builds a document with an explicit content-type label. An empty label
    /// falls back to guessing from the file extension.
    pub fn new(path: impl Into<PathBuf>, mime_label: &str) -> Result<Self, AppError> {
        let path = path.into();
        let mime_type = if mime_label.trim().is_empty() {
            guess_mime_type(&path)
        } else {
            mime_label
                .trim()
                .parse::<Mime>()
                .map_err(|e| AppError::Validation(format!("invalid MIME type '{mime_label}': {e}")))?
        };

        Ok(Self { path, mime_type })
    }

    /// File name used for the upload.
    ///
    /// When the label disagrees with what the extension implies, a matching
    /// extension is appended so the remote side indexes the document under
    /// the labelled type.
    pub fn upload_name(&self) -> String {
        let file_name = self
            .path
            .file_name()
            .map_or_else(|| "document".to_string(), |name| name.to_string_lossy().into_owned());

        if guess_mime_type(&self.path).essence_str() == self.mime_type.essence_str() {
            return file_name;
        }

        let extension = match self.mime_type.essence_str() {
            "text/plain" => "txt",
            "application/json" => "json",
            "text/csv" => "csv",
            "text/markdown" => "md",
            _ => return file_name,
        };
        format!("{file_name}.{extension}")
    }
}

fn guess_mime_type(path: &Path) -> Mime {
    mime_guess::from_path(path).first_or(mime::APPLICATION_OCTET_STREAM)
}

/// Identifies a prepared corpus on the answering service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorpusHandle {
    pub vector_store_id: String,
    pub assistant_id: String,
}

/// The external question answering capability.
///
/// `prepare_corpus` runs once at startup; `ask` may take an unbounded amount
/// of wall-clock time and is expected to be awaited off the request path.
#[async_trait]
pub trait AnsweringService: Send + Sync {
    async fn prepare_corpus(&self, documents: &[CorpusDocument]) -> Result<CorpusHandle, AppError>;

    async fn ask(&self, corpus: &CorpusHandle, query: &str) -> Result<String, AppError>;
}
