//! Typed contract for the document Q&A backend.
//!
//! [`Backend`] is the seam every stateful component talks through. The HTTP
//! implementation lives in [`HttpBackend`]; tests substitute in-memory ones.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::error::{ClientResult, TransportError};
use crate::models::{ChatRequest, ChatResponse, FileRecord, JobStatus, UploadedFile};

mod chat;
mod files;
mod processing;

pub const DEFAULT_RECENT_LIMIT: u32 = 10;

#[async_trait]
pub trait Backend: Send + Sync {
    /// All-or-nothing: either every document is stored or the call fails.
    async fn upload(&self, documents: &[DocumentUpload]) -> ClientResult<Vec<UploadedFile>>;

    async fn list_recent(&self, limit: u32) -> ClientResult<Vec<FileRecord>>;

    async fn start_processing(&self, limit: Option<u32>) -> ClientResult<JobStatus>;

    async fn get_status(&self, job_id: &str) -> ClientResult<JobStatus>;

    async fn ask_question(&self, request: &ChatRequest) -> ClientResult<ChatResponse>;
}

/// A document held in memory, ready to be sent as one `files` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl DocumentUpload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        Self {
            content_type: guess_mime_type(&file_name).to_string(),
            file_name,
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown_file".to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub async fn from_paths<P: AsRef<Path>>(paths: &[P]) -> std::io::Result<Vec<Self>> {
        futures::future::try_join_all(paths.iter().map(|p| Self::from_path(p.as_ref()))).await
    }
}

pub fn guess_mime_type(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "md" | "markdown" => "text/markdown",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// reqwest-backed client for the `/api` surface.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends the request and decodes a 2xx JSON body, collapsing every other
    /// outcome into a [`TransportError`] carrying `message`.
    async fn send_json<T>(
        &self,
        request: reqwest::RequestBuilder,
        message: &'static str,
    ) -> Result<T, TransportError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(error = %e, "request timed out");
            } else {
                warn!(error = %e, "request failed");
            }
            TransportError::new(message)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, url = %response.url(), "backend returned non-success status");
            return Err(TransportError::new(message));
        }

        response.json::<T>().await.map_err(|e| {
            warn!(error = %e, "failed to decode backend response");
            TransportError::new(message)
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upload(&self, documents: &[DocumentUpload]) -> ClientResult<Vec<UploadedFile>> {
        files::upload(self, documents).await
    }

    async fn list_recent(&self, limit: u32) -> ClientResult<Vec<FileRecord>> {
        files::list_recent(self, limit).await
    }

    async fn start_processing(&self, limit: Option<u32>) -> ClientResult<JobStatus> {
        processing::start(self, limit).await
    }

    async fn get_status(&self, job_id: &str) -> ClientResult<JobStatus> {
        processing::status(self, job_id).await
    }

    async fn ask_question(&self, request: &ChatRequest) -> ClientResult<ChatResponse> {
        chat::completions(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(guess_mime_type("report.PDF"), "application/pdf");
        assert_eq!(guess_mime_type("notes.md"), "text/markdown");
        assert_eq!(guess_mime_type("notes.markdown"), "text/markdown");
        assert_eq!(guess_mime_type("readme.txt"), "text/plain");
        assert_eq!(guess_mime_type("archive"), "application/octet-stream");
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let backend = HttpBackend::with_client(reqwest::Client::new(), "http://api:8000/");
        assert_eq!(
            backend.url("/api/files/recent"),
            "http://api:8000/api/files/recent"
        );
    }
}
