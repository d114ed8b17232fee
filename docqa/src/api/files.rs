use tracing::{debug, info};

use super::{DocumentUpload, HttpBackend};
use crate::error::{ClientResult, TransportError, ValidationError, LIST_FAILED, UPLOAD_FAILED};
use crate::models::{FileRecord, UploadedFile};

pub(super) async fn upload(
    backend: &HttpBackend,
    documents: &[DocumentUpload],
) -> ClientResult<Vec<UploadedFile>> {
    if documents.is_empty() {
        return Err(ValidationError::NoFiles.into());
    }

    let mut form = reqwest::multipart::Form::new();
    for doc in documents {
        let part = reqwest::multipart::Part::bytes(doc.bytes.to_vec())
            .file_name(doc.file_name.clone())
            .mime_str(&doc.content_type)
            .map_err(|_| TransportError::new(UPLOAD_FAILED))?;
        form = form.part("files", part);
    }

    debug!(count = documents.len(), "uploading documents");
    let request = backend.client.post(backend.url("/api/files/upload")).multipart(form);
    let stored: Vec<UploadedFile> = backend.send_json(request, UPLOAD_FAILED).await?;
    info!(count = stored.len(), "documents uploaded");
    Ok(stored)
}

pub(super) async fn list_recent(backend: &HttpBackend, limit: u32) -> ClientResult<Vec<FileRecord>> {
    if limit == 0 {
        return Err(ValidationError::InvalidLimit.into());
    }

    debug!(limit, "listing recent files");
    let request = backend
        .client
        .get(backend.url("/api/files/recent"))
        .query(&[("limit", limit)]);
    Ok(backend.send_json(request, LIST_FAILED).await?)
}
