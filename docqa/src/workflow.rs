//! Composition of the transport and poller into the upload and processing
//! flows a front end drives.

use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{Backend, DocumentUpload};
use crate::error::{ClientError, ClientResult, TransportError, ValidationError};
use crate::models::{JobState, JobStatus, UploadedFile};
use crate::poller::{JobPoller, PollView};
use crate::progress::{project, select_snapshot, ProgressView};

/// One processing run at a time: starts it, then follows it with a poller.
pub struct ProcessingRun {
    backend: Arc<dyn Backend>,
    poller: JobPoller,
    started: Option<JobStatus>,
    error: Option<TransportError>,
}

impl ProcessingRun {
    pub fn new(backend: Arc<dyn Backend>, poller: JobPoller) -> Self {
        Self {
            backend,
            poller,
            started: None,
            error: None,
        }
    }

    /// Starts a run over up to `limit` pending documents and begins polling it.
    ///
    /// Refused with [`ClientError::Busy`] while the current run is `running`.
    /// A failed start keeps whatever run was shown before.
    pub async fn launch(&mut self, limit: Option<u32>) -> ClientResult<JobStatus> {
        if self.is_busy() {
            return Err(ClientError::Busy);
        }
        self.error = None;

        match self.backend.start_processing(limit).await {
            Ok(status) => {
                info!(job_id = %status.job_id, "following processing run");
                self.poller.track(status.job_id.clone());
                self.started = Some(status.clone());
                Ok(status)
            }
            Err(err) => {
                warn!(error = %err, "processing run did not start");
                if let ClientError::Transport(transport) = &err {
                    self.error = Some(transport.clone());
                }
                Err(err)
            }
        }
    }

    /// Live poll snapshot if there is one, else the response from `launch`.
    pub fn current_status(&self) -> Option<JobStatus> {
        let live = self.poller.status();
        select_snapshot(live.as_ref(), self.started.as_ref()).cloned()
    }

    pub fn progress(&self) -> Option<ProgressView> {
        self.current_status().as_ref().map(project)
    }

    pub fn is_busy(&self) -> bool {
        self.current_status()
            .is_some_and(|status| status.state == JobState::Running)
    }

    pub fn error(&self) -> Option<&TransportError> {
        self.error.as_ref()
    }

    pub fn poller(&self) -> &JobPoller {
        &self.poller
    }

    pub async fn wait(&self) -> PollView {
        self.poller.wait_settled().await
    }
}

/// A file selection waiting to be sent to storage.
pub struct UploadQueue {
    backend: Arc<dyn Backend>,
    selection: Vec<DocumentUpload>,
    uploaded: Vec<UploadedFile>,
    error: Option<TransportError>,
}

impl UploadQueue {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            selection: Vec::new(),
            uploaded: Vec::new(),
            error: None,
        }
    }

    /// Replaces the current selection.
    pub fn select(&mut self, documents: Vec<DocumentUpload>) {
        self.selection = documents;
    }

    pub fn selection(&self) -> &[DocumentUpload] {
        &self.selection
    }

    pub fn uploaded(&self) -> &[UploadedFile] {
        &self.uploaded
    }

    pub fn error(&self) -> Option<&TransportError> {
        self.error.as_ref()
    }

    /// Sends the whole selection. On failure the selection is kept for retry.
    pub async fn upload(&mut self) -> ClientResult<Vec<UploadedFile>> {
        if self.selection.is_empty() {
            return Err(ValidationError::NoFiles.into());
        }
        self.error = None;

        match self.backend.upload(&self.selection).await {
            Ok(stored) => {
                info!(count = stored.len(), "selection uploaded");
                self.selection.clear();
                self.uploaded = stored.clone();
                Ok(stored)
            }
            Err(err) => {
                warn!(error = %err, count = self.selection.len(), "upload failed, keeping selection");
                if let ClientError::Transport(transport) = &err {
                    self.error = Some(transport.clone());
                }
                Err(err)
            }
        }
    }
}
