use reqwest::Url;
use tracing::{debug, info, warn};

use super::HttpBackend;
use crate::error::{ClientResult, TransportError, ValidationError, START_FAILED, STATUS_FAILED};
use crate::models::{JobStatus, ProcessRequest};

pub(super) async fn start(backend: &HttpBackend, limit: Option<u32>) -> ClientResult<JobStatus> {
    if limit == Some(0) {
        return Err(ValidationError::InvalidLimit.into());
    }

    let request = backend
        .client
        .post(backend.url("/api/processing/start"))
        .json(&ProcessRequest { limit });
    let status: JobStatus = backend.send_json(request, START_FAILED).await?;

    if status.job_id.is_empty() {
        return Err(TransportError::new(START_FAILED).into());
    }
    info!(job_id = %status.job_id, state = %status.state, "processing run started");
    Ok(status)
}

pub(super) async fn status(backend: &HttpBackend, job_id: &str) -> ClientResult<JobStatus> {
    debug!(job_id, "fetching job status");
    let request = backend.client.get(status_url(backend, job_id)?);
    Ok(backend.send_json(request, STATUS_FAILED).await?)
}

/// The job id is opaque, so it is pushed as one encoded path segment.
fn status_url(backend: &HttpBackend, job_id: &str) -> Result<Url, TransportError> {
    let mut url = Url::parse(&backend.url("/api/processing")).map_err(|err| {
        warn!(error = %err, "invalid backend url");
        TransportError::new(STATUS_FAILED)
    })?;
    url.path_segments_mut()
        .map_err(|_| TransportError::new(STATUS_FAILED))?
        .push(job_id);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_is_a_single_encoded_segment() {
        let backend = HttpBackend::with_client(reqwest::Client::new(), "http://api:8000/");
        assert_eq!(
            status_url(&backend, "j1").unwrap().as_str(),
            "http://api:8000/api/processing/j1"
        );
        assert_eq!(
            status_url(&backend, "a/b?c#d").unwrap().as_str(),
            "http://api:8000/api/processing/a%2Fb%3Fc%23d"
        );
    }

    #[test]
    fn unparseable_base_url_is_a_transport_error() {
        let backend = HttpBackend::with_client(reqwest::Client::new(), "not a url");
        assert_eq!(status_url(&backend, "j1").unwrap_err().message(), STATUS_FAILED);
    }
}
