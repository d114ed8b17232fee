//! In-memory scripted backend shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use docqa::error::{ClientResult, TransportError};
use docqa::models::{
    ChatRequest, ChatResponse, Citation, FileRecord, JobState, JobStatus, ProcessStep,
    UploadedFile,
};
use docqa::{Backend, DocumentUpload};

/// Responses are consumed in order; the last one repeats forever.
struct Script<T> {
    queue: VecDeque<T>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }
}

impl<T: Clone> Script<T> {
    fn push(&mut self, item: T) {
        self.queue.push_back(item);
    }

    fn next(&mut self) -> Option<T> {
        if self.queue.len() > 1 {
            self.queue.pop_front()
        } else {
            self.queue.front().cloned()
        }
    }
}

#[derive(Default)]
pub struct FakeBackend {
    statuses: Mutex<HashMap<String, Script<ClientResult<JobStatus>>>>,
    status_calls: Mutex<Vec<(String, Instant)>>,
    status_gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    status_outstanding: Mutex<HashMap<String, (usize, usize)>>,

    starts: Mutex<Script<ClientResult<JobStatus>>>,
    start_calls: Mutex<Vec<Option<u32>>>,

    answers: Mutex<Script<ClientResult<ChatResponse>>>,
    chat_requests: Mutex<Vec<ChatRequest>>,
    chat_gate: Mutex<Option<Arc<Semaphore>>>,

    uploads: Mutex<Script<ClientResult<Vec<UploadedFile>>>>,
    upload_calls: Mutex<Vec<Vec<String>>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_status(&self, job_id: &str, result: ClientResult<JobStatus>) {
        self.statuses
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default()
            .push(result);
    }

    /// Holds every `get_status(job_id)` until a permit is released.
    pub fn gate_status(&self, job_id: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.status_gates
            .lock()
            .unwrap()
            .insert(job_id.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn status_calls(&self, job_id: &str) -> usize {
        self.status_call_times(job_id).len()
    }

    pub fn status_call_times(&self, job_id: &str) -> Vec<Instant> {
        self.status_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == job_id)
            .map(|(_, at)| *at)
            .collect()
    }

    /// Largest number of `get_status(job_id)` calls that were outstanding at once.
    pub fn peak_status_in_flight(&self, job_id: &str) -> usize {
        self.status_outstanding
            .lock()
            .unwrap()
            .get(job_id)
            .map(|(_, peak)| *peak)
            .unwrap_or(0)
    }

    pub fn status_in_flight(&self, job_id: &str) -> usize {
        self.status_outstanding
            .lock()
            .unwrap()
            .get(job_id)
            .map(|(now, _)| *now)
            .unwrap_or(0)
    }

    pub fn script_start(&self, result: ClientResult<JobStatus>) {
        self.starts.lock().unwrap().push(result);
    }

    pub fn start_calls(&self) -> Vec<Option<u32>> {
        self.start_calls.lock().unwrap().clone()
    }

    pub fn script_answer(&self, result: ClientResult<ChatResponse>) {
        self.answers.lock().unwrap().push(result);
    }

    pub fn gate_chat(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.chat_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.chat_requests.lock().unwrap().clone()
    }

    pub fn script_upload(&self, result: ClientResult<Vec<UploadedFile>>) {
        self.uploads.lock().unwrap().push(result);
    }

    pub fn upload_calls(&self) -> Vec<Vec<String>> {
        self.upload_calls.lock().unwrap().clone()
    }
}

/// Counts a status call as outstanding until it returns or is dropped mid-flight.
struct Outstanding<'a> {
    backend: &'a FakeBackend,
    job_id: String,
}

impl<'a> Outstanding<'a> {
    fn enter(backend: &'a FakeBackend, job_id: &str) -> Self {
        let mut counts = backend.status_outstanding.lock().unwrap();
        let (now, peak) = counts.entry(job_id.to_string()).or_default();
        *now += 1;
        *peak = (*peak).max(*now);
        Self {
            backend,
            job_id: job_id.to_string(),
        }
    }
}

impl Drop for Outstanding<'_> {
    fn drop(&mut self) {
        let mut counts = self.backend.status_outstanding.lock().unwrap();
        if let Some((now, _)) = counts.get_mut(&self.job_id) {
            *now -= 1;
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn upload(&self, documents: &[DocumentUpload]) -> ClientResult<Vec<UploadedFile>> {
        self.upload_calls
            .lock()
            .unwrap()
            .push(documents.iter().map(|d| d.file_name.clone()).collect());
        self.uploads
            .lock()
            .unwrap()
            .next()
            .unwrap_or_else(|| Err(TransportError::new("Upload failed").into()))
    }

    async fn list_recent(&self, _limit: u32) -> ClientResult<Vec<FileRecord>> {
        Ok(vec![])
    }

    async fn start_processing(&self, limit: Option<u32>) -> ClientResult<JobStatus> {
        self.start_calls.lock().unwrap().push(limit);
        self.starts
            .lock()
            .unwrap()
            .next()
            .unwrap_or_else(|| Err(TransportError::new("Processing could not start").into()))
    }

    async fn get_status(&self, job_id: &str) -> ClientResult<JobStatus> {
        self.status_calls
            .lock()
            .unwrap()
            .push((job_id.to_string(), Instant::now()));
        let _outstanding = Outstanding::enter(self, job_id);

        let gate = self.status_gates.lock().unwrap().get(job_id).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        self.statuses
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(|script| script.next())
            .unwrap_or_else(|| Err(TransportError::new("Job not found").into()))
    }

    async fn ask_question(&self, request: &ChatRequest) -> ClientResult<ChatResponse> {
        self.chat_requests.lock().unwrap().push(request.clone());

        let gate = self.chat_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        self.answers
            .lock()
            .unwrap()
            .next()
            .unwrap_or_else(|| Err(TransportError::new("Chat request failed").into()))
    }
}

pub fn job(job_id: &str, state: JobState, steps: &[(&str, u64, u64)]) -> JobStatus {
    JobStatus {
        job_id: job_id.to_string(),
        state,
        steps: steps
            .iter()
            .map(|(name, current, total)| ProcessStep {
                name: name.to_string(),
                current: *current,
                total: *total,
            })
            .collect(),
        errors: vec![],
    }
}

pub fn answer(text: &str) -> ChatResponse {
    ChatResponse {
        answer: text.to_string(),
        citations: vec![Citation {
            chunk_id: "c1".to_string(),
            source_document: "doc.pdf".to_string(),
            score: 0.92,
            snippet: "...".to_string(),
        }],
        latency_ms: 450.0,
        confidence: 0.87,
    }
}

pub fn transport(message: &str) -> docqa::ClientError {
    TransportError::new(message).into()
}

/// Lets spawned tasks run until `cond` holds, advancing paused time in small steps.
pub async fn settle_until<F: Fn() -> bool>(cond: F) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition never held");
}
