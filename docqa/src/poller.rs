//! Job status poller.
//!
//! Tracks one processing job at a time by fetching its status on a fixed
//! interval until the job settles. All observable state lives in a single
//! `watch` cell stamped with a generation counter: every `track`/`clear`
//! bumps the generation, and a fetch result is applied only if the
//! generation it was issued under is still current. A superseded task is
//! aborted, so at most one status request per poller is ever outstanding.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::Backend;
use crate::error::{ClientError, ClientResult, TransportError, STATUS_FAILED};
use crate::models::JobStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// No job tracked.
    Idle,
    /// A fetch is outstanding or scheduled.
    Polling,
    /// The job reached `completed` or `failed`.
    Settled,
    /// Stopped after too many consecutive failed fetches.
    GaveUp,
}

/// Read-only view of the poller, as published to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct PollView {
    pub job_id: Option<String>,
    pub phase: PollPhase,
    pub status: Option<JobStatus>,
    pub error: Option<TransportError>,
    pub consecutive_failures: u32,
    generation: u64,
}

impl PollView {
    fn idle() -> Self {
        PollView {
            job_id: None,
            phase: PollPhase::Idle,
            status: None,
            error: None,
            consecutive_failures: 0,
            generation: 0,
        }
    }
}

pub struct JobPoller {
    backend: Arc<dyn Backend>,
    interval: Duration,
    failure_limit: Option<u32>,
    cell: Arc<watch::Sender<PollView>>,
    task: Option<JoinHandle<()>>,
}

impl JobPoller {
    pub fn new(backend: Arc<dyn Backend>, interval: Duration) -> Self {
        let (tx, _rx) = watch::channel(PollView::idle());
        Self {
            backend,
            interval,
            failure_limit: None,
            cell: Arc::new(tx),
            task: None,
        }
    }

    /// Give up after `limit` consecutive failed fetches. `None` polls forever.
    pub fn with_failure_limit(mut self, limit: Option<u32>) -> Self {
        self.failure_limit = limit.filter(|n| *n > 0);
        self
    }

    /// Starts tracking `job_id`, withdrawing interest in any previous job.
    ///
    /// Returns `false` without doing anything when `job_id` is already being
    /// polled or has already settled. Must be called inside a tokio runtime.
    pub fn track(&mut self, job_id: impl Into<String>) -> bool {
        let job_id = job_id.into();
        {
            let view = self.cell.borrow();
            let same_job = view.job_id.as_deref() == Some(job_id.as_str());
            if same_job && matches!(view.phase, PollPhase::Polling | PollPhase::Settled) {
                debug!(job_id = %job_id, phase = ?view.phase, "job already tracked");
                return false;
            }
        }

        let mut generation = 0;
        self.cell.send_modify(|view| {
            view.generation += 1;
            generation = view.generation;
            view.job_id = Some(job_id.clone());
            view.phase = PollPhase::Polling;
            view.status = None;
            view.error = None;
            view.consecutive_failures = 0;
        });
        info!(job_id = %job_id, generation, "tracking job");

        self.abort_task();
        self.task = Some(tokio::spawn(run(
            Arc::clone(&self.backend),
            Arc::clone(&self.cell),
            generation,
            job_id,
            self.interval,
            self.failure_limit,
        )));
        true
    }

    /// Withdraws interest in the current job and returns to idle.
    pub fn clear(&mut self) {
        self.cell.send_modify(|view| {
            let generation = view.generation + 1;
            if let Some(job_id) = &view.job_id {
                debug!(job_id = %job_id, "no longer tracking job");
            }
            *view = PollView::idle();
            view.generation = generation;
        });
        self.abort_task();
    }

    // A request already on the wire may still complete server-side; its result
    // never reaches the cell.
    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn view(&self) -> PollView {
        self.cell.borrow().clone()
    }

    pub fn status(&self) -> Option<JobStatus> {
        self.cell.borrow().status.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollView> {
        self.cell.subscribe()
    }

    pub fn clear_error(&self) {
        self.cell.send_if_modified(|view| view.error.take().is_some());
    }

    /// Resolves once the poller is no longer in the `Polling` phase.
    pub async fn wait_settled(&self) -> PollView {
        let mut rx = self.cell.subscribe();
        loop {
            {
                let view = rx.borrow_and_update();
                if view.phase != PollPhase::Polling {
                    return view.clone();
                }
            }
            if rx.changed().await.is_err() {
                return self.view();
            }
        }
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        self.cell.send_modify(|view| view.generation += 1);
        self.abort_task();
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Next {
    Continue,
    Stop,
}

async fn run(
    backend: Arc<dyn Backend>,
    cell: Arc<watch::Sender<PollView>>,
    generation: u64,
    job_id: String,
    interval: Duration,
    failure_limit: Option<u32>,
) {
    loop {
        let result = backend.get_status(&job_id).await;
        if apply(&cell, generation, &job_id, result, failure_limit) == Next::Stop {
            return;
        }
        tokio::time::sleep(interval).await;
        if cell.borrow().generation != generation {
            debug!(job_id = %job_id, "poll timer fired for superseded job");
            return;
        }
    }
}

/// Folds one fetch result into the cell if `generation` is still current.
fn apply(
    cell: &watch::Sender<PollView>,
    generation: u64,
    job_id: &str,
    result: ClientResult<JobStatus>,
    failure_limit: Option<u32>,
) -> Next {
    let mut next = Next::Stop;
    cell.send_if_modified(|view| {
        if view.generation != generation {
            debug!(job_id, generation, current = view.generation, "discarding stale status");
            return false;
        }

        let result = result.and_then(|status| {
            if status.job_id == job_id {
                Ok(status)
            } else {
                warn!(job_id, reported = %status.job_id, "backend reported a different job id");
                Err(TransportError::new(STATUS_FAILED).into())
            }
        });

        match result {
            Ok(status) => {
                if let Some(prev) = &view.status {
                    let regressions = prev.regressions(&status);
                    if !regressions.is_empty() {
                        warn!(job_id, ?regressions, "job status moved backwards");
                    }
                }

                view.consecutive_failures = 0;
                if status.state.is_terminal() {
                    info!(job_id, state = %status.state, errors = status.errors.len(), "job settled");
                    view.phase = PollPhase::Settled;
                } else {
                    debug!(job_id, state = %status.state, "job still in progress");
                    next = Next::Continue;
                }
                view.status = Some(status);
            }
            Err(err) => {
                let err = match err {
                    ClientError::Transport(err) => err,
                    other => TransportError::new(other.to_string()),
                };
                view.consecutive_failures += 1;
                warn!(
                    job_id,
                    failures = view.consecutive_failures,
                    error = %err,
                    "status fetch failed"
                );
                view.error = Some(err);

                match failure_limit {
                    Some(limit) if view.consecutive_failures >= limit => {
                        warn!(job_id, limit, "giving up on job");
                        view.phase = PollPhase::GaveUp;
                    }
                    _ => next = Next::Continue,
                }
            }
        }
        true
    });
    next
}
