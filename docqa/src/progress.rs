//! Projection of a job status into display ratios.
//!
//! Everything here is a pure function of its input.

use std::fmt;

use crate::models::{JobState, JobStatus, ProcessStep};

#[derive(Debug, Clone, PartialEq)]
pub struct StepProgress {
    pub name: String,
    pub current: u64,
    /// `total` when known, else `current`, else zero.
    pub denominator: u64,
    /// Always within `0.0..=100.0`.
    pub percent: f64,
}

impl StepProgress {
    pub fn from_step(step: &ProcessStep) -> Self {
        let percent = if step.total > 0 {
            (100.0 * step.current as f64 / step.total as f64).clamp(0.0, 100.0)
        } else {
            0.0
        };
        let denominator = if step.total > 0 {
            step.total
        } else {
            step.current
        };
        StepProgress {
            name: step.name.clone(),
            current: step.current,
            denominator,
            percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub state: JobState,
    pub steps: Vec<StepProgress>,
    pub busy: bool,
    pub settled: bool,
    pub errors: Vec<String>,
}

pub fn project(status: &JobStatus) -> ProgressView {
    ProgressView {
        state: status.state,
        steps: status.steps.iter().map(StepProgress::from_step).collect(),
        busy: status.state == JobState::Running,
        settled: status.state.is_terminal(),
        errors: status.errors.clone(),
    }
}

/// Picks the snapshot to display: a live poll result always overrides the
/// cached one returned when the run was started.
pub fn select_snapshot<'a>(
    live: Option<&'a JobStatus>,
    cached: Option<&'a JobStatus>,
) -> Option<&'a JobStatus> {
    live.or(cached)
}

impl fmt::Display for ProgressView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(
                f,
                "{:<20} {:>6}/{:<6} {:>5.1}%",
                step.name, step.current, step.denominator, step.percent
            )?;
        }
        write!(f, "State: {}", self.state)?;
        if !self.errors.is_empty() {
            write!(f, "\n{}", self.errors.join("\n"))?;
        }
        Ok(())
    }
}
