use serde::{Deserialize, Serialize};
use std::fmt;

// Files

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub blob_name: String,
    pub original_name: String,
    pub size_bytes: u64,
    pub container: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub name: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    pub container: String,
    #[serde(default = "default_file_status")]
    pub status: Option<String>,
}

fn default_file_status() -> Option<String> {
    Some("pending".to_string())
}

// Processing jobs

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    // The backend reports "pending" for a job it has created but not queued yet.
    #[serde(alias = "pending")]
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            JobState::Queued => 0,
            JobState::Running => 1,
            JobState::Completed | JobState::Failed => 2,
        }
    }

    /// Whether `next` is a legal successor along queued -> running -> {completed, failed}.
    /// Staying in the same non-terminal state counts as legal.
    pub fn can_transition_to(self, next: JobState) -> bool {
        if self.is_terminal() {
            return self == next;
        }
        next.rank() >= self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStep {
    #[serde(rename = "step")]
    pub name: String,
    pub current: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub state: JobState,
    #[serde(default)]
    pub steps: Vec<ProcessStep>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl JobStatus {
    pub fn step(&self, name: &str) -> Option<&ProcessStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Describes every way `next` moves backwards relative to `self`:
    /// state order, step counters, known totals and the error log.
    pub fn regressions(&self, next: &JobStatus) -> Vec<String> {
        let mut found = Vec::new();
        if !self.state.can_transition_to(next.state) {
            found.push(format!("state {} -> {}", self.state, next.state));
        }
        for prev in &self.steps {
            let Some(step) = next.step(&prev.name) else {
                continue;
            };
            if step.current < prev.current {
                found.push(format!(
                    "step {} current {} -> {}",
                    prev.name, prev.current, step.current
                ));
            }
            if prev.total > 0 && step.total < prev.total {
                found.push(format!(
                    "step {} total {} -> {}",
                    prev.name, prev.total, step.total
                ));
            }
        }
        if next.errors.len() < self.errors.len() {
            found.push(format!(
                "errors {} -> {}",
                self.errors.len(),
                next.errors.len()
            ));
        }
        found
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

// Chat

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    pub history: Vec<ChatTurn>,
    pub top_k: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub chunk_id: String,
    pub source_document: String,
    pub score: f64,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub latency_ms: f64,
    pub confidence: f64,
}
