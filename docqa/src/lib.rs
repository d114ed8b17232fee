//! Client-side orchestration for a document question-answering backend:
//! upload documents, follow the processing job that indexes them, and hold a
//! conversation against the resulting index.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod poller;
pub mod progress;
pub mod render;
pub mod session;
pub mod workflow;

pub use api::{Backend, DocumentUpload, HttpBackend};
pub use config::Config;
pub use error::{ClientError, ClientResult, TransportError, ValidationError};
pub use poller::{JobPoller, PollPhase, PollView};
pub use progress::{project, ProgressView};
pub use session::{ChatSession, SessionOptions};
