use tracing::debug;

use super::HttpBackend;
use crate::error::{ClientResult, CHAT_FAILED};
use crate::models::{ChatRequest, ChatResponse};

pub(super) async fn completions(
    backend: &HttpBackend,
    request: &ChatRequest,
) -> ClientResult<ChatResponse> {
    debug!(
        history = request.history.len(),
        top_k = request.top_k,
        "sending question"
    );
    let builder = backend
        .client
        .post(backend.url("/api/chat/completions"))
        .json(request);
    let response: ChatResponse = backend.send_json(builder, CHAT_FAILED).await?;
    debug!(
        citations = response.citations.len(),
        latency_ms = response.latency_ms,
        "answer received"
    );
    Ok(response)
}
