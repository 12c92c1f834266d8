//! HTTP plumbing shared by the adapters
//!
//! One POST per call, no retries. Non-success statuses are classified into
//! request or transport errors; SSE bodies are read line by line.

use futures::stream::Stream;
use futures::StreamExt;
use reqwest::RequestBuilder;
use serde_json::Value;
use std::pin::Pin;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use crate::core::{AgentError, AgentResult};

/// Stream of SSE `data:` payloads
pub(crate) type DataStream = Pin<Box<dyn Stream<Item = AgentResult<String>> + Send>>;

/// Send a JSON request and parse the JSON response body.
pub(crate) async fn send_json(
    provider: &str,
    builder: RequestBuilder,
    body: &Value,
) -> AgentResult<Value> {
    tracing::debug!("[{}] Request JSON: {}", provider, body);

    let response = builder
        .json(body)
        .send()
        .await
        .map_err(|e| AgentError::from_reqwest(provider, e))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AgentError::transport(provider, format!("failed to read body: {}", e)))?;

    tracing::debug!("[{}] Response status: {}", provider, status);

    if !status.is_success() {
        tracing::error!("[{}] API error: {} - {}", provider, status, text);
        return Err(AgentError::from_status(provider, status.as_u16(), text));
    }

    serde_json::from_str(&text).map_err(|e| {
        AgentError::transport(provider, format!("invalid JSON in response: {}", e))
    })
}

/// Open a streamed connection and yield each SSE `data:` payload.
///
/// Comment lines, `event:` lines and blank separators are skipped.
pub(crate) async fn open_sse(
    provider: &str,
    builder: RequestBuilder,
    body: &Value,
) -> AgentResult<DataStream> {
    tracing::debug!("[{}] Streaming request JSON: {}", provider, body);

    let response = builder
        .header("Accept", "text/event-stream")
        .json(body)
        .send()
        .await
        .map_err(|e| AgentError::from_reqwest(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "failed to read error body".to_string());
        tracing::error!("[{}] Streaming API error: {} - {}", provider, status, error_text);
        return Err(AgentError::from_status(provider, status.as_u16(), error_text));
    }

    tracing::info!("[{}] Streaming response started", provider);

    let byte_stream = response
        .bytes_stream()
        .map(|result| result.map_err(|e| std::io::Error::other(e.to_string())));
    let buf_reader = tokio::io::BufReader::new(StreamReader::new(byte_stream));
    let provider = provider.to_string();

    let stream = async_stream::try_stream! {
        let mut lines = buf_reader.lines();
        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| AgentError::transport(&provider, format!("stream broken: {}", e)))?;
            let Some(line) = line else { break };

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();
            if data.is_empty() {
                continue;
            }
            yield data.to_string();
        }
    };

    Ok(Box::pin(stream))
}

/// Parse one SSE payload, mapping bad JSON to a transport error.
pub(crate) fn parse_event<T: serde::de::DeserializeOwned>(
    provider: &str,
    data: &str,
) -> AgentResult<T> {
    serde_json::from_str(data).map_err(|e| {
        AgentError::transport(provider, format!("malformed stream chunk: {}", e))
    })
}
