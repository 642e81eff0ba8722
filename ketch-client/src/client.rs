//! HTTP implementations of the bridge's streaming transports.
//!
//! Each open call issues a POST against the workspace backend and reads the
//! chunked `text/event-stream` response on a spawned pump task. Decoded
//! events flow through a channel into the stream handed back to the caller;
//! malformed wire chunks are dropped with a debug log, never surfaced as
//! stream errors. When the cancellation token fires the pump terminates the
//! stream with `TransportError::Aborted` and drops the response, tearing the
//! request down.

use std::path::Path;

use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use ketch_bridge::session::SessionId;
use ketch_bridge::transport::{
    AgentStream, AgentTransport, ExecStream, ExecTransport, TransportError,
};

use crate::sse::SseLineBuffer;

/// Connection settings for the workspace backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL, e.g. `https://workspace.example.dev`.
    pub base_url: String,
    /// Bearer token attached to every request, when set.
    pub auth_token: Option<String>,
}

impl ClientConfig {
    /// Config for an unauthenticated backend at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
        }
    }

    /// Attach a bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct PromptRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cwd: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ExecRequest<'a> {
    command: &'a str,
}

/// HTTP client implementing both transport traits.
#[derive(Debug, Clone)]
pub struct WorkspaceClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl WorkspaceClient {
    /// Create a client over a default `reqwest` connection pool.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn request(&self, path: &str, body: &impl Serialize) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .post(join_url(&self.config.base_url, path))
            .header("Accept", "text/event-stream")
            .json(body);
        if let Some(token) = &self.config.auth_token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Send the request and hand the response body to a pump task, returning
    /// the channel-backed event stream.
    async fn open<T>(
        &self,
        req: reqwest::RequestBuilder,
        cancel: CancellationToken,
    ) -> Result<std::pin::Pin<Box<dyn futures_util::Stream<Item = Result<T, TransportError>> + Send>>, TransportError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let response = req
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let (tx, rx) = flume::unbounded::<Result<T, TransportError>>();
        tokio::spawn(pump(response, tx, cancel));
        Ok(rx.into_stream().boxed())
    }
}

/// Read the response body chunk by chunk, decode SSE lines into events and
/// forward them until the body ends, the receiver is dropped, or the token
/// fires.
async fn pump<T>(
    response: reqwest::Response,
    tx: flume::Sender<Result<T, TransportError>>,
    cancel: CancellationToken,
) where
    T: DeserializeOwned,
{
    let mut body = response.bytes_stream();
    let mut buffer = SseLineBuffer::new();

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = tx.send(Err(TransportError::Aborted));
                return;
            }
            chunk = body.next() => chunk,
        };

        match chunk {
            // Clean end of stream: the backend closed the connection.
            None => return,
            Some(Err(e)) => {
                let _ = tx.send(Err(TransportError::Stream(e.to_string())));
                return;
            }
            Some(Ok(bytes)) => {
                for data in buffer.push(&bytes) {
                    match serde_json::from_str::<T>(&data) {
                        Ok(event) => {
                            if tx.send(Ok(event)).is_err() {
                                // Receiver dropped; stop reading.
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "dropping malformed stream chunk");
                        }
                    }
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl AgentTransport for WorkspaceClient {
    async fn open_prompt(
        &self,
        session: &SessionId,
        prompt: &str,
        cwd: Option<&Path>,
        cancel: CancellationToken,
    ) -> Result<AgentStream, TransportError> {
        let cwd = cwd.map(|p| p.to_string_lossy().into_owned());
        let body = PromptRequest {
            prompt,
            cwd: cwd.as_deref(),
        };
        let path = format!("/api/sessions/{}/agent/stream", session.as_str());
        self.open(self.request(&path, &body), cancel).await
    }
}

#[async_trait::async_trait]
impl ExecTransport for WorkspaceClient {
    async fn open_exec(
        &self,
        session: &SessionId,
        command: &str,
        cancel: CancellationToken,
    ) -> Result<ExecStream, TransportError> {
        let body = ExecRequest { command };
        let path = format!("/api/sessions/{}/exec/stream", session.as_str());
        self.open(self.request(&path, &body), cancel).await
    }
}

/// Join a base URL and an absolute path without doubling slashes.
fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
