use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response};
use std::collections::VecDeque;
use std::time::Duration;

use super::traits::{AnalysisService, ChannelOpener, PushChannel};
use super::types::{AnalyzeRequest, AnalyzeResponse, HealthStatus, StreamRequest};
use crate::constants::{ANALYZE_PATH, ASK_PATH, HEALTH_CHECK_TIMEOUT_SECS, HEALTH_PATH};
use crate::protocol::SseDecoder;
use crate::utils::{RaglineError, Result};

/// HTTP client for the answering server
///
/// Opens `text/event-stream` channels for streamed answers and issues the
/// plain request/response calls (analysis, health).
#[derive(Debug, Clone)]
pub struct ServerClient {
    client: Client,
    base_url: String,
}

impl ServerClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(RaglineError::Config(format!(
                "server URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Query the health endpoint with a short timeout
    pub async fn health(&self) -> Result<HealthStatus> {
        let health_client = Client::builder()
            .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
            .build()?;

        let response = health_client.get(self.url(HEALTH_PATH)).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RaglineError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ChannelOpener for ServerClient {
    async fn open(&self, request: &StreamRequest) -> Result<Box<dyn PushChannel>> {
        // The event-stream request has no header facility on the server side,
        // so the credential travels as a query parameter.
        let mut params = vec![
            ("query", request.query.clone()),
            ("token", request.token.clone()),
        ];
        params.extend(request.filters.to_params());

        let response = self
            .client
            .get(self.url(ASK_PATH))
            .header(ACCEPT, "text/event-stream")
            .query(&params)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        tracing::debug!(status = %response.status(), "push channel opened");
        Ok(Box::new(HttpPushChannel::new(response.bytes_stream().boxed())))
    }
}

#[async_trait]
impl AnalysisService for ServerClient {
    async fn analyze(&self, request: &str, token: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url(ANALYZE_PATH))
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .json(&AnalyzeRequest { request })
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let body: AnalyzeResponse = response.json().await?;
        Ok(body.result)
    }
}

/// Push channel backed by a streaming HTTP response body
pub(crate) struct HttpPushChannel {
    body: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
    decoder: SseDecoder,
    ready: VecDeque<String>,
}

impl HttpPushChannel {
    pub(crate) fn new(body: BoxStream<'static, reqwest::Result<Bytes>>) -> Self {
        Self {
            body: Some(body),
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
        }
    }
}

#[async_trait]
impl PushChannel for HttpPushChannel {
    async fn next_payload(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(payload) = self.ready.pop_front() {
                return Ok(Some(payload));
            }

            let Some(body) = self.body.as_mut() else {
                return Ok(None);
            };

            match body.next().await {
                Some(Ok(chunk)) => self.ready.extend(self.decoder.push(&chunk)),
                Some(Err(e)) => {
                    self.body = None;
                    return Err(RaglineError::Transport(e.to_string()));
                }
                None => {
                    self.body = None;
                    self.ready.extend(self.decoder.finish());
                }
            }
        }
    }

    async fn close(&mut self) {
        // Dropping the body aborts the underlying connection
        self.body = None;
        self.ready.clear();
    }
}
