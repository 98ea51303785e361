use async_trait::async_trait;

use super::types::StreamRequest;
use crate::utils::Result;

/// An open server-to-client push connection for one query
#[async_trait]
pub trait PushChannel: Send {
    /// Wait for the next raw event payload
    ///
    /// `Ok(None)` means the server ended the stream.
    async fn next_payload(&mut self) -> Result<Option<String>>;

    /// Release the connection
    async fn close(&mut self);
}

/// Opens push channels against the streaming endpoint
#[async_trait]
pub trait ChannelOpener: Send + Sync {
    async fn open(&self, request: &StreamRequest) -> Result<Box<dyn PushChannel>>;
}

/// One-shot request/response path for analysis queries
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, request: &str, token: &str) -> Result<String>;
}
