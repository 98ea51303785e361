use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::{
    cli::OutputFormat,
    constants::CONNECTION_ERROR_MESSAGE,
    protocol::Citation,
    session::{AnswerPath, RejectReason, SessionController, SessionObservers, SubmitOutcome, Termination},
};

/// Result of a non-interactive run
#[derive(Debug, Serialize, Deserialize)]
pub struct NonInteractiveResult {
    /// The prompt that was executed
    pub prompt: String,
    /// The recorded answer, empty when nothing was recorded
    pub response: String,
    /// Sources backing the answer
    pub citations: Vec<Citation>,
    /// Anything that went wrong along the way
    pub errors: Vec<String>,
    pub metadata: ExecutionMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Server the query was sent to
    pub server: String,
    /// `stream`, `analysis`, or absent when no answer was recorded
    pub route: Option<String>,
    pub termination: Option<Termination>,
    /// Memory frames seen during the exchange
    pub memory_updates: usize,
    pub duration_ms: u128,
}

impl NonInteractiveResult {
    /// Whether the run should exit non-zero
    pub fn is_failure(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Runs a single prompt through a session controller
pub struct NonInteractiveRunner {
    controller: SessionController,
    server: String,
    notices: Arc<Mutex<Vec<String>>>,
    memory_updates: Arc<Mutex<usize>>,
}

impl NonInteractiveRunner {
    /// Wrap a controller, installing observers that collect notices and
    /// memory activity for the result
    pub fn new(controller: SessionController, server: impl Into<String>) -> Self {
        let notices = Arc::new(Mutex::new(Vec::new()));
        let memory_updates = Arc::new(Mutex::new(0usize));

        let notice_sink = Arc::clone(&notices);
        let memory_sink = Arc::clone(&memory_updates);
        let observers = SessionObservers {
            on_token: None,
            on_memory: Some(Arc::new(move |_| *memory_sink.lock() += 1)),
            on_notice: Some(Arc::new(move |message: &str| {
                notice_sink.lock().push(message.to_string())
            })),
        };

        Self {
            controller: controller.with_observers(observers),
            server: server.into(),
            notices,
            memory_updates,
        }
    }

    /// Execute a single prompt and return the result
    pub async fn execute(&self, prompt: String) -> NonInteractiveResult {
        let start_time = Instant::now();
        let outcome = self.controller.submit(&prompt).await;

        let mut errors = Vec::new();
        let mut response = String::new();
        let mut citations = Vec::new();
        let mut route = None;
        let mut termination = None;

        match outcome {
            SubmitOutcome::Rejected(RejectReason::EmptyQuery) => {
                errors.push("Empty prompt".to_string());
            }
            SubmitOutcome::Rejected(RejectReason::Busy) => {
                errors.push("Another query is already in flight".to_string());
            }
            SubmitOutcome::Dropped { reason } => {
                errors.push(format!("Analysis failed: {}", reason));
            }
            SubmitOutcome::Answered { entry, path } => {
                match path {
                    AnswerPath::Analysis => route = Some("analysis".to_string()),
                    AnswerPath::Stream(t) => {
                        route = Some("stream".to_string());
                        termination = Some(t);
                        if t == Termination::TransportFailure
                            && entry.content == CONNECTION_ERROR_MESSAGE
                        {
                            errors.push(CONNECTION_ERROR_MESSAGE.to_string());
                        }
                    }
                }
                response = entry.content;
                citations = entry.citations;
            }
        }

        // Notices duplicate the dropped reason; keep only ones not already reported
        for notice in self.notices.lock().drain(..) {
            if !errors.iter().any(|e| e == &notice) {
                errors.push(notice);
            }
        }

        NonInteractiveResult {
            prompt,
            response,
            citations,
            errors,
            metadata: ExecutionMetadata {
                server: self.server.clone(),
                route,
                termination,
                memory_updates: *self.memory_updates.lock(),
                duration_ms: start_time.elapsed().as_millis(),
            },
        }
    }

    /// Format the result according to the output format
    pub fn format_result(&self, result: &NonInteractiveResult, format: OutputFormat) -> String {
        format_result(result, format)
    }
}

pub fn format_result(result: &NonInteractiveResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_else(|e| {
            format!("{{\"error\": \"Failed to serialize result: {}\"}}", e)
        }),
        OutputFormat::Text => {
            let mut output = String::new();
            output.push_str(&result.response);

            if !result.citations.is_empty() {
                output.push_str("\n\n--- Sources ---\n");
                for (i, citation) in result.citations.iter().enumerate() {
                    output.push_str(&format!("[{}] {}\n", i + 1, describe_citation(citation)));
                }
            }

            if !result.errors.is_empty() {
                output.push_str("\n--- Errors ---\n");
                for error in &result.errors {
                    output.push_str(&format!("- {}\n", error));
                }
            }

            output
        }
        OutputFormat::Markdown => {
            let mut output = String::new();

            output.push_str("## Response\n\n");
            output.push_str(&result.response);
            output.push_str("\n\n");

            if !result.citations.is_empty() {
                output.push_str("## Sources\n\n");
                for citation in &result.citations {
                    output.push_str(&format!("- {}\n", describe_citation(citation)));
                    if let Some(excerpt) = &citation.excerpt {
                        output.push_str(&format!("  > {}\n", excerpt.replace('\n', " ")));
                    }
                }
                output.push('\n');
            }

            if !result.errors.is_empty() {
                output.push_str("## Errors\n\n");
                for error in &result.errors {
                    output.push_str(&format!("- {}\n", error));
                }
                output.push('\n');
            }

            output.push_str("---\n");
            output.push_str(&format!(
                "*Server: {} | Route: {} | Duration: {}ms*\n",
                result.metadata.server,
                result.metadata.route.as_deref().unwrap_or("none"),
                result.metadata.duration_ms
            ));

            output
        }
    }
}

/// `source#chunk (section, p. N)`
pub fn describe_citation(citation: &Citation) -> String {
    let mut label = format!("{}#{}", citation.source, citation.chunk_index);
    let mut location = Vec::new();
    if let Some(section) = &citation.section {
        location.push(section.clone());
    }
    if let Some(page) = citation.page {
        location.push(format!("p. {}", page));
    }
    if !location.is_empty() {
        label.push_str(&format!(" ({})", location.join(", ")));
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::AnalysisTrigger;
    use crate::transport::{ChannelOpener, MockAnalysisService, PushChannel, StreamRequest};
    use crate::utils::{RaglineError, Result};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct RefusingOpener;

    #[async_trait]
    impl ChannelOpener for RefusingOpener {
        async fn open(&self, _request: &StreamRequest) -> Result<Box<dyn PushChannel>> {
            Err(RaglineError::Transport("connection refused".to_string()))
        }
    }

    fn runner(analysis: MockAnalysisService) -> NonInteractiveRunner {
        let controller =
            SessionController::new(Arc::new(RefusingOpener), Arc::new(analysis), "tok");
        NonInteractiveRunner::new(controller, "http://127.0.0.1:8000")
    }

    fn sample_result() -> NonInteractiveResult {
        NonInteractiveResult {
            prompt: "What is X?".to_string(),
            response: "X is a thing.".to_string(),
            citations: vec![Citation {
                section: Some("Intro".to_string()),
                page: Some(4),
                ..Citation::new("doc.pdf", 2)
            }],
            errors: Vec::new(),
            metadata: ExecutionMetadata {
                server: "http://127.0.0.1:8000".to_string(),
                route: Some("stream".to_string()),
                termination: Some(Termination::Done),
                memory_updates: 0,
                duration_ms: 12,
            },
        }
    }

    #[tokio::test]
    async fn test_connection_failure_is_reported() {
        let result = runner(MockAnalysisService::new())
            .execute("What is X?".to_string())
            .await;

        assert_eq!(result.response, CONNECTION_ERROR_MESSAGE);
        assert_eq!(result.metadata.termination, Some(Termination::TransportFailure));
        assert!(result.is_failure());
    }

    #[tokio::test]
    async fn test_analysis_answer() {
        let mut analysis = MockAnalysisService::new();
        analysis
            .expect_analyze()
            .times(1)
            .returning(|_, _| Ok("Sunny".to_string()));

        let result = runner(analysis).execute("weather in Oslo".to_string()).await;

        assert_eq!(result.response, "Sunny");
        assert_eq!(result.metadata.route.as_deref(), Some("analysis"));
        assert!(!result.is_failure());
    }

    #[tokio::test]
    async fn test_dropped_analysis_is_a_failure() {
        let mut analysis = MockAnalysisService::new();
        analysis
            .expect_analyze()
            .returning(|_, _| Err(RaglineError::Status { status: 500, body: "boom".to_string() }));

        let result = runner(analysis).execute("analyze sales".to_string()).await;

        assert!(result.response.is_empty());
        assert_eq!(result.metadata.route, None);
        assert_eq!(result.errors.len(), 1);
        assert!(result.is_failure());
    }

    #[tokio::test]
    async fn test_empty_prompt_is_a_failure() {
        let controller = SessionController::new(
            Arc::new(RefusingOpener),
            Arc::new(MockAnalysisService::new()),
            "tok",
        )
        .with_trigger(AnalysisTrigger::disabled());
        let runner = NonInteractiveRunner::new(controller, "http://127.0.0.1:8000");

        let result = runner.execute("   ".to_string()).await;
        assert_eq!(result.errors, vec!["Empty prompt".to_string()]);
    }

    #[test]
    fn test_text_format_lists_sources() {
        let text = format_result(&sample_result(), OutputFormat::Text);
        assert!(text.starts_with("X is a thing."));
        assert!(text.contains("[1] doc.pdf#2 (Intro, p. 4)"));
        assert!(!text.contains("Errors"));
    }

    #[test]
    fn test_markdown_format() {
        let markdown = format_result(&sample_result(), OutputFormat::Markdown);
        assert!(markdown.starts_with("## Response\n\nX is a thing."));
        assert!(markdown.contains("## Sources"));
        assert!(markdown.contains("Route: stream"));
    }

    #[test]
    fn test_json_format() {
        let json = format_result(&sample_result(), OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["response"], "X is a thing.");
        assert_eq!(value["metadata"]["termination"], "done");
        assert_eq!(value["citations"][0]["chunk_index"], 2);
    }
}
