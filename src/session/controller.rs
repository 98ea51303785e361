use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::conversation::{ConversationEntry, ConversationLog, Role};
use super::state::{transition, ChannelEvent, Effect, FinalAnswer, Session, Termination};
use super::trigger::AnalysisTrigger;
use crate::constants::CONNECTION_ERROR_MESSAGE;
use crate::protocol::{decode, Decoded, MemoryUpdate};
use crate::transport::{AnalysisService, ChannelOpener, PushChannel, QueryFilters, StreamRequest};

/// Receives each `token` text as it arrives
pub type StreamCallback = Arc<dyn Fn(&str) + Send + Sync>;
/// Invoked once per `memory` frame
pub type MemoryCallback = Arc<dyn Fn(Option<&MemoryUpdate>) + Send + Sync>;
/// Transient user-facing notification (e.g. a failed analysis call)
pub type NoticeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Hooks for the rest of the application
#[derive(Clone, Default)]
pub struct SessionObservers {
    pub on_token: Option<StreamCallback>,
    pub on_memory: Option<MemoryCallback>,
    pub on_notice: Option<NoticeCallback>,
}

impl SessionObservers {
    fn token(&self, text: &str) {
        if let Some(callback) = &self.on_token {
            callback(text);
        }
    }

    fn memory(&self, update: Option<&MemoryUpdate>) {
        if let Some(callback) = &self.on_memory {
            callback(update);
        }
    }

    fn notice(&self, message: &str) {
        if let Some(callback) = &self.on_notice {
            callback(message);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyQuery,
    Busy,
}

/// Which route produced an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerPath {
    Stream(Termination),
    Analysis,
}

/// What a call to [`SessionController::submit`] amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Nothing happened; no entry was recorded
    Rejected(RejectReason),
    /// An assistant entry was appended to the log
    Answered {
        entry: ConversationEntry,
        path: AnswerPath,
    },
    /// The analysis call failed; only the user entry was recorded
    Dropped { reason: String },
}

/// Releases the in-flight flag on every exit path
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives query exchanges with the answering server
///
/// At most one exchange is in flight; a submission made while one is running
/// is rejected, never queued. Streaming exchanges are driven through the
/// session state machine, one channel event at a time, and every terminal
/// path closes the channel exactly once.
pub struct SessionController {
    opener: Arc<dyn ChannelOpener>,
    analysis: Arc<dyn AnalysisService>,
    token: String,
    filters: QueryFilters,
    trigger: AnalysisTrigger,
    observers: SessionObservers,
    log: ConversationLog,
    in_flight: AtomicBool,
}

impl SessionController {
    pub fn new(
        opener: Arc<dyn ChannelOpener>,
        analysis: Arc<dyn AnalysisService>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            opener,
            analysis,
            token: token.into(),
            filters: QueryFilters::default(),
            trigger: AnalysisTrigger::default(),
            observers: SessionObservers::default(),
            log: ConversationLog::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_filters(mut self, filters: QueryFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_trigger(mut self, trigger: AnalysisTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_observers(mut self, observers: SessionObservers) -> Self {
        self.observers = observers;
        self
    }

    /// Read handle onto the conversation log
    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Whether an exchange is currently in flight
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Submit a user query
    pub async fn submit(&self, query: &str) -> SubmitOutcome {
        let query = query.trim();
        if query.is_empty() {
            info!("ignoring empty query");
            return SubmitOutcome::Rejected(RejectReason::EmptyQuery);
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            info!("exchange already in flight, rejecting submission");
            return SubmitOutcome::Rejected(RejectReason::Busy);
        };

        // Recorded up front and never rolled back
        self.log.append(Role::User, query, Vec::new());

        if self.trigger.matches(query) {
            self.run_analysis(query).await
        } else {
            self.run_stream(query).await
        }
    }

    async fn run_analysis(&self, query: &str) -> SubmitOutcome {
        debug!("routing query to analysis endpoint");
        match self.analysis.analyze(query, &self.token).await {
            Ok(result) => {
                let entry = self.log.append(Role::Assistant, result, Vec::new());
                info!(entry = entry.id, "analysis answered");
                SubmitOutcome::Answered {
                    entry,
                    path: AnswerPath::Analysis,
                }
            }
            Err(e) => {
                warn!(error = %e, "analysis request failed");
                self.observers.notice(&format!("Analysis failed: {}", e));
                SubmitOutcome::Dropped {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn run_stream(&self, query: &str) -> SubmitOutcome {
        let session = Session::new(query).begin();
        let request = StreamRequest {
            query: query.to_string(),
            token: self.token.clone(),
            filters: self.filters.clone(),
        };

        let mut channel = match self.opener.open(&request).await {
            Ok(channel) => channel,
            Err(e) => {
                // Nothing was opened, so there is nothing to close
                warn!(error = %e, "failed to open push channel");
                let (session, effects) =
                    transition(session, ChannelEvent::TransportFailure(e.to_string()));
                let answer = self.apply_effects(effects).unwrap_or_else(|| FinalAnswer {
                    content: CONNECTION_ERROR_MESSAGE.to_string(),
                    citations: Vec::new(),
                    termination: Termination::TransportFailure,
                });
                return self.record(session, answer);
            }
        };

        let mut session = session;
        loop {
            let event = next_event(channel.as_mut()).await;
            let (next, effects) = transition(session, event);
            session = next;

            if let Some(answer) = self.apply_effects(effects) {
                let outcome = self.record(session, answer);
                channel.close().await;
                return outcome;
            }
        }
    }

    /// Carry out the non-terminal effects, handing back the final answer if
    /// the transition finalized the session
    fn apply_effects(&self, effects: Vec<Effect>) -> Option<FinalAnswer> {
        let mut finalized = None;
        for effect in effects {
            match effect {
                Effect::EmitToken(text) => self.observers.token(&text),
                Effect::NotifyMemory(update) => self.observers.memory(update.as_ref()),
                Effect::Finalize(answer) => finalized = Some(answer),
            }
        }
        finalized
    }

    fn record(&self, session: Session, answer: FinalAnswer) -> SubmitOutcome {
        let entry = self
            .log
            .append(Role::Assistant, answer.content, answer.citations);
        let session = session.close();
        info!(
            entry = entry.id,
            termination = ?answer.termination,
            phase = ?session.phase(),
            "session finalized"
        );
        SubmitOutcome::Answered {
            entry,
            path: AnswerPath::Stream(answer.termination),
        }
    }
}

async fn next_event(channel: &mut dyn PushChannel) -> ChannelEvent {
    match channel.next_payload().await {
        Ok(Some(payload)) => {
            let decoded = decode(&payload);
            match &decoded {
                Decoded::Message(message) => debug!(kind = message.kind(), "frame"),
                Decoded::Done => debug!("done sentinel"),
                Decoded::Unrecognized => warn!(payload = %payload, "ignoring unrecognized frame"),
            }
            ChannelEvent::Frame(decoded)
        }
        Ok(None) => {
            warn!("stream ended before the done sentinel");
            ChannelEvent::TransportFailure("stream ended before [DONE]".to_string())
        }
        Err(e) => {
            warn!(error = %e, "push channel failed");
            ChannelEvent::TransportFailure(e.to_string())
        }
    }
}
