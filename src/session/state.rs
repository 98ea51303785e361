use serde::{Deserialize, Serialize};

use super::accumulator::AnswerAccumulator;
use crate::constants::CONNECTION_ERROR_MESSAGE;
use crate::protocol::{Citation, Decoded, MemoryUpdate, Message};

/// Lifecycle of a single streamed exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Streaming,
    Finalizing,
    Closed,
}

/// Something that happened on the push channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A payload arrived and was run through the frame codec
    Frame(Decoded),
    /// The channel failed or ended; no further frames are possible
    TransportFailure(String),
}

/// Which terminal path finalized the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Done,
    ServerError,
    TransportFailure,
}

/// The content a session hands over at finalization
#[derive(Debug, Clone, PartialEq)]
pub struct FinalAnswer {
    pub content: String,
    pub citations: Vec<Citation>,
    pub termination: Termination,
}

/// Side effects requested by a transition, applied by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Incremental text for live display
    EmitToken(String),
    /// A `memory` frame was observed
    NotifyMemory(Option<MemoryUpdate>),
    /// Close the channel and record the answer
    Finalize(FinalAnswer),
}

/// Client-side state of one in-flight query
#[derive(Debug, Clone)]
pub struct Session {
    query: String,
    phase: Phase,
    answer: AnswerAccumulator,
}

impl Session {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            phase: Phase::Idle,
            answer: AnswerAccumulator::new(),
        }
    }

    /// Enter `Streaming`; called when the channel is being opened
    pub fn begin(mut self) -> Self {
        if self.phase == Phase::Idle {
            self.phase = Phase::Streaming;
        }
        self
    }

    /// Enter `Closed` once the finalize effect has been carried out
    pub fn close(mut self) -> Self {
        self.phase = Phase::Closed;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn answer(&self) -> &AnswerAccumulator {
        &self.answer
    }

    fn finalize(&mut self, termination: Termination) -> Effect {
        self.phase = Phase::Finalizing;
        let (content, citations) = self.answer.take();
        Effect::Finalize(FinalAnswer {
            content,
            citations,
            termination,
        })
    }
}

/// The session state machine
///
/// Pure: takes the current session and one channel event, returns the next
/// session and the effects to carry out. Only a `Streaming` session reacts;
/// every terminal path yields exactly one `Finalize`.
pub fn transition(mut session: Session, event: ChannelEvent) -> (Session, Vec<Effect>) {
    if session.phase != Phase::Streaming {
        return (session, Vec::new());
    }

    let mut effects = Vec::new();
    match event {
        ChannelEvent::Frame(Decoded::Done) => {
            effects.push(session.finalize(Termination::Done));
        }
        ChannelEvent::Frame(Decoded::Unrecognized) => {}
        ChannelEvent::Frame(Decoded::Message(message)) => {
            session.answer.apply(&message);
            match message {
                Message::Token { text } => effects.push(Effect::EmitToken(text)),
                Message::Memory { data } => effects.push(Effect::NotifyMemory(data)),
                Message::Error { .. } => {
                    effects.push(session.finalize(Termination::ServerError));
                }
                Message::Cached { .. } | Message::Citations { .. } => {}
            }
        }
        ChannelEvent::TransportFailure(_) => {
            if session.answer.is_empty() {
                session.answer = AnswerAccumulator::new();
                session.phase = Phase::Finalizing;
                effects.push(Effect::Finalize(FinalAnswer {
                    content: CONNECTION_ERROR_MESSAGE.to_string(),
                    citations: Vec::new(),
                    termination: Termination::TransportFailure,
                }));
            } else {
                effects.push(session.finalize(Termination::TransportFailure));
            }
        }
    }

    (session, effects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn streaming() -> Session {
        Session::new("Summarize X").begin()
    }

    fn frame(message: Message) -> ChannelEvent {
        ChannelEvent::Frame(Decoded::Message(message))
    }

    fn token(text: &str) -> ChannelEvent {
        frame(Message::Token {
            text: text.to_string(),
        })
    }

    /// Feed events in order, collecting every effect
    fn run(events: Vec<ChannelEvent>) -> (Session, Vec<Effect>) {
        let mut session = streaming();
        let mut all = Vec::new();
        for event in events {
            let (next, effects) = transition(session, event);
            session = next;
            all.extend(effects);
        }
        (session, all)
    }

    fn finalized(effects: &[Effect]) -> Vec<&FinalAnswer> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Finalize(answer) => Some(answer),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_begin_only_from_idle() {
        let session = Session::new("q");
        assert_eq!(session.phase(), Phase::Idle);
        let session = session.begin();
        assert_eq!(session.phase(), Phase::Streaming);
        let session = session.close().begin();
        assert_eq!(session.phase(), Phase::Closed);
    }

    #[test]
    fn test_idle_session_ignores_events() {
        let (session, effects) = transition(Session::new("q"), token("a"));
        assert_eq!(session.phase(), Phase::Idle);
        assert!(effects.is_empty());
        assert!(session.answer().is_empty());
    }

    #[test]
    fn test_tokens_then_done() {
        let (session, effects) = run(vec![
            token("Sum"),
            token("ma"),
            token("ry"),
            ChannelEvent::Frame(Decoded::Done),
        ]);
        assert_eq!(session.phase(), Phase::Finalizing);
        assert_eq!(
            effects[..3].to_vec(),
            vec![
                Effect::EmitToken("Sum".to_string()),
                Effect::EmitToken("ma".to_string()),
                Effect::EmitToken("ry".to_string()),
            ]
        );
        let answers = finalized(&effects);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].content, "Summary");
        assert_eq!(answers[0].termination, Termination::Done);
        // transient state is cleared on finalization
        assert!(session.answer().is_empty());
    }

    #[test]
    fn test_done_with_nothing_finalizes_empty() {
        let (_, effects) = run(vec![ChannelEvent::Frame(Decoded::Done)]);
        assert_eq!(
            finalized(&effects),
            vec![&FinalAnswer {
                content: String::new(),
                citations: vec![],
                termination: Termination::Done,
            }]
        );
    }

    #[test]
    fn test_cached_after_tokens_replaces() {
        let (_, effects) = run(vec![
            token("stale "),
            frame(Message::Cached {
                answer: "X".to_string(),
                citations: vec![Citation::new("doc1", 2)],
            }),
            ChannelEvent::Frame(Decoded::Done),
        ]);
        let answers = finalized(&effects);
        assert_eq!(answers[0].content, "X");
        assert_eq!(answers[0].citations, vec![Citation::new("doc1", 2)]);
    }

    #[test]
    fn test_unrecognized_frames_are_ignored() {
        let (session, effects) = run(vec![
            token("a"),
            ChannelEvent::Frame(Decoded::Unrecognized),
            token("b"),
        ]);
        assert_eq!(session.phase(), Phase::Streaming);
        assert_eq!(session.answer().text(), "ab");
        assert_eq!(effects.len(), 2);
    }

    #[test]
    fn test_memory_frame_notifies_without_touching_answer() {
        let (session, effects) = run(vec![
            token("a"),
            frame(Message::Memory { data: None }),
        ]);
        assert_eq!(effects[1], Effect::NotifyMemory(None));
        assert_eq!(session.answer().text(), "a");
    }

    #[test]
    fn test_error_frame_is_terminal() {
        let (session, effects) = run(vec![
            token("partial"),
            frame(Message::Error {
                message: "boom".to_string(),
            }),
            token("ignored"),
            ChannelEvent::Frame(Decoded::Done),
        ]);
        assert_eq!(session.phase(), Phase::Finalizing);
        let answers = finalized(&effects);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].content, "boom");
        assert_eq!(answers[0].termination, Termination::ServerError);
    }

    #[test]
    fn test_transport_failure_without_text_uses_fallback() {
        let (_, effects) = run(vec![
            frame(Message::Citations {
                data: vec![Citation::new("doc1", 0)],
            }),
            ChannelEvent::TransportFailure("reset".to_string()),
        ]);
        let answers = finalized(&effects);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].content, CONNECTION_ERROR_MESSAGE);
        assert!(answers[0].citations.is_empty());
        assert_eq!(answers[0].termination, Termination::TransportFailure);
    }

    #[test]
    fn test_transport_failure_keeps_partial_text() {
        let (_, effects) = run(vec![
            token("Half "),
            token("done"),
            ChannelEvent::TransportFailure("eof".to_string()),
        ]);
        let answers = finalized(&effects);
        assert_eq!(answers[0].content, "Half done");
        assert_eq!(answers[0].termination, Termination::TransportFailure);
    }

    #[test]
    fn test_nothing_happens_after_finalize() {
        let (session, effects) = run(vec![
            ChannelEvent::Frame(Decoded::Done),
            ChannelEvent::Frame(Decoded::Done),
            ChannelEvent::TransportFailure("late".to_string()),
        ]);
        assert_eq!(finalized(&effects).len(), 1);
        let session = session.close();
        let (session, effects) = transition(session, token("late"));
        assert_eq!(session.phase(), Phase::Closed);
        assert!(effects.is_empty());
    }
}
