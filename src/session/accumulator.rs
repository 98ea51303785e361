use crate::protocol::{Citation, Message};

/// In-progress answer text and citation set for one session
///
/// Text only grows by appending, except for the wholesale replacements
/// driven by `cached` and `error` frames. Citations are always replaced as
/// a whole snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerAccumulator {
    buffer: String,
    citations: Vec<Citation>,
}

impl AnswerAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the effect of one message on buffer and citations
    pub fn apply(&mut self, message: &Message) {
        match message {
            Message::Token { text } => self.buffer.push_str(text),
            Message::Cached { answer, citations } => {
                self.buffer = answer.clone();
                self.citations = citations.clone();
            }
            Message::Citations { data } => self.citations = data.clone(),
            Message::Memory { .. } => {}
            Message::Error { message } => self.buffer = message.clone(),
        }
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Move the contents out, leaving the accumulator cleared
    pub fn take(&mut self) -> (String, Vec<Citation>) {
        (
            std::mem::take(&mut self.buffer),
            std::mem::take(&mut self.citations),
        )
    }
}
