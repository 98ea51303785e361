use serde::{Deserialize, Serialize};

use crate::constants::DONE_SENTINEL;

/// A source passage the server used to build its answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Document identifier (usually the uploaded filename)
    pub source: String,
    pub chunk_index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
}

impl Citation {
    pub fn new(source: impl Into<String>, chunk_index: i64) -> Self {
        Self {
            source: source.into(),
            chunk_index,
            excerpt: None,
            section: None,
            page: None,
        }
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }
}

/// What the server decided to remember about the exchange
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryUpdate {
    /// Whether anything was persisted; `target` is absent when not
    pub written: bool,
    pub target: Option<String>,
    pub summary: Option<String>,
}

/// Typed stream frame, discriminated by its `type` field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Token {
        text: String,
    },
    Cached {
        answer: String,
        #[serde(default)]
        citations: Vec<Citation>,
    },
    Citations {
        data: Vec<Citation>,
    },
    Memory {
        #[serde(default)]
        data: Option<MemoryUpdate>,
    },
    Error {
        message: String,
    },
}

impl Message {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Token { .. } => "token",
            Message::Cached { .. } => "cached",
            Message::Citations { .. } => "citations",
            Message::Memory { .. } => "memory",
            Message::Error { .. } => "error",
        }
    }
}

/// Result of decoding one raw payload
///
/// `Done` is kept apart from `Message`: it is framing, not a message kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Done,
    Message(Message),
    Unrecognized,
}

/// Decode a raw event payload
pub fn decode(payload: &str) -> Decoded {
    if payload == DONE_SENTINEL {
        return Decoded::Done;
    }

    match serde_json::from_str::<Message>(payload) {
        Ok(message) => Decoded::Message(message),
        Err(_) => Decoded::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_done_sentinel() {
        assert_eq!(decode("[DONE]"), Decoded::Done);
        // Only the exact literal terminates
        assert_eq!(decode(" [DONE]"), Decoded::Unrecognized);
        assert_eq!(decode("\"[DONE]\""), Decoded::Unrecognized);
    }

    #[test]
    fn test_decode_token() {
        assert_eq!(
            decode(r#"{"type":"token","text":"Sum"}"#),
            Decoded::Message(Message::Token {
                text: "Sum".to_string()
            })
        );
    }

    #[test]
    fn test_decode_cached_with_citations() {
        let decoded = decode(
            r#"{"type":"cached","answer":"X","citations":[{"source":"doc1","chunk_index":2,"excerpt":"abc","section":"Intro","page":null}]}"#,
        );
        let mut citation = Citation::new("doc1", 2).with_excerpt("abc");
        citation.section = Some("Intro".to_string());
        assert_eq!(
            decoded,
            Decoded::Message(Message::Cached {
                answer: "X".to_string(),
                citations: vec![citation],
            })
        );
    }

    #[test]
    fn test_decode_cached_without_citations() {
        assert_eq!(
            decode(r#"{"type":"cached","answer":"X"}"#),
            Decoded::Message(Message::Cached {
                answer: "X".to_string(),
                citations: vec![],
            })
        );
    }

    #[test]
    fn test_decode_citations_without_excerpt() {
        assert_eq!(
            decode(r#"{"type":"citations","data":[{"source":"doc1","chunk_index":2}]}"#),
            Decoded::Message(Message::Citations {
                data: vec![Citation::new("doc1", 2)]
            })
        );
    }

    #[test]
    fn test_decode_memory() {
        assert_eq!(
            decode(r#"{"type":"memory"}"#),
            Decoded::Message(Message::Memory { data: None })
        );

        let decoded = decode(
            r#"{"type":"memory","data":{"written":true,"target":"USER_MEMORY","summary":"Prefers metric units"}}"#,
        );
        let Decoded::Message(Message::Memory { data: Some(update) }) = decoded else {
            panic!("expected memory frame, got {:?}", decoded);
        };
        assert_eq!(
            update,
            MemoryUpdate {
                written: true,
                target: Some("USER_MEMORY".to_string()),
                summary: Some("Prefers metric units".to_string()),
            }
        );
    }

    #[test]
    fn test_decode_memory_not_written() {
        let decoded = decode(r#"{"type":"memory","data":{"written":false,"target":null,"summary":""}}"#);
        let Decoded::Message(Message::Memory { data: Some(update) }) = decoded else {
            panic!("expected memory frame, got {:?}", decoded);
        };
        assert!(!update.written);
        assert_eq!(update.target, None);
    }

    #[test]
    fn test_decode_error() {
        assert_eq!(
            decode(r#"{"type":"error","message":"boom"}"#),
            Decoded::Message(Message::Error {
                message: "boom".to_string()
            })
        );
    }

    #[test]
    fn test_decode_rejects_unknown_and_garbage() {
        assert_eq!(decode(r#"{"type":"progress","pct":10}"#), Decoded::Unrecognized);
        assert_eq!(decode(r#"{"text":"no type"}"#), Decoded::Unrecognized);
        assert_eq!(decode(r#"{"type":"token"}"#), Decoded::Unrecognized);
        assert_eq!(decode(r#"{"type":"tok"#), Decoded::Unrecognized);
        assert_eq!(decode(""), Decoded::Unrecognized);
    }
}
