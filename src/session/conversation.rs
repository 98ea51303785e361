use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::protocol::Citation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One finalized turn of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: u64,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
    pub timestamp: DateTime<Local>,
}

/// Serialized form of a whole conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub created_at: DateTime<Local>,
    pub saved_at: DateTime<Local>,
    pub entries: Vec<ConversationEntry>,
}

#[derive(Debug)]
struct LogInner {
    created_at: DateTime<Local>,
    next_id: u64,
    entries: Vec<ConversationEntry>,
}

/// Append-only, ordered record of finalized exchanges
///
/// Cloning yields another handle onto the same log. Readers only ever get
/// snapshots, so an entry can't change once appended.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    inner: Arc<Mutex<LogInner>>,
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationLog {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogInner {
                created_at: Local::now(),
                next_id: 1,
                entries: Vec::new(),
            })),
        }
    }

    pub(crate) fn append(
        &self,
        role: Role,
        content: impl Into<String>,
        citations: Vec<Citation>,
    ) -> ConversationEntry {
        let mut inner = self.inner.lock();
        let entry = ConversationEntry {
            id: inner.next_id,
            role,
            content: content.into(),
            citations,
            timestamp: Local::now(),
        };
        inner.next_id += 1;
        inner.entries.push(entry.clone());
        entry
    }

    /// Snapshot of every entry, oldest first
    pub fn entries(&self) -> Vec<ConversationEntry> {
        self.inner.lock().entries.clone()
    }

    pub fn last(&self) -> Option<ConversationEntry> {
        self.inner.lock().entries.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn transcript(&self) -> Transcript {
        let inner = self.inner.lock();
        Transcript {
            created_at: inner.created_at,
            saved_at: Local::now(),
            entries: inner.entries.clone(),
        }
    }

    /// Write the conversation to disk as pretty JSON
    pub fn save_transcript(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&self.transcript())?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write transcript to {}", path.display()))?;

        Ok(())
    }
}
