//! Durable prompt history.
//!
//! Previously submitted questions, oldest first, persisted as a JSON array
//! of strings so the sequence survives restarts. Two invariants:
//!
//! - distinct-adjacent: a question is only appended when it differs from the
//!   last recorded entry, so resubmitting the same prompt never duplicates it
//! - append-only: navigation reads entries, it never rewrites them
//!
//! Persistence failures are non-fatal: a history that cannot be written
//! degrades to in-memory for the session.

use std::fs;
use std::path::PathBuf;

/// Ordered store of submitted questions with optional file persistence.
#[derive(Debug, Clone, Default)]
pub struct PromptHistory {
    entries: Vec<String>,
    path: Option<PathBuf>,
}

impl PromptHistory {
    /// A history that lives only for this process. Used by tests and as the
    /// fallback when no home directory can be resolved.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load history from `path`, creating an empty one if the file is
    /// missing or unreadable. Malformed content is discarded rather than
    /// failing the session.
    pub fn load(path: PathBuf) -> Self {
        let entries = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str::<Vec<String>>(&content).ok())
            .unwrap_or_default();
        Self {
            entries,
            path: Some(path),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// The k-th most recent entry (`k` in `1..=len`).
    pub fn entry_from_latest(&self, k: usize) -> Option<&str> {
        if k == 0 || k > self.entries.len() {
            return None;
        }
        Some(self.entries[self.entries.len() - k].as_str())
    }

    /// Record a submitted question. Returns `true` when the entry was
    /// appended, `false` when it matched the current tail and was skipped.
    pub fn record(&mut self, text: &str) -> bool {
        if self.entries.last().is_some_and(|last| last == text) {
            return false;
        }
        self.entries.push(text.to_string());
        self.persist();
        true
    }

    /// Write the entries back to disk. Errors are swallowed: losing history
    /// durability must never break the conversation.
    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(content) = serde_json::to_string(&self.entries) {
            let _ = fs::write(path, content);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
