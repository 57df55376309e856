//! Local interaction journal.
//!
//! Appends one JSON line per completed backend interaction to
//! `~/.parley/session-log.jsonl` (configurable). The journal is an audit
//! trail of what was asked and how the backend performed; nothing in the
//! client reads it back, so writes are fire-and-forget and must never fail
//! an operation.

use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::Performance;
use crate::config::{expand_home, schema::JournalConfig};

// ---------------------------------------------------------------------------
// Journal entry
// ---------------------------------------------------------------------------

/// What kind of backend interaction an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Ask,
    EvaluateCriteria,
    EvaluateQa,
    Reset,
}

/// A single journal line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: String,
    pub kind: InteractionKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub question: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output_tokens: Option<u64>,
}

impl JournalEntry {
    /// Build an entry for a completed (or failed) interaction.
    pub fn new(
        kind: InteractionKind,
        question: Option<&str>,
        success: bool,
        performance: Option<&Performance>,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            kind,
            question: question.map(str::to_string),
            success,
            total_time: performance.and_then(|p| p.total_time),
            input_tokens: performance.and_then(|p| p.input_tokens),
            output_tokens: performance.and_then(|p| p.output_tokens),
        }
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Resolve the journal file path from config.
pub fn journal_path(config: &JournalConfig) -> PathBuf {
    expand_home(&config.path)
}

/// Record an interaction. A disabled journal or a write error is silently
/// ignored.
pub fn record(config: &JournalConfig, entry: &JournalEntry) {
    if !config.enabled {
        return;
    }
    let _ = append_entry(&journal_path(config), entry);
}

fn append_entry(path: &PathBuf, entry: &JournalEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(entry)?;
    writeln!(file, "{line}")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn entry_serializes_without_empty_fields() {
        let entry = JournalEntry {
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            kind: InteractionKind::Reset,
            question: None,
            success: true,
            total_time: None,
            input_tokens: None,
            output_tokens: None,
        };
        let line = serde_json::to_string(&entry).unwrap();
        assert!(line.contains("\"kind\":\"reset\""));
        assert!(!line.contains("question"));
        assert!(!line.contains("total_time"));
    }

    #[test]
    fn entry_carries_performance_metrics() {
        let perf = Performance {
            total_time: Some(900),
            input_tokens: Some(10),
            output_tokens: Some(5),
            ..Performance::default()
        };
        let entry = JournalEntry::new(InteractionKind::Ask, Some("why"), true, Some(&perf));
        assert_eq!(entry.total_time, Some(900));
        assert_eq!(entry.input_tokens, Some(10));
        assert_eq!(entry.question.as_deref(), Some("why"));
    }

    #[test]
    fn disabled_journal_writes_nothing() {
        let path = std::env::temp_dir().join("parley-journal-disabled.jsonl");
        let _ = fs::remove_file(&path);
        let config = JournalConfig {
            enabled: false,
            path: path.to_string_lossy().into_owned(),
        };
        record(
            &config,
            &JournalEntry::new(InteractionKind::Ask, Some("q"), true, None),
        );
        assert!(!path.exists());
    }

    #[test]
    fn record_appends_lines() {
        let path = std::env::temp_dir().join("parley-journal-test.jsonl");
        let _ = fs::remove_file(&path);
        let config = JournalConfig {
            enabled: true,
            path: path.to_string_lossy().into_owned(),
        };

        record(
            &config,
            &JournalEntry::new(InteractionKind::Ask, Some("one"), true, None),
        );
        record(
            &config,
            &JournalEntry::new(InteractionKind::Reset, None, false, None),
        );

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: JournalEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.kind, InteractionKind::Ask);
        assert_eq!(first.question.as_deref(), Some("one"));

        let _ = fs::remove_file(&path);
    }
}
