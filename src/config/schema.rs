//! Configuration schema and defaults.
//!
//! Maps to `~/.parley/config.toml` and `.parley.toml`. Sections:
//! `[backend]` (where the question-answering service lives), `[evaluation]`
//! (default criteria for answer scoring), `[history]` (durable prompt
//! history) and `[journal]` (local interaction log). Every field has a
//! built-in default; users only set what they want to change.

use serde::{Deserialize, Serialize};

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    pub backend: BackendConfig,
    pub evaluation: EvaluationConfig,
    pub history: HistoryConfig,
    pub journal: JournalConfig,
}

// ---------------------------------------------------------------------------
// [backend]
// ---------------------------------------------------------------------------

/// Where the backend lives and how long to wait for it.
///
/// There is no client-side retry and no timeout beyond this transport-level
/// one; chain answers routinely take tens of seconds, hence the generous
/// default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the question-answering service.
    pub url: String,
    /// Transport timeout per request (milliseconds).
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5555".to_string(),
            timeout_ms: 120_000,
        }
    }
}

// ---------------------------------------------------------------------------
// [evaluation]
// ---------------------------------------------------------------------------

/// Default criteria for scoring answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Criterion names sent comma-joined to the criteria evaluator.
    pub criteria: Vec<String>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            criteria: vec![
                "helpful".to_string(),
                "detailed".to_string(),
                "relevant to software engineering".to_string(),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// [history]
// ---------------------------------------------------------------------------

/// Durable prompt history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Where submitted questions are persisted. `~` expands to the home
    /// directory.
    pub path: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: "~/.parley/history.json".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// [journal]
// ---------------------------------------------------------------------------

/// Interaction journal settings (JSONL, one entry per completed call).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub enabled: bool,
    /// Path to the journal file. `~` expands to the home directory.
    pub path: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.parley/session-log.jsonl".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default TOML content
// ---------------------------------------------------------------------------

impl ParleyConfig {
    /// Annotated starting config written by `parley config init`.
    pub fn default_toml() -> String {
        r#"# parley configuration
#
# Configuration hierarchy (highest precedence wins):
#   1. Environment variables (PARLEY_*)
#   2. Project config (.parley.toml in current directory)
#   3. User global config (~/.parley/config.toml)
#   4. Built-in defaults

[backend]
url = "http://localhost:5555"
timeout_ms = 120000

[evaluation]
criteria = ["helpful", "detailed", "relevant to software engineering"]

[history]
path = "~/.parley/history.json"

[journal]
enabled = true
path = "~/.parley/session-log.jsonl"
"#
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
