//! Typed response payloads for the question-answering backend.
//!
//! Each endpoint gets an explicit result type carrying only the fields the
//! client interprets. Everything else the backend sends is preserved in a
//! flattened `extra` map and passed through opaquely to display code (the
//! chain viewer prints it verbatim).

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Performance
// ---------------------------------------------------------------------------

/// Timing and token metrics attached to every answer.
///
/// The backend averages `time_1st_token` and `tokens_per_sec` across the LLM
/// runs of a chain and emits `null` when no run produced output, so both are
/// optional. Some deployments report a single `tokens` total instead of the
/// input/output split.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Performance {
    pub total_time: Option<u64>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub tokens: Option<u64>,
    pub time_1st_token: Option<f64>,
    pub tokens_per_sec: Option<f64>,
    pub cost: Option<f64>,
}

// ---------------------------------------------------------------------------
// Ask / evaluation results
// ---------------------------------------------------------------------------

/// Result of `GET /ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResult {
    #[serde(default)]
    pub question: Option<String>,
    pub answer: String,
    #[serde(default)]
    pub performance: Option<Performance>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Result of `GET /evaluate/criteria`.
///
/// `evaluation` maps each requested criterion to an integer score (1–5).
/// The backend clears the whole mapping when it could not parse a score for
/// every criterion, so an empty map means "scoring failed, read `answer`".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriteriaEvalResult {
    pub answer: String,
    #[serde(default)]
    pub evaluation: BTreeMap<String, i64>,
    #[serde(default)]
    pub performance: Option<Performance>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Result of `GET /evaluate/qa`.
///
/// The grader's verdict is embedded in `answer` as free text; see
/// [`crate::report::QaVerdict::classify`] for the classification rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaEvalResult {
    pub answer: String,
    #[serde(default)]
    pub performance: Option<Performance>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

/// A stored question/answer interaction, as listed by `GET /runs`.
///
/// `trace` is the backend's full chain trace and is opaque to the client
/// except for `trace.parameters.chain_type` / `doc_chain_type`, which feed
/// the dashboard type label. `created_at` is epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: i64,
    #[serde(default)]
    pub total_time: Option<u64>,
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub trace: Value,
    #[serde(default)]
    pub evaluation_crit_trace: Option<Value>,
    #[serde(default)]
    pub evaluation_qa_trace: Option<Value>,
}

impl RunSummary {
    /// Chain type recorded in the trace parameters, if present.
    pub fn chain_type(&self) -> Option<&str> {
        self.trace
            .pointer("/parameters/chain_type")
            .and_then(Value::as_str)
    }

    /// Document chain type recorded in the trace parameters, if present.
    pub fn doc_chain_type(&self) -> Option<&str> {
        self.trace
            .pointer("/parameters/doc_chain_type")
            .and_then(Value::as_str)
    }

    /// Per-criterion scores from the stored criteria evaluation, if any.
    pub fn criteria_scores(&self) -> Option<BTreeMap<String, i64>> {
        let evaluation = self
            .evaluation_crit_trace
            .as_ref()?
            .pointer("/evaluation")?
            .as_object()?;
        Some(
            evaluation
                .iter()
                .filter_map(|(k, v)| v.as_i64().map(|n| (k.clone(), n)))
                .collect(),
        )
    }

    /// Grader text from the stored QA evaluation, if any.
    pub fn qa_answer(&self) -> Option<&str> {
        self.evaluation_qa_trace
            .as_ref()?
            .pointer("/answer")?
            .as_str()
    }
}

/// Accept run ids serialized as either a JSON string or a number.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Catalog / info
// ---------------------------------------------------------------------------

/// One entry from the backend's model catalog (`GET /models`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Channel/deployment metadata from `GET /info`.
///
/// The payload is whatever the deployment serves (in the original setup, a
/// YouTube channel record). Only a display title is ever extracted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo(pub Value);

impl ChannelInfo {
    /// Best-effort display title for the channel.
    pub fn title(&self) -> Option<&str> {
        self.0
            .pointer("/snippet/title")
            .or_else(|| self.0.pointer("/items/0/snippet/title"))
            .or_else(|| self.0.pointer("/title"))
            .and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Wrapper for `GET /config`.
#[derive(Debug, Deserialize)]
pub struct ConfigEnvelope {
    pub configuration: BTreeMap<String, Value>,
}

/// Wrapper for `GET /models`.
#[derive(Debug, Deserialize)]
pub struct ModelsEnvelope {
    pub models: Vec<ModelEntry>,
}

/// Wrapper for `GET /runs`.
#[derive(Debug, Deserialize)]
pub struct RunsEnvelope {
    pub runs: Vec<RunSummary>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
