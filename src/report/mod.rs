//! Pure projections over backend payloads.
//!
//! Everything here is a stateless function of already-fetched data: the
//! token/performance summary line, qualitative buckets for scores and
//! latencies, the CORRECT/INCORRECT/N-A verdict classification, and the
//! decorated rows for the run listing. No network calls, re-derivable at any
//! time from the stored payloads.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Local, TimeZone};

use crate::api::{Performance, RunSummary};

// ---------------------------------------------------------------------------
// Performance formatting
// ---------------------------------------------------------------------------

/// Which token counter a performance summary reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    All,
    InputOnly,
    OutputOnly,
}

/// Label and count for the requested token scope.
///
/// `All` prefers the input/output split and falls back to the combined
/// `tokens` field some deployments report instead.
pub fn tokens_in_scope(perf: &Performance, scope: TokenScope) -> (&'static str, Option<u64>) {
    match scope {
        TokenScope::All => {
            let total = match (perf.input_tokens, perf.output_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                (Some(input), None) => Some(input),
                (None, Some(output)) => Some(output),
                (None, None) => perf.tokens,
            };
            ("Tokens", total)
        }
        TokenScope::InputOnly => ("Input tokens", perf.input_tokens),
        TokenScope::OutputOnly => ("Output tokens", perf.output_tokens),
    }
}

/// One-line performance summary, e.g.
/// `Total time: 1234 ms / Output tokens: 56 / Time to 1st token: 90 ms /
/// Tokens per sec: 12.3`. Missing metrics print as `n/a`.
pub fn format_performance(perf: &Performance, scope: TokenScope) -> String {
    let (label, tokens) = tokens_in_scope(perf, scope);
    format!(
        "Total time: {} ms / {}: {} / Time to 1st token: {} ms / Tokens per sec: {}",
        opt_integer(perf.total_time),
        label,
        opt_integer(tokens),
        opt_float(perf.time_1st_token),
        opt_float(perf.tokens_per_sec),
    )
}

fn opt_integer(value: Option<u64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |n| n.to_string())
}

fn opt_float(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |n| format!("{n}"))
}

// ---------------------------------------------------------------------------
// Qualitative buckets
// ---------------------------------------------------------------------------

/// Coloring bucket for an averaged criteria score (1–5 scale).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBucket {
    Good,
    Poor,
    Neutral,
}

impl ScoreBucket {
    /// `>= 4` is good, `<= 2` is poor, anything between is neutral.
    pub fn from_average(average: f64) -> Self {
        if average >= 4.0 {
            Self::Good
        } else if average <= 2.0 {
            Self::Poor
        } else {
            Self::Neutral
        }
    }
}

/// Coloring bucket for a total answer time in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyBucket {
    Ok,
    Warning,
    Slow,
}

impl LatencyBucket {
    /// Over 10 s is slow, over 5 s is a warning.
    pub fn from_millis(millis: u64) -> Self {
        if millis > 10_000 {
            Self::Slow
        } else if millis > 5_000 {
            Self::Warning
        } else {
            Self::Ok
        }
    }
}

/// Average of a criteria evaluation, `None` when the mapping is empty
/// (the backend clears it when scoring failed).
pub fn average_score(evaluation: &BTreeMap<String, i64>) -> Option<f64> {
    if evaluation.is_empty() {
        return None;
    }
    let total: i64 = evaluation.values().sum();
    Some(total as f64 / evaluation.len() as f64)
}

// ---------------------------------------------------------------------------
// QA verdict
// ---------------------------------------------------------------------------

/// Outcome of a QA evaluation, extracted from the grader's free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QaVerdict {
    Correct,
    Incorrect,
    NotApplicable,
}

impl QaVerdict {
    /// Classify grader output by substring search, first match wins:
    /// `INCORRECT` beats `CORRECT` (every "INCORRECT" contains "CORRECT",
    /// so the order is load-bearing), and text with neither is
    /// not-applicable.
    pub fn classify(answer: &str) -> Self {
        if answer.contains("INCORRECT") {
            Self::Incorrect
        } else if answer.contains("CORRECT") {
            Self::Correct
        } else {
            Self::NotApplicable
        }
    }
}

impl fmt::Display for QaVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Correct => write!(f, "CORRECT"),
            Self::Incorrect => write!(f, "INCORRECT"),
            Self::NotApplicable => write!(f, "N/A"),
        }
    }
}

// ---------------------------------------------------------------------------
// Run listing decoration
// ---------------------------------------------------------------------------

/// A run summary decorated for display: local date, composed type label,
/// token total, stored-evaluation digests.
#[derive(Debug, Clone)]
pub struct RunRow {
    pub id: String,
    pub date: String,
    pub label: String,
    pub total_time: Option<u64>,
    pub total_tokens: u64,
    pub criteria_average: Option<f64>,
    pub qa_verdict: Option<QaVerdict>,
}

impl RunRow {
    pub fn from_summary(run: &RunSummary) -> Self {
        let label = format!(
            "{} / {} / {}",
            run.kind,
            run.chain_type().unwrap_or("-"),
            run.doc_chain_type().unwrap_or("-"),
        );
        Self {
            id: run.id.clone(),
            date: format_timestamp(run.created_at),
            label,
            total_time: run.total_time,
            total_tokens: run.input_tokens.unwrap_or(0) + run.output_tokens.unwrap_or(0),
            criteria_average: run.criteria_scores().as_ref().and_then(average_score),
            qa_verdict: run.qa_answer().map(QaVerdict::classify),
        }
    }
}

/// Render an epoch-milliseconds timestamp in local time.
pub fn format_timestamp(epoch_millis: i64) -> String {
    Local
        .timestamp_millis_opt(epoch_millis)
        .single()
        .map_or_else(
            || "invalid date".to_string(),
            |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
