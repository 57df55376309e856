//! HTTP client for the question-answering backend.
//!
//! The backend is a small GET/DELETE API (`/ask`, `/evaluate/criteria`,
//! `/evaluate/qa`, `/reset`, `/config`, `/models`, `/info`, `/runs`).
//! [`Backend`] is the seam the session controller talks through, so tests
//! can substitute an in-memory double; [`HttpBackend`] is the real thing,
//! built on the synchronous `ureq` client.
//!
//! All parameters go through `ureq`'s query API and are therefore properly
//! URL-encoded, so questions and configuration values may contain `&`, `=`,
//! spaces or unicode without corrupting the request.

pub mod types;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::config::BackendConfig;

pub use types::{
    AskResult, ChannelInfo, ConfigEnvelope, CriteriaEvalResult, ModelEntry, ModelsEnvelope,
    Performance, QaEvalResult, RunSummary, RunsEnvelope,
};

// ---------------------------------------------------------------------------
// Evaluation targets
// ---------------------------------------------------------------------------

/// What an evaluation call scores: a fresh answer held by the session, or a
/// run already stored by the backend (addressed by id).
#[derive(Debug, Clone)]
pub enum EvalTarget {
    Answer {
        question: Option<String>,
        answer: String,
    },
    Run {
        id: String,
    },
}

impl EvalTarget {
    /// Target the answer of an ask result, carrying its question along for
    /// the QA grader.
    pub fn from_ask(result: &AskResult) -> Self {
        Self::Answer {
            question: result.question.clone(),
            answer: result.answer.clone(),
        }
    }

    pub fn run(id: impl Into<String>) -> Self {
        Self::Run { id: id.into() }
    }
}

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

/// Operations the session controller needs from the backend.
///
/// `overrides` is the flattened configuration mapping forwarded on every
/// ask/evaluate call to influence chain construction server-side.
pub trait Backend {
    fn ask(&self, question: &str, overrides: &BTreeMap<String, String>) -> Result<AskResult>;

    fn evaluate_criteria(
        &self,
        target: &EvalTarget,
        criteria: &[String],
        overrides: &BTreeMap<String, String>,
    ) -> Result<CriteriaEvalResult>;

    fn evaluate_qa(
        &self,
        target: &EvalTarget,
        reference: &str,
        overrides: &BTreeMap<String, String>,
    ) -> Result<QaEvalResult>;

    fn reset(&self) -> Result<()>;

    fn configuration(&self) -> Result<BTreeMap<String, String>>;

    fn models(&self) -> Result<Vec<ModelEntry>>;

    fn channel_info(&self) -> Result<ChannelInfo>;

    fn runs(&self) -> Result<Vec<RunSummary>>;

    fn delete_run(&self, id: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Synchronous HTTP backend client.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    timeout: Duration,
}

impl HttpBackend {
    /// Build a client from the resolved `[backend]` config section.
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issue a GET and decode the JSON body.
    ///
    /// `params` are appended as query pairs in order; `ureq` percent-encodes
    /// both keys and values.
    fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        let mut request = ureq::get(&self.url(path)).timeout(self.timeout);
        for (key, value) in params {
            request = request.query(key, value);
        }
        let response = request
            .call()
            .with_context(|| format!("GET {path} failed"))?;
        response
            .into_json::<T>()
            .with_context(|| format!("failed to decode {path} response"))
    }

    /// Flatten the configuration mapping into query pairs.
    fn override_params(overrides: &BTreeMap<String, String>) -> Vec<(&str, &str)> {
        overrides
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

impl Backend for HttpBackend {
    fn ask(&self, question: &str, overrides: &BTreeMap<String, String>) -> Result<AskResult> {
        let mut params = vec![("question", question)];
        params.extend(Self::override_params(overrides));
        self.get_json("/ask", &params)
    }

    fn evaluate_criteria(
        &self,
        target: &EvalTarget,
        criteria: &[String],
        overrides: &BTreeMap<String, String>,
    ) -> Result<CriteriaEvalResult> {
        let joined = criteria.join(",");
        let mut params = Vec::new();
        match target {
            EvalTarget::Answer { answer, .. } => params.push(("answer", answer.as_str())),
            EvalTarget::Run { id } => params.push(("id", id.as_str())),
        }
        params.push(("criteria", joined.as_str()));
        params.extend(Self::override_params(overrides));
        self.get_json("/evaluate/criteria", &params)
    }

    fn evaluate_qa(
        &self,
        target: &EvalTarget,
        reference: &str,
        overrides: &BTreeMap<String, String>,
    ) -> Result<QaEvalResult> {
        let mut params = Vec::new();
        match target {
            EvalTarget::Answer { question, answer } => {
                if let Some(question) = question {
                    params.push(("question", question.as_str()));
                }
                params.push(("answer", answer.as_str()));
            }
            EvalTarget::Run { id } => params.push(("id", id.as_str())),
        }
        params.push(("reference", reference));
        params.extend(Self::override_params(overrides));
        self.get_json("/evaluate/qa", &params)
    }

    fn reset(&self) -> Result<()> {
        // The body is `{"status": "ok"}`; only the status code matters.
        ureq::get(&self.url("/reset"))
            .timeout(self.timeout)
            .call()
            .context("GET /reset failed")?;
        Ok(())
    }

    fn configuration(&self) -> Result<BTreeMap<String, String>> {
        let envelope: ConfigEnvelope = self.get_json("/config", &[])?;
        Ok(envelope
            .configuration
            .iter()
            .map(|(key, value)| (key.clone(), json_value_to_string(value)))
            .collect())
    }

    fn models(&self) -> Result<Vec<ModelEntry>> {
        let envelope: ModelsEnvelope = self.get_json("/models", &[])?;
        Ok(envelope.models)
    }

    fn channel_info(&self) -> Result<ChannelInfo> {
        self.get_json("/info", &[])
    }

    fn runs(&self) -> Result<Vec<RunSummary>> {
        let envelope: RunsEnvelope = self.get_json("/runs", &[])?;
        Ok(envelope.runs)
    }

    fn delete_run(&self, id: &str) -> Result<()> {
        ureq::delete(&self.url(&format!("/runs/{id}")))
            .timeout(self.timeout)
            .call()
            .with_context(|| format!("DELETE /runs/{id} failed"))?;
        Ok(())
    }
}

/// Render a configuration value the way it appears in a query string:
/// strings verbatim, everything else in JSON notation.
fn json_value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
