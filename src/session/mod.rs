//! Conversation session controller.
//!
//! Owns the question/answer transcript and mediates between user input and
//! the backend. The state container is UI-agnostic: every operation is split
//! into pure transition functions (`begin_turn` / `complete_*` / `fail_turn`)
//! plus a thin synchronous driver that composes them with a [`Backend`].
//! The transitions are what the tests exercise; no rendering layer is
//! involved anywhere in this module.
//!
//! # Request lifecycle
//!
//! A submitted question is appended to the transcript immediately
//! (optimistic append), before the network result is known. On success the
//! answer is appended and the question recorded into history; on failure the
//! optimistic user turn is rolled back so the transcript never shows a
//! permanently unanswered question.
//!
//! # Stale completions
//!
//! Every mutating request carries a [`Ticket`] stamped with the epoch it
//! started under. `reset_session` bumps the epoch, so a completion that
//! arrives for a request begun before the reset is dropped instead of
//! resurrecting pre-reset transcript state (stale-drop).

pub mod history;

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};

use crate::api::{
    AskResult, Backend, ChannelInfo, CriteriaEvalResult, EvalTarget, ModelEntry, Performance,
    QaEvalResult, RunSummary,
};
use history::PromptHistory;

// ---------------------------------------------------------------------------
// Transcript model
// ---------------------------------------------------------------------------

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    Evaluator,
}

/// The typed backend payload attached to an assistant or evaluator turn.
#[derive(Debug, Clone)]
pub enum TurnPayload {
    Ask(AskResult),
    Criteria(CriteriaEvalResult),
    Qa(QaEvalResult),
}

impl TurnPayload {
    pub fn answer(&self) -> &str {
        match self {
            Self::Ask(r) => &r.answer,
            Self::Criteria(r) => &r.answer,
            Self::Qa(r) => &r.answer,
        }
    }

    pub fn performance(&self) -> Option<&Performance> {
        match self {
            Self::Ask(r) => r.performance.as_ref(),
            Self::Criteria(r) => r.performance.as_ref(),
            Self::Qa(r) => r.performance.as_ref(),
        }
    }
}

/// One transcript entry. Append-only, except for the failure rollback of an
/// optimistic user turn.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub payload: Option<TurnPayload>,
}

/// Direction for history navigation (arrow-up / arrow-down in the original
/// chat page).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDirection {
    Older,
    Newer,
}

/// Proof that a mutating request was begun, stamped with the session epoch
/// at begin time. Consumed by exactly one completion transition; a ticket
/// whose epoch no longer matches is stale and its completion is ignored.
#[derive(Debug)]
pub struct Ticket {
    epoch: u64,
}

/// Pending-input state for a QA evaluation: the target is captured, the
/// reference text is still to be supplied. Resume with
/// [`SessionState::complete_qa_evaluation`].
#[derive(Debug)]
pub struct PendingReference {
    target: EvalTarget,
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// The aggregate session state: draft, transcript, history cursor, loading
/// flag, last payload, and the one-shot read state (configuration, models,
/// channel, runs).
#[derive(Debug, Default)]
pub struct SessionState {
    /// Current draft input. `None` while nothing is typed or recalled.
    pub question: Option<String>,
    /// Chronological transcript, never reordered.
    pub messages: Vec<Message>,
    /// Cursor into history: `0` = live draft, `k` = k-th most recent entry.
    pub history_index: usize,
    /// True exactly while a mutating request is outstanding.
    pub loading: bool,
    /// Last successful ask/evaluate payload.
    pub response: Option<TurnPayload>,
    /// Backend-provided option mapping, forwarded on every ask/evaluate.
    pub configuration: BTreeMap<String, String>,
    pub models: Vec<ModelEntry>,
    pub channel: Option<ChannelInfo>,
    pub runs: Vec<RunSummary>,
    history: PromptHistory,
    epoch: u64,
}

impl SessionState {
    pub fn new(history: PromptHistory) -> Self {
        Self {
            history,
            ..Self::default()
        }
    }

    pub fn history(&self) -> &PromptHistory {
        &self.history
    }

    /// Whether the draft holds something worth submitting.
    pub fn has_question(&self) -> bool {
        self.question
            .as_deref()
            .is_some_and(|q| !q.trim().is_empty())
    }

    /// The most recent answered question in the transcript, if any. This is
    /// what evaluation commands target by default.
    pub fn last_ask_result(&self) -> Option<&AskResult> {
        self.messages.iter().rev().find_map(|m| match &m.payload {
            Some(TurnPayload::Ask(result)) => Some(result),
            _ => None,
        })
    }

    // -- pure transitions ---------------------------------------------------

    /// Start a mutating turn: set `loading`, leave history browsing, and
    /// optimistically append the user message. Rejects blank input.
    pub fn begin_turn(&mut self, text: &str) -> Result<Ticket> {
        if text.trim().is_empty() {
            bail!("question is empty");
        }
        self.loading = true;
        self.history_index = 0;
        self.messages.push(Message {
            role: Role::User,
            text: text.to_string(),
            payload: None,
        });
        Ok(Ticket { epoch: self.epoch })
    }

    /// Commit a successful ask: append the assistant turn, record the
    /// question into history, clear the draft. Stale tickets are dropped.
    pub fn complete_ask(&mut self, ticket: Ticket, question: &str, result: AskResult) {
        if ticket.epoch != self.epoch {
            return;
        }
        let payload = TurnPayload::Ask(result);
        self.messages.push(Message {
            role: Role::Assistant,
            text: payload.answer().to_string(),
            payload: Some(payload.clone()),
        });
        self.response = Some(payload);
        self.history.record(question);
        self.question = None;
        self.loading = false;
    }

    /// Commit a successful evaluation: append the evaluator turn. Stale
    /// tickets are dropped.
    pub fn complete_evaluation(&mut self, ticket: Ticket, payload: TurnPayload) {
        if ticket.epoch != self.epoch {
            return;
        }
        self.messages.push(Message {
            role: Role::Evaluator,
            text: payload.answer().to_string(),
            payload: Some(payload.clone()),
        });
        self.response = Some(payload);
        self.question = None;
        self.loading = false;
    }

    /// Roll back a failed turn: remove the optimistic user message so the
    /// transcript holds no orphaned question. Stale tickets are dropped
    /// (the reset already discarded the message).
    pub fn fail_turn(&mut self, ticket: Ticket) {
        if ticket.epoch != self.epoch {
            return;
        }
        if self.messages.last().is_some_and(|m| m.role == Role::User) {
            self.messages.pop();
        }
        self.loading = false;
    }

    /// Move the history cursor one step and update the draft accordingly.
    ///
    /// The cursor is clamped to `[0, history.len()]`; a move that would land
    /// where the cursor already is changes nothing, so navigation is
    /// idempotent at both boundaries (a live draft survives pressing
    /// "newer" at index 0). Landing on 0 clears the draft; landing on
    /// `k > 0` recalls the k-th most recent entry. History itself is never
    /// mutated here.
    pub fn navigate_history(&mut self, direction: HistoryDirection) {
        let delta: isize = match direction {
            HistoryDirection::Older => 1,
            HistoryDirection::Newer => -1,
        };
        let next = self
            .history_index
            .saturating_add_signed(delta)
            .min(self.history.len());
        if next == self.history_index {
            return;
        }
        self.history_index = next;
        self.question = if next == 0 {
            None
        } else {
            self.history.entry_from_latest(next).map(str::to_string)
        };
    }

    /// Apply a successful reset: clear the transcript and last payload,
    /// return to the live draft, and bump the epoch so in-flight tickets
    /// become stale.
    pub fn apply_reset(&mut self) {
        self.messages.clear();
        self.response = None;
        self.history_index = 0;
        self.loading = false;
        self.epoch += 1;
    }

    // -- drivers ------------------------------------------------------------

    /// Submit a question: optimistic append, `GET /ask` with the flattened
    /// configuration overrides, then commit or roll back.
    pub fn submit_question(&mut self, backend: &dyn Backend, text: &str) -> Result<()> {
        let ticket = self.begin_turn(text)?;
        match backend.ask(text, &self.configuration) {
            Ok(result) => {
                self.complete_ask(ticket, text, result);
                Ok(())
            }
            Err(err) => {
                self.fail_turn(ticket);
                Err(err.context("error while asking model"))
            }
        }
    }

    /// Score an answer against named criteria. A synthetic user turn
    /// announces the evaluation in the transcript; on failure it is rolled
    /// back along with the loading flag.
    pub fn evaluate_criteria(
        &mut self,
        backend: &dyn Backend,
        target: &EvalTarget,
        criteria: &[String],
    ) -> Result<()> {
        if criteria.is_empty() {
            bail!("no evaluation criteria given");
        }
        let prompt = format!("Evaluate the response against {}", criteria.join(", "));
        let ticket = self.begin_turn(&prompt)?;
        match backend.evaluate_criteria(target, criteria, &self.configuration) {
            Ok(result) => {
                self.complete_evaluation(ticket, TurnPayload::Criteria(result));
                Ok(())
            }
            Err(err) => {
                self.fail_turn(ticket);
                Err(err.context("error while evaluating answer"))
            }
        }
    }

    /// First step of a QA evaluation: capture the target and hand back a
    /// pending-input state. The caller collects the reference text however
    /// it likes and resumes with [`Self::complete_qa_evaluation`].
    pub fn begin_qa_evaluation(&self, target: EvalTarget) -> PendingReference {
        PendingReference { target }
    }

    /// Second step of a QA evaluation: the reference text is available, run
    /// the comparison.
    pub fn complete_qa_evaluation(
        &mut self,
        backend: &dyn Backend,
        pending: PendingReference,
        reference: &str,
    ) -> Result<()> {
        let ticket = self.begin_turn("Evaluate the response")?;
        match backend.evaluate_qa(&pending.target, reference, &self.configuration) {
            Ok(result) => {
                self.complete_evaluation(ticket, TurnPayload::Qa(result));
                Ok(())
            }
            Err(err) => {
                self.fail_turn(ticket);
                Err(err.context("error while comparing answer"))
            }
        }
    }

    /// Clear the backend's conversational state and mirror it locally. On
    /// failure the transcript is left untouched.
    pub fn reset_session(&mut self, backend: &dyn Backend) -> Result<()> {
        self.loading = true;
        match backend.reset() {
            Ok(()) => {
                self.apply_reset();
                Ok(())
            }
            Err(err) => {
                self.loading = false;
                Err(err.context("error while resetting model"))
            }
        }
    }

    /// Fetch the backend's option mapping. Existing state is untouched on
    /// failure.
    pub fn load_configuration(&mut self, backend: &dyn Backend) -> Result<()> {
        self.configuration = backend
            .configuration()
            .context("error while getting configuration")?;
        Ok(())
    }

    pub fn load_models(&mut self, backend: &dyn Backend) -> Result<()> {
        self.models = backend
            .models()
            .context("error while getting models information")?;
        Ok(())
    }

    pub fn load_channel_info(&mut self, backend: &dyn Backend) -> Result<()> {
        self.channel = Some(
            backend
                .channel_info()
                .context("error while getting channel")?,
        );
        Ok(())
    }

    pub fn load_runs(&mut self, backend: &dyn Backend) -> Result<()> {
        self.runs = backend.runs().context("error while getting runs")?;
        Ok(())
    }

    /// Delete a stored run and drop it from the local listing by id match.
    /// Deleting an id that is not in the listing leaves `runs` unchanged.
    pub fn delete_run(&mut self, backend: &dyn Backend, id: &str) -> Result<()> {
        backend
            .delete_run(id)
            .context("error while deleting run")?;
        self.runs.retain(|run| run.id != id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
//
// Driver-level behavior (optimistic append, rollback, history recording) is
// covered against a mock backend in tests/session_tests.rs; the tests here
// pin the pure transitions.
// ---------------------------------------------------------------------------
