//! Integration tests for the conversation session controller.
//!
//! Unit tests for the pure transitions live in `src/session/mod.rs`; these
//! tests drive the controller through a mock backend and pin the observable
//! contract: optimistic append with rollback, history recording, the
//! two-step QA protocol, and the one-shot read operations.

use std::cell::RefCell;
use std::collections::BTreeMap;

use anyhow::{Result, anyhow};

use parley::api::{
    AskResult, Backend, ChannelInfo, CriteriaEvalResult, EvalTarget, ModelEntry, QaEvalResult,
    RunSummary,
};
use parley::report::QaVerdict;
use parley::session::history::PromptHistory;
use parley::session::{HistoryDirection, Role, SessionState, TurnPayload};

// ---------------------------------------------------------------------------
// Mock backend
// ---------------------------------------------------------------------------

/// Scriptable in-memory backend that records what it was asked.
#[derive(Default)]
struct MockBackend {
    fail: bool,
    answer: String,
    evaluation: BTreeMap<String, i64>,
    qa_answer: String,
    run_listing: Vec<RunSummary>,
    asked: RefCell<Vec<(String, BTreeMap<String, String>)>>,
    criteria_calls: RefCell<Vec<Vec<String>>>,
    references: RefCell<Vec<String>>,
    deleted: RefCell<Vec<String>>,
    resets: RefCell<usize>,
}

impl MockBackend {
    fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            Err(anyhow!("connection refused"))
        } else {
            Ok(())
        }
    }
}

impl Backend for MockBackend {
    fn ask(&self, question: &str, overrides: &BTreeMap<String, String>) -> Result<AskResult> {
        self.check()?;
        self.asked
            .borrow_mut()
            .push((question.to_string(), overrides.clone()));
        Ok(AskResult {
            question: Some(question.to_string()),
            answer: self.answer.clone(),
            performance: None,
            extra: serde_json::Map::new(),
        })
    }

    fn evaluate_criteria(
        &self,
        _target: &EvalTarget,
        criteria: &[String],
        _overrides: &BTreeMap<String, String>,
    ) -> Result<CriteriaEvalResult> {
        self.check()?;
        self.criteria_calls.borrow_mut().push(criteria.to_vec());
        Ok(CriteriaEvalResult {
            answer: "scored".to_string(),
            evaluation: self.evaluation.clone(),
            performance: None,
            extra: serde_json::Map::new(),
        })
    }

    fn evaluate_qa(
        &self,
        _target: &EvalTarget,
        reference: &str,
        _overrides: &BTreeMap<String, String>,
    ) -> Result<QaEvalResult> {
        self.check()?;
        self.references.borrow_mut().push(reference.to_string());
        Ok(QaEvalResult {
            answer: self.qa_answer.clone(),
            performance: None,
            extra: serde_json::Map::new(),
        })
    }

    fn reset(&self) -> Result<()> {
        self.check()?;
        *self.resets.borrow_mut() += 1;
        Ok(())
    }

    fn configuration(&self) -> Result<BTreeMap<String, String>> {
        self.check()?;
        Ok([("chain_type".to_string(), "base".to_string())]
            .into_iter()
            .collect())
    }

    fn models(&self) -> Result<Vec<ModelEntry>> {
        self.check()?;
        Ok(vec![ModelEntry {
            name: "llama3.2".to_string(),
            extra: serde_json::Map::new(),
        }])
    }

    fn channel_info(&self) -> Result<ChannelInfo> {
        self.check()?;
        Ok(ChannelInfo(serde_json::json!({
            "snippet": { "title": "Software Talks" }
        })))
    }

    fn runs(&self) -> Result<Vec<RunSummary>> {
        self.check()?;
        Ok(self.run_listing.clone())
    }

    fn delete_run(&self, id: &str) -> Result<()> {
        self.check()?;
        self.deleted.borrow_mut().push(id.to_string());
        Ok(())
    }
}

fn session() -> SessionState {
    SessionState::new(PromptHistory::in_memory())
}

fn run_with_id(id: &str) -> RunSummary {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "type": "qa",
        "created_at": 1_700_000_000_000i64,
        "trace": {}
    }))
    .unwrap()
}

// ---------------------------------------------------------------------------
// submit_question
// ---------------------------------------------------------------------------

#[test]
fn successful_ask_appends_user_then_assistant() {
    let backend = MockBackend::answering("forty-two");
    let mut state = session();

    state.submit_question(&backend, "meaning of life?").unwrap();

    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[0].role, Role::User);
    assert_eq!(state.messages[0].text, "meaning of life?");
    assert_eq!(state.messages[1].role, Role::Assistant);
    assert_eq!(state.messages[1].text, "forty-two");
    assert!(!state.loading);
    assert_eq!(state.question, None);
    assert_eq!(state.history().entries(), ["meaning of life?"]);
    assert!(matches!(state.response, Some(TurnPayload::Ask(_))));
}

#[test]
fn ask_forwards_configuration_overrides() {
    let backend = MockBackend::answering("ok");
    let mut state = session();
    state.load_configuration(&backend).unwrap();

    state.submit_question(&backend, "q").unwrap();

    let asked = backend.asked.borrow();
    assert_eq!(asked.len(), 1);
    assert_eq!(asked[0].1.get("chain_type").map(String::as_str), Some("base"));
}

#[test]
fn failed_ask_rolls_back_and_clears_loading() {
    let backend = MockBackend::failing();
    let mut state = session();

    let err = state.submit_question(&backend, "doomed").unwrap_err();

    assert!(err.to_string().contains("error while asking model"));
    assert!(state.messages.is_empty());
    assert!(!state.loading);
    assert_eq!(state.history().len(), 0);
    assert!(state.response.is_none());
}

#[test]
fn blank_question_is_rejected_without_side_effects() {
    let backend = MockBackend::answering("never called");
    let mut state = session();

    assert!(state.submit_question(&backend, "   ").is_err());
    assert!(state.messages.is_empty());
    assert!(backend.asked.borrow().is_empty());
}

#[test]
fn resubmitting_same_question_records_history_once() {
    let backend = MockBackend::answering("same answer");
    let mut state = session();

    state.submit_question(&backend, "repeat me").unwrap();
    state.submit_question(&backend, "repeat me").unwrap();

    assert_eq!(state.history().len(), 1);
    assert_eq!(state.messages.len(), 4);
}

#[test]
fn distinct_questions_each_enter_history() {
    let backend = MockBackend::answering("a");
    let mut state = session();

    state.submit_question(&backend, "one").unwrap();
    state.submit_question(&backend, "two").unwrap();
    state.submit_question(&backend, "one").unwrap();

    assert_eq!(state.history().entries(), ["one", "two", "one"]);
}

// ---------------------------------------------------------------------------
// History navigation through the driver
// ---------------------------------------------------------------------------

#[test]
fn navigation_scenario_recall_and_return() {
    let backend = MockBackend::answering("answer");
    let mut state = session();
    state.submit_question(&backend, "remembered").unwrap();

    state.navigate_history(HistoryDirection::Older);
    assert_eq!(state.history_index, 1);
    assert_eq!(state.question.as_deref(), Some("remembered"));

    state.navigate_history(HistoryDirection::Newer);
    assert_eq!(state.history_index, 0);
    assert_eq!(state.question, None);
}

#[test]
fn submitting_recalled_question_leaves_browsing_mode() {
    let backend = MockBackend::answering("answer");
    let mut state = session();
    state.submit_question(&backend, "first").unwrap();

    state.navigate_history(HistoryDirection::Older);
    let recalled = state.question.clone().unwrap();
    state.submit_question(&backend, &recalled).unwrap();

    assert_eq!(state.history_index, 0);
    assert_eq!(state.history().len(), 1);
}

// ---------------------------------------------------------------------------
// Criteria evaluation
// ---------------------------------------------------------------------------

#[test]
fn criteria_evaluation_appends_prompt_and_evaluator_turns() {
    let mut backend = MockBackend::answering("base answer");
    backend.evaluation = [("helpful".to_string(), 4), ("detailed".to_string(), 5)]
        .into_iter()
        .collect();
    let mut state = session();
    state.submit_question(&backend, "q").unwrap();

    let target = EvalTarget::from_ask(state.last_ask_result().unwrap());
    let criteria = vec!["helpful".to_string(), "detailed".to_string()];
    state.evaluate_criteria(&backend, &target, &criteria).unwrap();

    assert_eq!(state.messages.len(), 4);
    assert_eq!(state.messages[2].role, Role::User);
    assert_eq!(
        state.messages[2].text,
        "Evaluate the response against helpful, detailed"
    );
    assert_eq!(state.messages[3].role, Role::Evaluator);
    match &state.response {
        Some(TurnPayload::Criteria(result)) => {
            assert_eq!(result.evaluation["helpful"], 4);
        }
        other => panic!("unexpected payload: {other:?}"),
    }
    assert_eq!(backend.criteria_calls.borrow()[0], criteria);
}

#[test]
fn failed_criteria_evaluation_rolls_back_synthetic_prompt() {
    let backend = MockBackend::answering("base answer");
    let mut state = session();
    state.submit_question(&backend, "q").unwrap();
    let target = EvalTarget::from_ask(state.last_ask_result().unwrap());
    let before = state.messages.len();

    let failing = MockBackend::failing();
    let err = state
        .evaluate_criteria(&failing, &target, &["helpful".to_string()])
        .unwrap_err();

    assert!(err.to_string().contains("error while evaluating answer"));
    assert_eq!(state.messages.len(), before);
    assert!(!state.loading);
}

#[test]
fn empty_criteria_list_is_rejected() {
    let backend = MockBackend::answering("a");
    let mut state = session();
    state.submit_question(&backend, "q").unwrap();
    let target = EvalTarget::from_ask(state.last_ask_result().unwrap());

    assert!(state.evaluate_criteria(&backend, &target, &[]).is_err());
    assert_eq!(state.messages.len(), 2);
}

// ---------------------------------------------------------------------------
// QA evaluation (two-step protocol)
// ---------------------------------------------------------------------------

#[test]
fn qa_evaluation_resumes_with_reference_text() {
    let mut backend = MockBackend::answering("the answer");
    backend.qa_answer = "GRADE: CORRECT, matches the reference".to_string();
    let mut state = session();
    state.submit_question(&backend, "q").unwrap();

    let target = EvalTarget::from_ask(state.last_ask_result().unwrap());
    let pending = state.begin_qa_evaluation(target);
    // Nothing happens until the reference is supplied.
    assert_eq!(state.messages.len(), 2);
    assert!(!state.loading);

    state
        .complete_qa_evaluation(&backend, pending, "the reference")
        .unwrap();

    assert_eq!(state.messages.len(), 4);
    assert_eq!(state.messages[2].text, "Evaluate the response");
    assert_eq!(backend.references.borrow()[0], "the reference");
    match &state.response {
        Some(TurnPayload::Qa(result)) => {
            assert_eq!(QaVerdict::classify(&result.answer), QaVerdict::Correct);
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn failed_qa_evaluation_rolls_back_synthetic_prompt() {
    let backend = MockBackend::answering("the answer");
    let mut state = session();
    state.submit_question(&backend, "q").unwrap();
    let target = EvalTarget::from_ask(state.last_ask_result().unwrap());
    let pending = state.begin_qa_evaluation(target);

    let failing = MockBackend::failing();
    let err = state
        .complete_qa_evaluation(&failing, pending, "ref")
        .unwrap_err();

    assert!(err.to_string().contains("error while comparing answer"));
    assert_eq!(state.messages.len(), 2);
    assert!(!state.loading);
}

// ---------------------------------------------------------------------------
// Reset
// ---------------------------------------------------------------------------

#[test]
fn reset_clears_transcript_and_response() {
    let backend = MockBackend::answering("a");
    let mut state = session();
    state.submit_question(&backend, "q").unwrap();

    state.reset_session(&backend).unwrap();

    assert!(state.messages.is_empty());
    assert!(state.response.is_none());
    assert_eq!(state.history_index, 0);
    assert!(!state.loading);
    assert_eq!(*backend.resets.borrow(), 1);
}

#[test]
fn failed_reset_leaves_transcript_untouched() {
    let backend = MockBackend::answering("a");
    let mut state = session();
    state.submit_question(&backend, "q").unwrap();

    let failing = MockBackend::failing();
    let err = state.reset_session(&failing).unwrap_err();

    assert!(err.to_string().contains("error while resetting model"));
    assert_eq!(state.messages.len(), 2);
    assert!(!state.loading);
}

// ---------------------------------------------------------------------------
// One-shot reads and run deletion
// ---------------------------------------------------------------------------

#[test]
fn loads_populate_session_state() {
    let backend = MockBackend::answering("a");
    let mut state = session();

    state.load_configuration(&backend).unwrap();
    state.load_models(&backend).unwrap();
    state.load_channel_info(&backend).unwrap();

    assert_eq!(state.configuration.len(), 1);
    assert_eq!(state.models[0].name, "llama3.2");
    assert_eq!(
        state.channel.as_ref().and_then(|c| c.title()),
        Some("Software Talks")
    );
}

#[test]
fn failed_load_leaves_existing_state_untouched() {
    let backend = MockBackend::answering("a");
    let mut state = session();
    state.load_configuration(&backend).unwrap();

    let failing = MockBackend::failing();
    let err = state.load_configuration(&failing).unwrap_err();

    assert!(err.to_string().contains("error while getting configuration"));
    assert_eq!(state.configuration.len(), 1);
}

#[test]
fn delete_run_removes_exactly_the_matching_entry() {
    let mut backend = MockBackend::answering("a");
    backend.run_listing = vec![run_with_id("r1"), run_with_id("r2"), run_with_id("r3")];
    let mut state = session();
    state.load_runs(&backend).unwrap();

    state.delete_run(&backend, "r2").unwrap();

    let ids: Vec<&str> = state.runs.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["r1", "r3"]);
    assert_eq!(backend.deleted.borrow().as_slice(), ["r2"]);
}

#[test]
fn deleting_unknown_run_is_a_local_noop() {
    let mut backend = MockBackend::answering("a");
    backend.run_listing = vec![run_with_id("r1")];
    let mut state = session();
    state.load_runs(&backend).unwrap();

    state.delete_run(&backend, "missing").unwrap();

    assert_eq!(state.runs.len(), 1);
}
