//! CLI command implementations.
//!
//! Provides subcommand handlers for:
//! - `parley ask "question"`: one-shot question
//! - `parley runs`: stored-run dashboard listing
//! - `parley delete <id>`: delete a stored run
//! - `parley evaluate <id>`: run-level criteria/QA evaluation
//! - `parley models` / `parley info`: backend catalog and deployment info
//! - `parley reset`: clear the backend's conversational state
//! - `parley health`: backend reachability and local file checks
//! - `parley config show|init|set|reset`: configuration management

use anyhow::{Context, Result, bail};
use colored::Colorize;

use crate::api::{Backend, EvalTarget, HttpBackend};
use crate::config::{self, ParleyConfig};
use crate::journal::{self, InteractionKind, JournalEntry};
use crate::report::{
    LatencyBucket, QaVerdict, RunRow, ScoreBucket, TokenScope, average_score, format_performance,
};
use crate::session::{SessionState, TurnPayload};
use crate::session::history::PromptHistory;

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            _ => Self::Table,
        }
    }
}

/// Build a session whose prompt history is backed by the configured file.
pub fn build_session(config: &ParleyConfig) -> SessionState {
    let history = PromptHistory::load(config::expand_home(&config.history.path));
    SessionState::new(history)
}

/// Print the single error surface for a failed operation.
pub fn report_error(err: &anyhow::Error) {
    eprintln!("{} {err:#}", "error:".red().bold());
}

// ---------------------------------------------------------------------------
// parley ask
// ---------------------------------------------------------------------------

/// Submit one question and print the answer with its performance line.
pub fn run_ask(question: &str) -> Result<()> {
    let config = config::load();
    let backend = HttpBackend::from_config(&config.backend);
    let mut session = build_session(&config);

    // Backend overrides are best-effort for a one-shot ask; the question can
    // still be answered with server-side defaults.
    if let Err(err) = session.load_configuration(&backend) {
        eprintln!("{} {err:#}", "warning:".yellow());
    }

    let outcome = session.submit_question(&backend, question);
    let performance = session
        .response
        .as_ref()
        .and_then(TurnPayload::performance)
        .cloned();
    journal::record(
        &config.journal,
        &JournalEntry::new(
            InteractionKind::Ask,
            Some(question),
            outcome.is_ok(),
            performance.as_ref(),
        ),
    );
    outcome?;

    if let Some(TurnPayload::Ask(result)) = &session.response {
        println!("{}", result.answer);
        if let Some(perf) = &result.performance {
            println!(
                "{}",
                format_performance(perf, TokenScope::OutputOnly).dimmed()
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// parley runs
// ---------------------------------------------------------------------------

/// List stored runs.
pub fn run_runs(format: OutputFormat) -> Result<()> {
    let config = config::load();
    let backend = HttpBackend::from_config(&config.backend);
    let mut session = build_session(&config);
    session.load_runs(&backend)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&session.runs)?);
        }
        OutputFormat::Table => print_runs_table(&session),
    }
    Ok(())
}

fn print_runs_table(session: &SessionState) {
    if session.runs.is_empty() {
        println!("{}", "No stored runs.".yellow());
        return;
    }

    println!("{}", "Stored Runs".bold().cyan());
    println!(
        "  {:<10} {:<19} {:<28} {:>9} {:>8} {:>5} {:>9}",
        "ID", "Date", "Type", "Time", "Tokens", "Crit", "QA"
    );
    println!("  {}", "-".repeat(94));

    for run in &session.runs {
        let row = RunRow::from_summary(run);
        let time = match row.total_time {
            Some(ms) => {
                let cell = format!("{:>6} ms", ms);
                match LatencyBucket::from_millis(ms) {
                    LatencyBucket::Slow => cell.red().to_string(),
                    LatencyBucket::Warning => cell.yellow().to_string(),
                    LatencyBucket::Ok => cell.green().to_string(),
                }
            }
            None => format!("{:>9}", "n/a"),
        };
        let crit = match row.criteria_average {
            Some(avg) => {
                let cell = format!("{avg:>5.1}");
                match ScoreBucket::from_average(avg) {
                    ScoreBucket::Good => cell.green().to_string(),
                    ScoreBucket::Poor => cell.red().to_string(),
                    ScoreBucket::Neutral => cell,
                }
            }
            None => format!("{:>5}", "N/A"),
        };
        let qa = match row.qa_verdict {
            Some(QaVerdict::Correct) => format!("{:>9}", "CORRECT").green().to_string(),
            Some(QaVerdict::Incorrect) => format!("{:>9}", "INCORRECT").red().to_string(),
            Some(QaVerdict::NotApplicable) | None => format!("{:>9}", "N/A"),
        };

        println!(
            "  {:<10} {:<19} {:<28} {} {:>8} {} {}",
            truncate(&row.id, 10),
            row.date,
            truncate(&row.label, 28),
            time,
            row.total_tokens,
            crit,
            qa,
        );
    }
}

// ---------------------------------------------------------------------------
// parley delete
// ---------------------------------------------------------------------------

/// Delete a stored run by id.
pub fn run_delete(id: &str) -> Result<()> {
    let config = config::load();
    let backend = HttpBackend::from_config(&config.backend);
    let mut session = build_session(&config);
    session.delete_run(&backend, id)?;
    println!("Deleted run {}.", id.bold());
    Ok(())
}

// ---------------------------------------------------------------------------
// parley evaluate
// ---------------------------------------------------------------------------

/// Evaluate a stored run: criteria scoring by default, QA comparison when a
/// reference text is given.
pub fn run_evaluate(id: &str, criteria: Option<&str>, reference: Option<&str>) -> Result<()> {
    let config = config::load();
    let backend = HttpBackend::from_config(&config.backend);
    let mut session = build_session(&config);
    let target = EvalTarget::run(id);

    match reference {
        Some(reference) => {
            let pending = session.begin_qa_evaluation(target);
            let outcome = session.complete_qa_evaluation(&backend, pending, reference);
            journal_evaluation(&config, InteractionKind::EvaluateQa, &session, &outcome);
            outcome?;
            if let Some(TurnPayload::Qa(result)) = &session.response {
                print_qa_result(&result.answer);
            }
        }
        None => {
            let criteria: Vec<String> = match criteria {
                Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
                None => config.evaluation.criteria.clone(),
            };
            let outcome = session.evaluate_criteria(&backend, &target, &criteria);
            journal_evaluation(&config, InteractionKind::EvaluateCriteria, &session, &outcome);
            outcome?;
            if let Some(TurnPayload::Criteria(result)) = &session.response {
                print_criteria_result(result);
            }
        }
    }
    Ok(())
}

fn journal_evaluation(
    config: &ParleyConfig,
    kind: InteractionKind,
    session: &SessionState,
    outcome: &Result<()>,
) {
    let performance = session
        .response
        .as_ref()
        .and_then(TurnPayload::performance)
        .cloned();
    journal::record(
        &config.journal,
        &JournalEntry::new(kind, None, outcome.is_ok(), performance.as_ref()),
    );
}

/// Print per-criterion scores with bucket coloring, falling back to the
/// grader's raw text when the backend could not parse scores.
pub fn print_criteria_result(result: &crate::api::CriteriaEvalResult) {
    if result.evaluation.is_empty() {
        println!("{}", result.answer);
        return;
    }
    println!("{}", "Answer Evaluation".bold().cyan());
    for (criterion, score) in &result.evaluation {
        let cell = format!("{score}");
        let colored = match ScoreBucket::from_average(*score as f64) {
            ScoreBucket::Good => cell.green().to_string(),
            ScoreBucket::Poor => cell.red().to_string(),
            ScoreBucket::Neutral => cell,
        };
        println!("  {:<40} {}", criterion, colored);
    }
    if let Some(avg) = average_score(&result.evaluation) {
        println!("  {:<40} {:.1}", "average".bold(), avg);
    }
}

/// Print a QA grader's text with its classified verdict.
pub fn print_qa_result(answer: &str) {
    let verdict = QaVerdict::classify(answer);
    let label = match verdict {
        QaVerdict::Correct => verdict.to_string().green().bold().to_string(),
        QaVerdict::Incorrect => verdict.to_string().red().bold().to_string(),
        QaVerdict::NotApplicable => verdict.to_string(),
    };
    println!("{} {}", "Verdict:".bold(), label);
    println!("{answer}");
}

// ---------------------------------------------------------------------------
// parley models / info
// ---------------------------------------------------------------------------

/// List the backend's model catalog.
pub fn run_models(format: OutputFormat) -> Result<()> {
    let config = config::load();
    let backend = HttpBackend::from_config(&config.backend);
    let mut session = build_session(&config);
    session.load_models(&backend)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&session.models)?);
        }
        OutputFormat::Table => {
            if session.models.is_empty() {
                println!("{}", "No models reported by the backend.".yellow());
                return Ok(());
            }
            println!("{}", "Available Models".bold().cyan());
            for model in &session.models {
                println!("  {}", model.name);
            }
        }
    }
    Ok(())
}

/// Show channel/deployment info.
pub fn run_info() -> Result<()> {
    let config = config::load();
    let backend = HttpBackend::from_config(&config.backend);
    let mut session = build_session(&config);
    session.load_channel_info(&backend)?;

    if let Some(channel) = &session.channel {
        if let Some(title) = channel.title() {
            println!("{}", title.bold().cyan());
        }
        println!("{}", serde_json::to_string_pretty(&channel.0)?);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// parley reset
// ---------------------------------------------------------------------------

/// Clear the backend's conversational state.
pub fn run_reset() -> Result<()> {
    let config = config::load();
    let backend = HttpBackend::from_config(&config.backend);
    let mut session = build_session(&config);
    let outcome = session.reset_session(&backend);
    journal::record(
        &config.journal,
        &JournalEntry::new(InteractionKind::Reset, None, outcome.is_ok(), None),
    );
    outcome?;
    println!("Model session reset.");
    Ok(())
}

// ---------------------------------------------------------------------------
// parley health
// ---------------------------------------------------------------------------

/// Check backend reachability and local file state.
pub fn run_health() -> Result<()> {
    let config = config::load();
    let backend = HttpBackend::from_config(&config.backend);

    println!("{}", "parley health".bold().cyan());
    println!("  backend url:    {}", config.backend.url);

    let reachable = backend.configuration().is_ok();
    print_check("backend reachable", reachable);
    print_check(
        "config file",
        config::global_config_path().is_some_and(|p| p.exists()),
    );
    print_check(
        "history file",
        config::expand_home(&config.history.path).exists(),
    );
    print_check(
        "journal file",
        journal::journal_path(&config.journal).exists(),
    );

    if !reachable {
        bail!("backend at {} is not reachable", config.backend.url);
    }
    Ok(())
}

fn print_check(label: &str, ok: bool) {
    let mark = if ok {
        "ok".green().to_string()
    } else {
        "missing".red().to_string()
    };
    println!("  {:<18} {}", format!("{label}:"), mark);
}

// ---------------------------------------------------------------------------
// parley config
// ---------------------------------------------------------------------------

/// Show the effective configuration.
pub fn run_config_show() -> Result<()> {
    println!("{}", config::show_effective_config()?);
    Ok(())
}

/// Write the annotated default config file.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!("Wrote default config to {}.", path.display());
    Ok(())
}

/// Set one config key.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)
        .with_context(|| format!("failed to set '{key}'"))?;
    println!("Set {key} = {value}.");
    Ok(())
}

/// Reset the global config file to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!("Reset config at {}.", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Truncate a string to `max` characters with an ellipsis.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_parses() {
        assert_eq!(OutputFormat::from_str_opt(Some("json")), OutputFormat::Json);
        assert_eq!(
            OutputFormat::from_str_opt(Some("table")),
            OutputFormat::Table
        );
        assert_eq!(OutputFormat::from_str_opt(None), OutputFormat::Table);
    }

    #[test]
    fn truncate_short_strings_unchanged() {
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn truncate_long_strings_adds_ellipsis() {
        let out = truncate("abcdefghij", 5);
        assert_eq!(out.chars().count(), 5);
        assert!(out.ends_with('…'));
    }
}
