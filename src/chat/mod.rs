//! Interactive chat loop.
//!
//! Binds the session controller to a line-oriented terminal: plain
//! questions are submitted to the backend, slash commands drive the rest of
//! the controller surface (history navigation, evaluation, reset,
//! configuration). This module is view glue only; every state decision
//! lives in [`crate::session`].

use std::io::{self, BufRead, Write};

use anyhow::Result;
use colored::Colorize;

use crate::api::{EvalTarget, HttpBackend};
use crate::cli::{self, print_criteria_result, print_qa_result, report_error};
use crate::config;
use crate::journal::{self, InteractionKind, JournalEntry};
use crate::report::{TokenScope, format_performance};
use crate::session::{HistoryDirection, SessionState, TurnPayload};

/// Run the REPL until `/quit` or end of input.
pub fn run() -> Result<()> {
    let config = config::load();
    let backend = HttpBackend::from_config(&config.backend);
    let mut session = cli::build_session(&config);

    // Initial loads mirror page mount: configuration, models, channel.
    // Each failure is reported once; the chat still works without them.
    for err in [
        session.load_configuration(&backend).err(),
        session.load_models(&backend).err(),
        session.load_channel_info(&backend).err(),
    ]
    .into_iter()
    .flatten()
    {
        report_error(&err);
    }

    print_banner(&session);

    let stdin = io::stdin();
    loop {
        let Some(line) = read_line(&stdin, &prompt_label(&session))? else {
            break;
        };
        let line = line.trim().to_string();

        match line.as_str() {
            "/quit" | "/exit" => break,
            "/help" => print_help(),
            "/prev" => {
                session.navigate_history(HistoryDirection::Older);
                print_draft(&session);
            }
            "/next" => {
                session.navigate_history(HistoryDirection::Newer);
                print_draft(&session);
            }
            "/history" => print_history(&session),
            "/config" => print_configuration(&session),
            "/models" => print_models(&session),
            "/info" => print_channel(&session),
            "/reset" => {
                let outcome = session.reset_session(&backend);
                journal::record(
                    &config.journal,
                    &JournalEntry::new(InteractionKind::Reset, None, outcome.is_ok(), None),
                );
                match outcome {
                    Ok(()) => println!("{}", "Session reset.".green()),
                    Err(err) => report_error(&err),
                }
            }
            "/eval" => evaluate_last(&mut session, &backend, &config),
            "/qa" => qa_last(&mut session, &backend, &config, &stdin)?,
            "" => {
                // An empty line submits a recalled draft, if there is one.
                if session.has_question()
                    && let Some(draft) = session.question.clone()
                {
                    submit(&mut session, &backend, &config, &draft);
                }
            }
            _ if line.starts_with("/set ") => set_override(&mut session, &line),
            _ if line.starts_with('/') => {
                println!("Unknown command {}. Try /help.", line.bold());
            }
            question => submit(&mut session, &backend, &config, question),
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

fn submit(
    session: &mut SessionState,
    backend: &HttpBackend,
    config: &config::ParleyConfig,
    question: &str,
) {
    let outcome = session.submit_question(backend, question);
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

    match outcome {
        Ok(()) => {
            if let Some(TurnPayload::Ask(result)) = &session.response {
                println!("{} {}", "model ❯".cyan().bold(), result.answer);
                if let Some(perf) = &result.performance {
                    println!(
                        "{}",
                        format_performance(perf, TokenScope::OutputOnly).dimmed()
                    );
                }
            }
        }
        Err(err) => report_error(&err),
    }
}

/// `/eval`: score the most recent answer against the configured criteria.
fn evaluate_last(
    session: &mut SessionState,
    backend: &HttpBackend,
    config: &config::ParleyConfig,
) {
    let Some(target) = session.last_ask_result().map(EvalTarget::from_ask) else {
        println!("{}", "Nothing to evaluate yet. Ask a question first.".yellow());
        return;
    };
    let criteria = config.evaluation.criteria.clone();
    let outcome = session.evaluate_criteria(backend, &target, &criteria);
    let performance = session
        .response
        .as_ref()
        .and_then(TurnPayload::performance)
        .cloned();
    journal::record(
        &config.journal,
        &JournalEntry::new(
            InteractionKind::EvaluateCriteria,
            None,
            outcome.is_ok(),
            performance.as_ref(),
        ),
    );
    match outcome {
        Ok(()) => {
            if let Some(TurnPayload::Criteria(result)) = &session.response {
                print_criteria_result(result);
            }
        }
        Err(err) => report_error(&err),
    }
}

/// `/qa`: two-step reference comparison: capture the target, collect the
/// reference text on its own prompt, then resume the evaluation.
fn qa_last(
    session: &mut SessionState,
    backend: &HttpBackend,
    config: &config::ParleyConfig,
    stdin: &io::Stdin,
) -> Result<()> {
    let Some(target) = session.last_ask_result().map(EvalTarget::from_ask) else {
        println!("{}", "Nothing to evaluate yet. Ask a question first.".yellow());
        return Ok(());
    };
    let pending = session.begin_qa_evaluation(target);

    let Some(reference) = read_line(stdin, &format!("{} ", "reference ❯".magenta()))? else {
        return Ok(());
    };
    let reference = reference.trim().to_string();
    if reference.is_empty() {
        println!("{}", "No reference text given, evaluation cancelled.".yellow());
        return Ok(());
    }

    let outcome = session.complete_qa_evaluation(backend, pending, &reference);
    let performance = session
        .response
        .as_ref()
        .and_then(TurnPayload::performance)
        .cloned();
    journal::record(
        &config.journal,
        &JournalEntry::new(
            InteractionKind::EvaluateQa,
            None,
            outcome.is_ok(),
            performance.as_ref(),
        ),
    );
    match outcome {
        Ok(()) => {
            if let Some(TurnPayload::Qa(result)) = &session.response {
                print_qa_result(&result.answer);
            }
        }
        Err(err) => report_error(&err),
    }
    Ok(())
}

/// `/set key value`: edit one backend configuration override locally.
fn set_override(session: &mut SessionState, line: &str) {
    let rest = line.trim_start_matches("/set ").trim();
    match rest.split_once(' ') {
        Some((key, value)) if !value.trim().is_empty() => {
            session
                .configuration
                .insert(key.to_string(), value.trim().to_string());
            println!("Set {} = {}.", key.bold(), value.trim());
        }
        _ => println!("Usage: /set <key> <value>"),
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

fn prompt_label(session: &SessionState) -> String {
    if session.history_index > 0 {
        format!("{} ", "recall ❯".yellow().bold())
    } else {
        format!("{} ", "you ❯".green().bold())
    }
}

fn print_banner(session: &SessionState) {
    let title = session
        .channel
        .as_ref()
        .and_then(|c| c.title())
        .unwrap_or("question-answering backend");
    println!("{}", format!("parley, chatting with {title}").bold().cyan());
    if !session.models.is_empty() {
        println!("{}", format!("{} models available", session.models.len()).dimmed());
    }
    println!("{}", "Type a question, or /help for commands.".dimmed());
}

fn print_draft(session: &SessionState) {
    match &session.question {
        Some(draft) => println!(
            "{} {}  {}",
            "draft ❯".yellow(),
            draft,
            "(empty line sends it)".dimmed()
        ),
        None => println!("{}", "Draft cleared.".dimmed()),
    }
}

fn print_history(session: &SessionState) {
    let entries = session.history().entries();
    if entries.is_empty() {
        println!("{}", "No history yet.".yellow());
        return;
    }
    for (i, entry) in entries.iter().enumerate() {
        println!("  {:>3}  {}", i + 1, entry);
    }
}

fn print_configuration(session: &SessionState) {
    if session.configuration.is_empty() {
        println!("{}", "No backend configuration loaded.".yellow());
        return;
    }
    println!("{}", "Backend configuration".bold().cyan());
    for (key, value) in &session.configuration {
        println!("  {:<28} {}", key, value);
    }
    println!("{}", "Change a value with /set <key> <value>.".dimmed());
}

fn print_models(session: &SessionState) {
    if session.models.is_empty() {
        println!("{}", "No models reported by the backend.".yellow());
        return;
    }
    for model in &session.models {
        println!("  {}", model.name);
    }
}

fn print_channel(session: &SessionState) {
    match session.channel.as_ref().and_then(|c| c.title()) {
        Some(title) => println!("{}", title.bold().cyan()),
        None => println!("{}", "No channel info loaded.".yellow()),
    }
}

fn print_help() {
    println!("{}", "Commands".bold().cyan());
    println!("  <question>   ask the model");
    println!("  /prev /next  browse submitted questions (empty line sends the recalled one)");
    println!("  /eval        score the last answer against the configured criteria");
    println!("  /qa          compare the last answer to a reference text");
    println!("  /reset       clear the model's conversational state");
    println!("  /config      show backend configuration (/set <key> <value> to change)");
    println!("  /models      list available models");
    println!("  /info        show channel info");
    println!("  /history     show submitted questions");
    println!("  /quit        leave");
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Print a prompt and read one line. Returns `None` on end of input.
fn read_line(stdin: &io::Stdin, prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    let read = stdin.lock().read_line(&mut line)?;
    if read == 0 {
        println!();
        return Ok(None);
    }
    Ok(Some(line))
}
