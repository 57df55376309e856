//! parley: a terminal client for an LLM question-answering service.
//!
//! The backend exposes a small GET/DELETE HTTP API (`/ask`, `/evaluate/*`,
//! `/reset`, `/config`, `/models`, `/info`, `/runs`). This crate wraps it
//! in a typed client ([`api`]), keeps the conversation in an explicit
//! state container with pure transitions ([`session`]), and layers a CLI
//! and interactive chat on top ([`cli`], [`chat`]). Performance summaries
//! and evaluation verdicts are stateless projections in [`report`].

pub mod api;
pub mod chat;
pub mod cli;
pub mod config;
pub mod journal;
pub mod report;
pub mod session;
