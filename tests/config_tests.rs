//! Integration tests for configuration resolution.
//!
//! Unit tests for the schema and TOML handling live in `src/config/`. These
//! tests exercise the environment-variable layer, which has the highest
//! precedence and therefore holds regardless of any config files present in
//! the test environment.
//!
//! # Safety
//!
//! `std::env::set_var` / `remove_var` are `unsafe` in Rust 2024. All env
//! mutation is combined into a single `#[test]` so no other test in this
//! binary races with it.

use parley::config;

/// Helper: set an env var (wraps the `unsafe` call).
///
/// # Safety
/// Must only be called from single-threaded test contexts.
unsafe fn set_env(key: &str, val: &str) {
    unsafe { std::env::set_var(key, val) }
}

/// Helper: remove an env var (wraps the `unsafe` call).
///
/// # Safety
/// Must only be called from single-threaded test contexts.
unsafe fn remove_env(key: &str) {
    unsafe { std::env::remove_var(key) }
}

#[test]
fn env_overrides_take_highest_precedence() {
    // --- backend url ---
    unsafe { set_env("PARLEY_URL", "http://override:9999") };
    let resolved = config::load();
    assert_eq!(resolved.backend.url, "http://override:9999");
    unsafe { remove_env("PARLEY_URL") };

    // --- empty url is ignored ---
    unsafe { set_env("PARLEY_URL", "") };
    let resolved = config::load();
    assert_ne!(resolved.backend.url, "");
    unsafe { remove_env("PARLEY_URL") };

    // --- timeout ---
    unsafe { set_env("PARLEY_TIMEOUT_MS", "2500") };
    let resolved = config::load();
    assert_eq!(resolved.backend.timeout_ms, 2500);
    unsafe { remove_env("PARLEY_TIMEOUT_MS") };

    // --- non-numeric timeout is ignored ---
    unsafe { set_env("PARLEY_TIMEOUT_MS", "soon") };
    let resolved = config::load();
    assert_ne!(resolved.backend.timeout_ms, 0);
    unsafe { remove_env("PARLEY_TIMEOUT_MS") };

    // --- criteria list, trimmed and de-blanked ---
    unsafe { set_env("PARLEY_CRITERIA", "clear, concise, , accurate") };
    let resolved = config::load();
    assert_eq!(resolved.evaluation.criteria, ["clear", "concise", "accurate"]);
    unsafe { remove_env("PARLEY_CRITERIA") };

    // --- journal toggle ---
    unsafe { set_env("PARLEY_JOURNAL", "0") };
    let resolved = config::load();
    assert!(!resolved.journal.enabled);

    unsafe { set_env("PARLEY_JOURNAL", "true") };
    let resolved = config::load();
    assert!(resolved.journal.enabled);
    unsafe { remove_env("PARLEY_JOURNAL") };
}
