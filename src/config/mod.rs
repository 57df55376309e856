//! Layered client configuration.
//!
//! Resolution order, later layers winning at the file level:
//!
//! 1. Built-in defaults ([`schema::ParleyConfig::default()`])
//! 2. User global config, `~/.parley/config.toml`
//! 3. Project local config, `.parley.toml` in the current directory
//! 4. Environment variables, `PARLEY_*` (highest precedence)
//!
//! Malformed config files are silently ignored: a broken TOML file must not
//! take the client down, it just falls back to the previous layer.

pub mod schema;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub use schema::{BackendConfig, ParleyConfig};

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration. Primary entry point for every
/// module that needs settings.
pub fn load() -> ParleyConfig {
    let mut config = ParleyConfig::default();

    if let Some(global) = load_toml_file(global_config_path()) {
        config = global;
    }
    if let Some(project) = load_toml_file(project_config_path()) {
        config = project;
    }

    apply_env_overrides(&mut config);
    config
}

/// Load a TOML config file if the path resolves, the file exists, and the
/// content parses. Any miss returns `None`.
fn load_toml_file(path: Option<PathBuf>) -> Option<ParleyConfig> {
    let path = path?;
    let content = fs::read_to_string(&path).ok()?;
    toml::from_str(&content).ok()
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// `~/.parley/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".parley").join("config.toml"))
}

/// `.parley.toml` in the current working directory.
pub fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".parley.toml"))
}

/// Expand a leading `~/` to the home directory. Paths without a tilde pass
/// through unchanged; if no home directory can be resolved the literal path
/// is used.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `PARLEY_URL`: backend base URL
/// - `PARLEY_TIMEOUT_MS`: transport timeout
/// - `PARLEY_CRITERIA`: comma-separated default evaluation criteria
/// - `PARLEY_JOURNAL`: journal enabled (`1`/`true`/`yes`/`on`)
fn apply_env_overrides(config: &mut ParleyConfig) {
    if let Ok(val) = std::env::var("PARLEY_URL")
        && !val.is_empty()
    {
        config.backend.url = val;
    }
    if let Ok(val) = std::env::var("PARLEY_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.backend.timeout_ms = ms;
    }
    if let Ok(val) = std::env::var("PARLEY_CRITERIA")
        && !val.is_empty()
    {
        config.evaluation.criteria = val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Ok(val) = std::env::var("PARLEY_JOURNAL") {
        config.journal.enabled = is_truthy(&val);
    }
}

/// Check if a string value represents a truthy boolean.
pub fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the annotated default config to `~/.parley/config.toml`. Refuses to
/// overwrite an existing file unless `force` is set.
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.parley/ directory")?;
    }
    fs::write(&path, ParleyConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single dotted key (`backend.url`, `journal.enabled`, …) in the
/// global config file, creating the file from defaults if needed. The value
/// is parsed according to the type of the existing entry.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let content = if path.exists() {
        fs::read_to_string(&path).context("failed to read config file")?
    } else {
        toml::to_string_pretty(&ParleyConfig::default())
            .context("failed to serialize default config")?
    };

    let mut root: toml::Value =
        toml::from_str(&content).context("failed to parse config as TOML")?;
    set_toml_value(&mut root, key, value)?;

    let output = toml::to_string_pretty(&root).context("failed to serialize updated config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, output).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML tree using a dotted key path.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.is_empty() {
        anyhow::bail!("empty config key");
    }

    let mut current = root;
    for &part in &parts[..parts.len() - 1] {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let leaf = parts[parts.len() - 1];
    let table = current
        .as_table_mut()
        .with_context(|| format!("expected a table above '{leaf}' in '{key}'"))?;

    let new_value = match table.get(leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Float(_)) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        Some(toml::Value::Array(_)) => toml::Value::Array(
            raw_value
                .split(',')
                .map(|s| toml::Value::String(s.trim().to_string()))
                .collect(),
        ),
        _ => toml::Value::String(raw_value.to_string()),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    toml::to_string_pretty(&load()).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_truthy_accepts_variants() {
        assert!(is_truthy("1"));
        assert!(is_truthy("true"));
        assert!(is_truthy("YES"));
        assert!(is_truthy("on"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn expand_home_passes_absolute_paths_through() {
        assert_eq!(expand_home("/tmp/x.json"), PathBuf::from("/tmp/x.json"));
    }

    #[test]
    fn expand_home_resolves_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.parley/x"), home.join(".parley/x"));
        }
    }

    #[test]
    fn set_toml_value_updates_string() {
        let mut root: toml::Value = toml::from_str("[backend]\nurl = \"http://a\"\n").unwrap();
        set_toml_value(&mut root, "backend.url", "http://b").unwrap();
        assert_eq!(
            root["backend"]["url"].as_str(),
            Some("http://b")
        );
    }

    #[test]
    fn set_toml_value_updates_integer() {
        let mut root: toml::Value = toml::from_str("[backend]\ntimeout_ms = 1000\n").unwrap();
        set_toml_value(&mut root, "backend.timeout_ms", "5000").unwrap();
        assert_eq!(root["backend"]["timeout_ms"].as_integer(), Some(5000));
    }

    #[test]
    fn set_toml_value_updates_bool() {
        let mut root: toml::Value = toml::from_str("[journal]\nenabled = true\n").unwrap();
        set_toml_value(&mut root, "journal.enabled", "false").unwrap();
        assert_eq!(root["journal"]["enabled"].as_bool(), Some(false));
    }

    #[test]
    fn set_toml_value_splits_arrays_on_commas() {
        let mut root: toml::Value =
            toml::from_str("[evaluation]\ncriteria = [\"helpful\"]\n").unwrap();
        set_toml_value(&mut root, "evaluation.criteria", "clear, concise").unwrap();
        let criteria = root["evaluation"]["criteria"].as_array().unwrap();
        assert_eq!(criteria.len(), 2);
        assert_eq!(criteria[0].as_str(), Some("clear"));
        assert_eq!(criteria[1].as_str(), Some("concise"));
    }

    #[test]
    fn set_toml_value_rejects_unknown_section() {
        let mut root: toml::Value = toml::from_str("[backend]\nurl = \"x\"\n").unwrap();
        assert!(set_toml_value(&mut root, "nonexistent.key", "v").is_err());
    }

    #[test]
    fn show_effective_config_returns_parseable_toml() {
        let toml_str = show_effective_config().unwrap();
        let _: ParleyConfig = toml::from_str(&toml_str).unwrap();
    }
}
