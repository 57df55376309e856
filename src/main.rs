use clap::{Parser, Subcommand};

use parley::chat;
use parley::cli::{self, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "parley")]
#[command(about = "Terminal client for an LLM question-answering service")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interactive chat with the backend
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// The question to ask
        #[arg(trailing_var_arg = true, required = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// List stored runs
    Runs {
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Delete a stored run
    Delete {
        /// Run id as shown by `parley runs`
        id: String,
    },
    /// Evaluate a stored run: criteria scoring by default, QA comparison
    /// when --reference is given
    Evaluate {
        /// Run id as shown by `parley runs`
        id: String,
        /// Comma-separated criteria (defaults to the configured list)
        #[arg(long)]
        criteria: Option<String>,
        /// Reference answer for a QA comparison
        #[arg(long)]
        reference: Option<String>,
    },
    /// List the backend's available models
    Models {
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show channel/deployment info
    Info,
    /// Clear the backend's conversational state
    Reset,
    /// Check backend reachability and local file state
    Health,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective (fully resolved) configuration
    Show,
    /// Write the annotated default config to ~/.parley/config.toml
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Set a config key (dotted path, e.g. backend.url)
    Set { key: String, value: String },
    /// Reset the global config file to defaults
    Reset,
}

fn main() {
    let app = App::parse();

    let outcome = match app.command {
        Commands::Chat => chat::run(),
        Commands::Ask { args } => cli::run_ask(&args.join(" ")),
        Commands::Runs { format } => cli::run_runs(OutputFormat::from_str_opt(Some(&format))),
        Commands::Delete { id } => cli::run_delete(&id),
        Commands::Evaluate {
            id,
            criteria,
            reference,
        } => cli::run_evaluate(&id, criteria.as_deref(), reference.as_deref()),
        Commands::Models { format } => cli::run_models(OutputFormat::from_str_opt(Some(&format))),
        Commands::Info => cli::run_info(),
        Commands::Reset => cli::run_reset(),
        Commands::Health => cli::run_health(),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    };

    if let Err(err) = outcome {
        cli::report_error(&err);
        std::process::exit(1);
    }
}
