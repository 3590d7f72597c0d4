//! Lyss CLI - chat with persistent context from the terminal

use std::io;

use clap::{Parser, Subcommand};
use lyss_core::commands::{ChatOptions, ChatSession, QuickSession};
use lyss_core::config::Config;
use lyss_core::history::{ChatHistory, WindowPolicy};
use lyss_core::llm::LlmClient;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "lyss")]
#[command(author, version, about = "Chat with persistent context from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging on stderr
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Continue the conversation
    Chat {
        /// Message to send (prompted for when omitted)
        message: Vec<String>,
        /// Number of past messages to send, overriding the automatic window
        #[arg(short = 'n', long = "n-history")]
        n_history: Option<usize>,
        /// Cap on the automatic window
        #[arg(short = 'm', long = "max-since-reset")]
        max_since_reset: Option<usize>,
        /// Show the summary the model appends to its reply
        #[arg(short, long)]
        summary: bool,
        /// Start a fresh window; stored messages are kept
        #[arg(short, long)]
        reset: bool,
    },

    /// Ask a one-off question, answered from the cache when possible
    Quick {
        /// Question to ask (prompted for when omitted)
        message: Vec<String>,
    },

    /// Print the stored conversation
    History {
        /// Only the last N messages
        #[arg(short, long)]
        last: Option<usize>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.debug { "lyss=debug" } else { "lyss=warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    let result = match cli.command {
        Commands::Chat {
            message,
            n_history,
            max_since_reset,
            summary,
            reset,
        } => cmd_chat(message, n_history, max_since_reset, summary, reset).await,
        Commands::Quick { message } => cmd_quick(message).await,
        Commands::History { last } => cmd_history(last),
        Commands::Config { action } => cmd_config(action),
        Commands::Doctor => cmd_doctor(),
    };

    if let Err(e) = &result {
        if let Some(hint) = e.downcast_ref::<lyss_core::Error>().and_then(|e| e.suggestion()) {
            eprintln!("Hint: {}", hint);
        }
    }
    result
}

/// Join the words given on the command line, or prompt for a line
fn read_message(words: Vec<String>, label: &str) -> anyhow::Result<Option<String>> {
    if !words.is_empty() {
        return Ok(Some(words.join(" ")));
    }

    let mut editor = DefaultEditor::new()?;
    match editor.readline(label) {
        Ok(line) if line.trim().is_empty() => Ok(None),
        Ok(line) => Ok(Some(line)),
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn build_client(config: &Config) -> anyhow::Result<LlmClient> {
    let api_key = config.llm.resolved_api_key()?.ok_or_else(|| {
        anyhow::anyhow!("No API key configured. Set LYSS_API_KEY or OPENAI_API_KEY environment variable.")
    })?;
    Ok(LlmClient::new(config.llm.clone(), api_key)?)
}

/// Cancel the returned token on Ctrl+C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    cancel
}

/// Treat an interrupted stream as a normal exit
fn finish_turn<T>(result: lyss_core::Result<T>) -> anyhow::Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_interrupted() => {
            println!("\nInterrupted");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn cmd_chat(
    words: Vec<String>,
    n_history: Option<usize>,
    max_since_reset: Option<usize>,
    summary: bool,
    reset: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let paths = config.storage.paths()?;
    let mut session = ChatSession::open(paths.history())?;

    let Some(message) = read_message(words, "You: ")? else {
        return Ok(());
    };

    let client = build_client(&config)?;
    let options = ChatOptions {
        window: WindowPolicy::new(n_history, max_since_reset.unwrap_or(config.chat.max_since_reset)),
        with_summary: summary,
        reset,
    };
    debug!(?options, history = %paths.history().display(), "Chat");

    let cancel = cancel_on_ctrl_c();
    let mut out = io::stdout();
    let result = session
        .turn(&client, &config.chat, &message, options, &cancel, &mut out)
        .await;
    finish_turn(result)
}

async fn cmd_quick(words: Vec<String>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let paths = config.storage.paths()?;
    let mut session = QuickSession::open(paths.cache(), config.quick.cache_ttl_days)?;

    let Some(message) = read_message(words, "Question: ")? else {
        return Ok(());
    };

    if let Some(hit) = session.lookup(&message) {
        println!("{}", hit.content);
        return Ok(());
    }

    let client = build_client(&config)?;
    let cancel = cancel_on_ctrl_c();
    let mut out = io::stdout();
    let result = session
        .ask(&client, &config.quick, &message, &cancel, &mut out)
        .await;
    finish_turn(result)
}

fn cmd_history(last: Option<usize>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let history = ChatHistory::load(&config.storage.paths()?.history())?;

    if history.is_empty() {
        println!("No messages stored.");
        return Ok(());
    }

    let messages = match last {
        Some(n) => history.last(n),
        None => history.messages(),
    };
    for message in messages {
        println!("{}", message);
    }
    Ok(())
}

fn cmd_config(action: ConfigAction) -> anyhow::Result<()> {
    if let ConfigAction::Path = action {
        println!("{}", Config::config_path()?.display());
        return Ok(());
    }
    if let ConfigAction::Reset = action {
        Config::reset()?;
        println!("Configuration reset to defaults.");
        return Ok(());
    }

    let mut config = Config::load()?;
    match action {
        ConfigAction::Get { key } => println!("{}", config.get(&key)?),
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("Set {} = {}", key, config.get(&key)?);
        }
        ConfigAction::List => {
            for (key, value) in config.list()? {
                println!("{:<28} {}", key, value);
            }
        }
        ConfigAction::Path | ConfigAction::Reset => {}
    }
    Ok(())
}

/// Outcome of one doctor check
struct Check {
    ok: bool,
    label: &'static str,
    detail: String,
}

impl Check {
    fn pass(label: &'static str, detail: impl Into<String>) -> Self {
        Self { ok: true, label, detail: detail.into() }
    }

    fn fail(label: &'static str, detail: impl Into<String>) -> Self {
        Self { ok: false, label, detail: detail.into() }
    }
}

fn cmd_doctor() -> anyhow::Result<()> {
    let mut checks = Vec::new();

    match Config::load() {
        Ok(config) => {
            checks.push(Check::pass("Configuration", "Valid"));
            checks.extend(doctor_checks(&config));
        }
        Err(e) => checks.push(Check::fail("Configuration", format!("Error - {:#}", e))),
    }

    println!("Lyss Health Check");
    println!("=================");
    for check in &checks {
        let mark = if check.ok { "[OK]" } else { "[!!]" };
        println!("{} {}: {}", mark, check.label, check.detail);
    }

    println!();
    if checks.iter().all(|c| c.ok) {
        println!("All checks passed!");
    } else {
        println!("Some checks failed. Please address the issues above.");
    }
    Ok(())
}

fn doctor_checks(config: &Config) -> Vec<Check> {
    let mut checks = Vec::new();

    checks.push(match config.llm.redacted_api_key() {
        Ok(Some(redacted)) => Check::pass("API Key", format!("Configured ({})", redacted)),
        Ok(None) => {
            warn!("No API key in LYSS_API_KEY or OPENAI_API_KEY");
            Check::fail("API Key", "Not configured (set LYSS_API_KEY or OPENAI_API_KEY)")
        }
        Err(e) => Check::fail("API Key", format!("Error - {}", e)),
    });

    let paths = match config.storage.paths() {
        Ok(paths) => paths,
        Err(e) => {
            checks.push(Check::fail("Data directory", e.to_string()));
            return checks;
        }
    };
    checks.push(Check::pass("Data directory", paths.base_dir().display().to_string()));

    checks.push(match ChatHistory::load(&paths.history()) {
        Ok(history) => Check::pass(
            "History",
            format!("{} messages, {} since reset", history.len(), history.turns_since_reset()),
        ),
        Err(e) => Check::fail("History", e.to_string()),
    });

    checks.push(match QuickSession::open(paths.cache(), config.quick.cache_ttl_days) {
        Ok(session) => Check::pass(
            "Cache",
            format!("{} entries, {} expired", session.cache().len(), session.cache().expired_count()),
        ),
        Err(e) => Check::fail("Cache", e.to_string()),
    });

    checks
}
