mod doctor;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use delver_agent::ResearchWorkflow;
use delver_core::config::AppConfig;
use delver_core::traits::SessionStore;
use delver_core::types::{ChatMessage, SessionId};
use delver_memory::SqliteStore;

const DEFAULT_CONFIG: &str = "delver.toml";

#[derive(Parser)]
#[command(name = "delver", version, about = "Conversational research agent")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Session ID (auto-generated if not provided)
    #[arg(short, long)]
    session: Option<String>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive REPL mode
    Repl,
    /// Answer a single query and exit
    Run {
        /// The query (read from stdin when omitted)
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Show the effective configuration with API keys redacted
    Config,
    /// Print the stored conversation of a session
    History {
        /// Number of most recent messages to show
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Run configuration health checks
    Doctor,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "delver=debug,warn" } else { "delver=info,warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "delver", &mut io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&config.redacted())?);
            return Ok(());
        }
        Some(Commands::Doctor) => {
            println!("Delver Doctor");
            println!("=============");
            doctor::run_doctor(&config);
            return Ok(());
        }
        _ => {}
    }

    let store = SqliteStore::open(&config.database_path())?;

    let session_id = cli
        .session
        .as_deref()
        .map(SessionId::from_string)
        .unwrap_or_else(SessionId::new);

    match cli.command {
        Some(Commands::History { limit }) => {
            if cli.session.is_none() {
                anyhow::bail!("`history` needs --session <ID>");
            }
            let limit = limit.unwrap_or(config.session.history_limit);
            print_history(&store, &session_id, limit).await?;
        }
        Some(Commands::Run { prompt }) => {
            let workflow = ResearchWorkflow::from_config(&config)?;
            let mut text = prompt.join(" ");
            if text.trim().is_empty() {
                text = io::stdin()
                    .lock()
                    .lines()
                    .map_while(|l| l.ok())
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            if text.trim().is_empty() {
                anyhow::bail!("empty query");
            }
            if let Err(e) = run_turn(&workflow, &store, &config, &session_id, text.trim()).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Repl) | None => {
            let workflow = ResearchWorkflow::from_config(&config)?;
            run_repl(&workflow, &store, &config, &session_id).await?;
        }
        Some(Commands::Config) | Some(Commands::Doctor) => unreachable!("handled above"),
        Some(Commands::Completions { .. }) => unreachable!("handled before config load"),
    }

    Ok(())
}

/// Explicit path, then `~/.delver/config.toml`, then provider keys from the
/// environment.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        info!(path = %path.display(), "Loading config");
        return Ok(AppConfig::load(path)?);
    }
    if path != Path::new(DEFAULT_CONFIG) {
        anyhow::bail!("config file not found: {}", path.display());
    }

    if let Some(home_config) = dirs_home().map(|h| h.join(".delver").join("config.toml")) {
        if home_config.exists() {
            info!(path = %home_config.display(), "Loading config from home directory");
            return Ok(AppConfig::load(&home_config)?);
        }
    }

    warn!("No config file found, building config from environment");
    Ok(AppConfig::from_env()?)
}

/// One query end to end: load context, run the graph, print, persist.
///
/// A failed turn is logged and returned; nothing is persisted for it.
async fn run_turn(
    workflow: &ResearchWorkflow,
    store: &SqliteStore,
    config: &AppConfig,
    session_id: &SessionId,
    query: &str,
) -> anyhow::Result<()> {
    let history = store
        .load_history(session_id, config.session.history_limit)
        .await?;
    let summary = if config.session.carry_summary {
        store.load_summary(session_id).await?.unwrap_or_default()
    } else {
        String::new()
    };

    let outcome = match workflow
        .run_turn(session_id.clone(), query, history, &summary)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(session = %session_id, error = %e, "Turn failed");
            return Err(e.into());
        }
    };

    println!("{}", outcome.response);

    store
        .append_messages(
            session_id,
            &[
                ChatMessage::user(query),
                ChatMessage::assistant(outcome.response.as_str()),
            ],
        )
        .await?;
    if let Some(turn_summary) = outcome.turn_summary.as_deref() {
        store.save_summary(session_id, turn_summary).await?;
    }

    info!(
        classification = ?outcome.classification,
        elapsed_ms = outcome.total_elapsed_ms,
        "Turn persisted"
    );
    Ok(())
}

async fn run_repl(
    workflow: &ResearchWorkflow,
    store: &SqliteStore,
    config: &AppConfig,
    session_id: &SessionId,
) -> anyhow::Result<()> {
    println!("Delver v{}", env!("CARGO_PKG_VERSION"));
    println!("Session: {}", session_id);
    println!(
        "Models: {} (fast), {} (quality)",
        config.models.fast.model_id, config.models.quality.model_id
    );
    println!("Type /help for commands, /quit to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break; // EOF
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" | "/q" => {
                println!("Goodbye!");
                break;
            }
            "/session" => {
                println!("Session ID: {}", session_id);
                continue;
            }
            "/history" => {
                print_history(store, session_id, config.session.history_limit).await?;
                continue;
            }
            "/help" => {
                println!("  /session   Show the session id");
                println!("  /history   Show this session's stored messages");
                println!("  /quit      Exit");
                continue;
            }
            _ => {}
        }

        if let Err(e) = run_turn(workflow, store, config, session_id, input).await {
            eprintln!("Error: {}", e);
        }
        println!();
    }

    Ok(())
}

async fn print_history(
    store: &SqliteStore,
    session_id: &SessionId,
    limit: usize,
) -> anyhow::Result<()> {
    let messages = store.load_history(session_id, limit).await?;
    if messages.is_empty() {
        println!("No messages stored for session {}", session_id);
        return Ok(());
    }
    for msg in &messages {
        let when = msg
            .timestamp
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("[{}] {}:", when, msg.role.as_str());
        println!("{}\n", msg.content);
    }
    if let Ok(Some(summary)) = store.load_summary(session_id).await {
        if !summary.trim().is_empty() {
            println!("Summary: {}", summary);
        }
    }
    Ok(())
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
