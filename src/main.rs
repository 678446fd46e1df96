// CLI façade: a thin dispatcher over the same library operations the HTTP
// service exposes. Input comes from stdin, structured output goes to stdout
// as JSON, logs go to stderr.

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use pii_redactor::config::RedactorConfig;
use pii_redactor::error::{RedactorError, Result};
use pii_redactor::redactor::Redactor;
use pii_redactor::server;
use pii_redactor::vault::open_vault;

#[derive(Parser)]
#[command(
    name = "pii-redactor",
    about = "Client-side PII redaction sidecar for LLM request pipelines",
    version
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Vault database path (overrides config and PII_REDACTOR_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Disable the NER layer; regex detection only
    #[arg(long, global = true)]
    no_presidio: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Redact a JSON message array read from stdin
    Redact {
        #[arg(long)]
        session_id: String,
    },
    /// Redact raw text read from stdin
    RedactText {
        #[arg(long)]
        session_id: String,
    },
    /// Replace tokens in stdin text with their original values
    Rehydrate {
        #[arg(long)]
        session_id: String,
    },
    /// Delete a session and every token it holds
    Clear {
        #[arg(long)]
        session_id: String,
    },
    /// Print a session's vault entries
    Dump {
        #[arg(long)]
        session_id: String,
    },
    /// List known sessions
    Sessions,
    /// Run the HTTP sidecar
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // clap itself exits 2 on usage errors, matching the invalid-argument
    // contract; everything after parsing maps through RedactorError.
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = RedactorConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.vault_path = Some(db);
    }
    if cli.no_presidio {
        config.use_presidio = false;
    }

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            server::serve(config).await
        }
        Command::Redact { session_id } => {
            let input = read_stdin().await?;
            let messages = parse_messages(&input)?;
            let vault = open_vault(&config)?;
            let redactor = Redactor::from_config(&config, vault)?;
            let redacted = redactor.redact_messages(&session_id, messages).await?;
            redactor.shutdown().await;
            print_json(&json!({ "messages": redacted }))
        }
        Command::RedactText { session_id } => {
            let text = read_stdin().await?;
            let vault = open_vault(&config)?;
            let redactor = Redactor::from_config(&config, vault)?;
            let result = redactor.redact(&session_id, &text).await?;
            redactor.shutdown().await;
            print_json(&json!({
                "text": result.text,
                "entities": result.entities,
                "token_count": result.token_count,
            }))
        }
        Command::Rehydrate { session_id } => {
            let text = read_stdin().await?;
            let vault = open_vault(&config)?;
            let rehydrated = vault.rehydrate(&session_id, &text)?;
            println!("{rehydrated}");
            Ok(())
        }
        Command::Clear { session_id } => {
            let vault = open_vault(&config)?;
            vault.delete_session(&session_id)?;
            print_json(&json!({ "status": "cleared" }))
        }
        Command::Dump { session_id } => {
            let vault = open_vault(&config)?;
            let entries = vault.dump(&session_id)?;
            print_json(&serde_json::to_value(entries)?)
        }
        Command::Sessions => {
            let vault = open_vault(&config)?;
            print_json(&json!({ "sessions": vault.list_sessions()? }))
        }
    }
}

/// Accept either a bare JSON array of messages or `{"messages": [...]}`.
fn parse_messages(input: &str) -> Result<Vec<Value>> {
    let parsed: Value = serde_json::from_str(input)?;
    match parsed {
        Value::Array(messages) => Ok(messages),
        Value::Object(mut map) => match map.remove("messages") {
            Some(Value::Array(messages)) => Ok(messages),
            _ => Err(RedactorError::InvalidInput(
                "expected a message array or {\"messages\": [...]}".into(),
            )),
        },
        _ => Err(RedactorError::InvalidInput(
            "expected a message array or {\"messages\": [...]}".into(),
        )),
    }
}

async fn read_stdin() -> Result<String> {
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .map_err(|e| RedactorError::Internal(format!("cannot read stdin: {e}")))?;
    Ok(input)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
