//! Thron CLI - Command line interface for the Thron chat core.
//!
//! `render` prints a saved chat as plain text; every other command prints
//! JSON wrapped in an `ApiResponse`.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use thron_core::{
    ApiKey, ApiResponse, ChatSession, Config, CredentialResolver, ExecutionContext, FileKeyStore,
    MessageList, NoopScroll,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "thron")]
#[command(about = "Thron finance research assistant - chat and credential tools")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.thron/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a saved chat as plain text
    Render(RenderArgs),
    /// Vote on an assistant message in a saved chat
    Vote {
        /// Chat transcript (JSON)
        #[arg(short, long)]
        chat: PathBuf,
        /// Message id
        #[arg(short, long)]
        message: String,
        /// Upvote the message
        #[arg(long, conflicts_with = "down", required_unless_present = "down")]
        up: bool,
        /// Downvote the message
        #[arg(long)]
        down: bool,
    },
    /// API key management
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct RenderArgs {
    /// Chat transcript (JSON)
    #[arg(short, long)]
    chat: PathBuf,
    /// Render as if a response is being generated
    #[arg(long)]
    loading: bool,
    /// Progress line shown while loading (repeatable)
    #[arg(short, long, requires = "loading")]
    progress: Vec<String>,
    /// Hide edit and vote controls
    #[arg(long)]
    readonly: bool,
    /// Render with the side panel open
    #[arg(long)]
    side_panel: bool,
}

#[derive(Subcommand)]
enum KeysAction {
    /// Resolve a key (local storage first, then environment)
    Get {
        #[arg(short, long)]
        key: ApiKey,
        /// Resolve as a server: environment only
        #[arg(long)]
        server: bool,
    },
    /// Store a key locally
    Set {
        #[arg(short, long)]
        key: ApiKey,
        #[arg(short, long)]
        value: String,
    },
    /// Remove a locally stored key
    Clear {
        #[arg(short, long)]
        key: ApiKey,
    },
    /// Show which keys are configured and where they come from
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load(),
    };

    let output = match cli.command {
        Commands::Render(args) => match handle_render(args, &config) {
            Ok(text) => text,
            Err(e) => respond::<()>(Err(e)),
        },
        Commands::Vote {
            chat,
            message,
            up,
            down: _,
        } => respond(handle_vote(&chat, &message, up)),
        Commands::Keys { action } => respond(handle_keys(action, &config)),
        Commands::Config => toml::to_string_pretty(&config)?,
    };

    println!("{}", output);
    Ok(())
}

fn respond<T: Serialize>(result: Result<T>) -> String {
    let response = match result {
        Ok(data) => serde_json::to_value(ApiResponse::ok(data)),
        Err(e) => serde_json::to_value(ApiResponse::<()>::err(format!("{:#}", e))),
    };
    match response.and_then(|value| serde_json::to_string_pretty(&value)) {
        Ok(text) => text,
        Err(e) => format!("{{\"ok\":false,\"error\":\"{}\"}}", e),
    }
}

fn handle_render(args: RenderArgs, config: &Config) -> Result<String> {
    let session = ChatSession::load_from_path(&args.chat)
        .with_context(|| format!("failed to load chat {}", args.chat.display()))?;

    if args.readonly || config.display.readonly {
        session.set_readonly(true);
    }
    session.set_side_panel_visible(args.side_panel || config.display.side_panel_visible);
    if args.loading {
        session.set_loading(true);
        for line in args.progress {
            session.push_progress(line);
        }
    }

    let mut list = MessageList::new(NoopScroll);
    list.update(&session.props());
    match list.element() {
        Some(element) => Ok(element.render_text()),
        None => bail!("nothing rendered"),
    }
}

fn handle_vote(chat: &Path, message_id: &str, up: bool) -> Result<serde_json::Value> {
    let session = ChatSession::load_from_path(chat)
        .with_context(|| format!("failed to load chat {}", chat.display()))?;
    let vote = session.vote(message_id, up)?;
    session.save_to_path(chat)?;
    Ok(json!({ "vote": vote }))
}

fn open_resolver(config: &Config) -> Result<CredentialResolver<FileKeyStore>> {
    let path = config
        .storage
        .keys_file
        .clone()
        .unwrap_or_else(FileKeyStore::default_path);
    let store = FileKeyStore::with_path(path.clone())
        .with_context(|| format!("failed to open key store {}", path.display()))?;
    Ok(config.configure_resolver(CredentialResolver::new(store)))
}

fn handle_keys(action: KeysAction, config: &Config) -> Result<serde_json::Value> {
    let mut resolver = open_resolver(config)?;

    match action {
        KeysAction::Get { key, server } => {
            let ctx = if server {
                ExecutionContext::Server
            } else {
                ExecutionContext::Client
            };
            let value = resolver.resolve_key(ctx, key);
            Ok(json!({
                "key": key,
                "configured": value.is_some(),
                "value": value,
            }))
        }
        KeysAction::Set { key, value } => {
            resolver.store_key(ExecutionContext::Client, key, &value)?;
            Ok(json!({
                "key": key,
                "stored": true,
                "path": resolver.store().path(),
            }))
        }
        KeysAction::Clear { key } => {
            resolver.clear_key(ExecutionContext::Client, key)?;
            Ok(json!({ "key": key, "cleared": true }))
        }
        KeysAction::Status => {
            let mut keys = Vec::new();
            for key in ApiKey::ALL {
                let local = resolver.local_key(ExecutionContext::Client, key)?;
                let source = if local.is_some() {
                    "local"
                } else if resolver.resolve_key(ExecutionContext::Server, key).is_some() {
                    "env"
                } else {
                    "unconfigured"
                };
                keys.push(json!({
                    "key": key,
                    "source": source,
                    "envVar": resolver.env_var(key),
                }));
            }
            Ok(json!({ "keys": keys }))
        }
    }
}
