//! Operator CLI for inspecting and editing a chatlog message store.

use anyhow::{Context, bail};
use chatlog::config::ChatlogConfig;
use chatlog::services::SettingsPatch;
use chatlog::store::{Emotion, Message, MessageId, MessageStore};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use std::path::PathBuf;

/// Command-line options for the chatlog CLI.
#[derive(Parser, Debug)]
#[command(name = "chatlog", version)]
struct Cli {
    /// Optional path to a chatlog.json5 config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Store(StoreCommand),
    /// Show settings, optionally switching the conversation first
    Settings {
        #[arg(long)]
        conversation_id: Option<String>,
    },
    /// Fetch a random avatar and store it in settings
    Avatar,
}

/// Commands that operate on the message store.
#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// Print every stored message in order
    List,
    /// Append a text message, replacing any message with the same id
    Append {
        #[arg(long)]
        id: MessageId,
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "user")]
        source: String,
        /// Flag the message as an error
        #[arg(long)]
        error: bool,
    },
    /// Replace a message's emotions
    Annotate {
        #[arg(long)]
        id: MessageId,
        /// Emotion as name=html, repeatable
        #[arg(long = "emotion", value_parser = parse_emotion)]
        emotions: Vec<Emotion>,
    },
    /// Remove a message
    Remove {
        #[arg(long)]
        id: MessageId,
    },
    /// Remove every message
    Clear,
}

/// Entry point for the chatlog CLI.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chatlog::init_logging();
    let cli = Cli::parse();
    debug!("starting chatlog CLI (config_set={})", cli.config.is_some());

    let config = if let Some(path) = cli.config.as_ref() {
        ChatlogConfig::load_from_path(path).context("failed to load config")?
    } else {
        let cwd = std::env::current_dir().context("cwd")?;
        let layered =
            ChatlogConfig::load_layered(&cwd).context("failed to load layered config")?;
        debug!("layered config loaded (layers={})", layered.layers.len());
        layered.config
    };

    match cli.command {
        Command::Settings { conversation_id } => settings(&config, conversation_id),
        Command::Avatar => avatar(&config).await,
        Command::Store(command) => {
            let store = chatlog::open_store(&config).context("failed to open message store")?;
            let report = store.load().await.context("failed to load messages")?;
            if !report.skipped.is_empty() {
                warn!("skipped {} malformed records", report.skipped.len());
            }
            run_store_command(&store, command).await
        }
    }
}

async fn run_store_command(store: &MessageStore, command: StoreCommand) -> anyhow::Result<()> {
    match command {
        StoreCommand::List => {
            store.with_messages(|messages| {
                for message in messages {
                    println!("{}", format_message(message));
                }
            });
        }
        StoreCommand::Append {
            id,
            text,
            source,
            error,
        } => {
            let mut message = Message::text(id, source, text, Utc::now());
            if error {
                message = message.into_error();
            }
            store.append(message).await.context("append was not persisted")?;
            info!("appended message (id={id})");
        }
        StoreCommand::Annotate { id, emotions } => {
            let Some(pending) = store.annotate(id, emotions) else {
                bail!("message {id} not found");
            };
            pending.await.context("annotation was not persisted")?;
            info!("annotated message (id={id})");
        }
        StoreCommand::Remove { id } => {
            if store.get(id).is_none() {
                warn!("message {id} not in store; deleting anyway");
            }
            store.remove_by_id(id).await.context("removal was not persisted")?;
        }
        StoreCommand::Clear => {
            let count = store.len();
            store.clear().await.context("clear was not persisted")?;
            println!("cleared {count} messages");
        }
    }
    Ok(())
}

fn settings(config: &ChatlogConfig, conversation_id: Option<String>) -> anyhow::Result<()> {
    let store = chatlog::open_settings(config).context("failed to open settings")?;
    let settings = match conversation_id {
        Some(conversation_id) => store
            .update(SettingsPatch {
                conversation_id: Some(conversation_id),
                ..SettingsPatch::default()
            })
            .context("failed to save settings")?,
        None => store.settings(),
    };
    println!("conversation: {}", settings.conversation_id);
    println!(
        "avatar configured: {}",
        settings.avatar_configuration_finished
    );
    for (option, value) in &settings.avatar_configuration {
        println!("  {option} = {value}");
    }
    Ok(())
}

async fn avatar(config: &ChatlogConfig) -> anyhow::Result<()> {
    let client = chatlog::avatar_client(config).context("failed to build avatar client")?;
    let avatar = client
        .random_avatar()
        .await
        .context("failed to fetch avatar")?;
    let store = chatlog::open_settings(config).context("failed to open settings")?;
    let settings = store
        .update(avatar.into_settings_patch())
        .context("failed to save settings")?;
    println!(
        "stored avatar ({} options)",
        settings.avatar_configuration.len()
    );
    Ok(())
}

fn parse_emotion(value: &str) -> Result<Emotion, String> {
    match value.split_once('=') {
        Some((name, html)) if !name.is_empty() => Ok(Emotion::new(name, html)),
        _ => Err(format!("expected name=html, got {value:?}")),
    }
}

fn format_message(message: &Message) -> String {
    let mut line = format!(
        "{}\t{}\t{}\t{}",
        message.id,
        message.timestamp.to_rfc3339(),
        message.source,
        message.text
    );
    if message.audio.is_some() {
        line.push_str("\t[audio]");
    }
    if let Some(emotions) = message.emotions.as_ref().filter(|e| !e.is_empty()) {
        let names: Vec<&str> = emotions.iter().map(|e| e.name.as_str()).collect();
        line.push_str(&format!("\t({})", names.join(", ")));
    }
    if message.is_error() {
        line.push_str("\t!error");
    }
    line
}
