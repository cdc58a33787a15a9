use anyhow::{Context, Result};
use clap::Subcommand;
use lmchat_core::config::{MAX_HISTORY_LIMIT, MIN_HISTORY_LIMIT};
use lmchat_core::context::{Attached, ConversationMetadata};
use lmchat_core::{
    Content, ContentBlock, ContextStore, Conversation, FsExtractor, HistoryStore, Message,
    PayloadBuilder, Role, TurnConfig,
};
use std::path::PathBuf;

/// Longest message preview shown by `show`.
const PREVIEW_CHARS: usize = 200;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List saved conversations, most recent first
    List,
    /// Print a saved conversation
    Show {
        id: String,
        /// Print full message text instead of a preview
        #[arg(long)]
        full: bool,
    },
    /// Delete a saved conversation
    Delete { id: String },
    /// Print the request that would be sent for a prompt, as JSON
    Preview {
        /// Text of the user message
        prompt: String,
        /// Continue a saved conversation instead of a new one
        #[arg(long)]
        id: Option<String>,
        /// Attach a text file or image (repeatable)
        #[arg(short, long = "attach")]
        attachments: Vec<PathBuf>,
        /// Merge the system prompt into the first user message
        #[arg(long)]
        no_system_role: bool,
        /// Number of history messages to include
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Run a command against the store and return what should be printed.
pub fn run_command(command: Command, store: &dyn HistoryStore, config: &TurnConfig) -> Result<String> {
    match command {
        Command::List => list_conversations(store),
        Command::Show { id, full } => show_conversation(store, &id, full),
        Command::Delete { id } => {
            store
                .delete(&id)
                .with_context(|| format!("Failed to delete conversation {}", id))?;
            Ok(format!("Deleted {}", id))
        }
        Command::Preview {
            prompt,
            id,
            attachments,
            no_system_role,
            limit,
        } => {
            let mut config = config.clone();
            if no_system_role {
                config.use_system_role = false;
            }
            if let Some(limit) = limit {
                config.history_limit = limit.clamp(MIN_HISTORY_LIMIT, MAX_HISTORY_LIMIT);
            }
            preview_payload(store, &config, id.as_deref(), &attachments, &prompt)
        }
    }
}

fn format_timestamp(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn format_row(meta: &ConversationMetadata) -> String {
    format!(
        "{}  {}  {:>3} msgs  {}",
        meta.id,
        format_timestamp(&meta.updated_at),
        meta.message_count,
        meta.title
    )
}

pub fn list_conversations(store: &dyn HistoryStore) -> Result<String> {
    let conversations = store.list_all().context("Failed to read history")?;
    if conversations.is_empty() {
        return Ok("No saved conversations.".to_string());
    }
    Ok(conversations.iter().map(format_row).collect::<Vec<_>>().join("\n"))
}

fn describe_content(content: &Content, full: bool) -> String {
    let text = match content {
        Content::Text(text) => text.clone(),
        Content::Blocks(blocks) => blocks
            .iter()
            .map(|b| match b {
                ContentBlock::Text { text } => text.clone(),
                ContentBlock::ImageRef { .. } => "[image]".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
    };
    if full || text.chars().count() <= PREVIEW_CHARS {
        text
    } else {
        format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
    }
}

pub fn show_conversation(store: &dyn HistoryStore, id: &str, full: bool) -> Result<String> {
    let saved = store.load(id)?;
    let mut out = format!("{} ({})\n", saved.metadata.title, saved.metadata.id);
    for message in saved.messages.iter().filter(|m| m.role != Role::System) {
        let who = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        out.push_str(&format!("\n[{}] {}\n", who, describe_content(&message.content, full)));
    }
    Ok(out)
}

pub fn preview_payload(
    store: &dyn HistoryStore,
    config: &TurnConfig,
    id: Option<&str>,
    attachments: &[PathBuf],
    prompt: &str,
) -> Result<String> {
    let mut messages: Vec<Message> = match id {
        Some(id) => Conversation::from_saved(store.load(id)?).messages().to_vec(),
        None => Conversation::new(config.system_prompt.clone()).messages().to_vec(),
    };
    messages.push(Message::user(prompt));

    let mut context = ContextStore::new();
    for path in attachments {
        let attached = context
            .attach_path(&FsExtractor, path)
            .with_context(|| format!("Failed to attach {}", path.display()))?;
        if attached == Attached::Duplicate {
            tracing::warn!("Skipping duplicate attachment {}", path.display());
        }
    }

    let request = PayloadBuilder::new(config, &context).build_request(&messages);
    Ok(serde_json::to_string_pretty(&request)?)
}
