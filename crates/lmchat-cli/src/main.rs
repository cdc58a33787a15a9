use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "lmchat")]
#[command(about = "lmchat - saved chats and request previews for a local model server")]
#[command(version)]
struct Cli {
    /// Directory holding saved conversations
    #[arg(long)]
    history_dir: Option<PathBuf>,

    /// Model to put in previewed requests
    #[arg(short, long)]
    model: Option<String>,

    #[command(subcommand)]
    command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut settings = lmchat_core::Settings::load();

    if let Some(ref model) = cli.model {
        settings.server.model = model.clone();
    }
    if let Some(dir) = cli.history_dir {
        settings.storage.history_dir = Some(dir);
    }

    let store = lmchat_core::FileHistoryStore::with_dir(settings.history_dir())?;
    let output = commands::run_command(cli.command, &store, &settings.turn_config())?;
    println!("{}", output);

    Ok(())
}
