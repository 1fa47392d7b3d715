mod cache;
mod config;
mod devices;
mod display;
mod error;

#[cfg(feature = "chat")]
mod chat;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chatter_core::{read_snapshot, write_snapshot, Location, ThemeColor, CACHE_KEY};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cache::{default_data_dir, AppContext, CacheType};
use crate::config::{load_config, resolve_cache_config};
use crate::error::ChatterError;

#[derive(Parser)]
#[command(name = "chatter")]
#[command(about = "Chat with an offline-capable message feed", long_about = None)]
struct Cli {
    /// Cache type: fjall or rocks
    #[arg(long, global = true)]
    cache_type: Option<CacheType>,

    /// Path to the snapshot cache
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[cfg(feature = "chat")]
    /// Start an interactive chat session
    Chat {
        /// Display name shown with your messages
        #[arg(short, long)]
        name: Option<String>,

        /// Background colour as #RRGGBB
        #[arg(long)]
        color: Option<ThemeColor>,

        /// Start with the network reported as unreachable
        #[arg(long)]
        offline: bool,

        /// Position shared by /location, as LAT,LON
        #[arg(long, value_parser = config::parse_location)]
        location: Option<Location>,
    },

    /// Inspect the snapshot cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print the cached messages, newest first
    Show,
    /// Replace the cached snapshot with an empty one
    Clear,
}

fn init_logging(data_dir: &Path) -> Result<(), ChatterError> {
    std::fs::create_dir_all(data_dir)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join("chatter.log"))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn show_cache(ctx: &AppContext) -> Result<(), ChatterError> {
    let messages = read_snapshot(&ctx.cache, CACHE_KEY)
        .map_err(|e| ChatterError::Snapshot(e.to_string()))?
        .unwrap_or_default();

    if messages.is_empty() {
        println!("No cached messages.");
    }
    for message in &messages {
        println!(
            "{}  {}: {}",
            display::timestamp(message),
            message.author.name,
            display::describe(message)
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config();

    let data_dir = default_data_dir();
    init_logging(&data_dir)?;

    let (cache_type, cache_path) = resolve_cache_config(&config, cli.cache_type, cli.cache);
    let ctx = AppContext::open(cache_type, cache_path, &data_dir)?;

    match cli.command {
        #[cfg(feature = "chat")]
        Command::Chat {
            name,
            color,
            offline,
            location,
        } => {
            let name = config::resolve_name(&config, name);
            let theme = config::resolve_theme(&config, color);
            let session = chatter_core::Session::start(&chatter_core::AnonymousAuthenticator, name, theme)
                .await
                .map_err(|e| ChatterError::SignIn(e.to_string()))?;

            chat::run(ctx, session, offline, location).await?;
        }
        Command::Cache { action } => match action {
            CacheAction::Show => show_cache(&ctx)?,
            CacheAction::Clear => {
                write_snapshot(&ctx.cache, CACHE_KEY, &[])
                    .map_err(|e| ChatterError::Snapshot(e.to_string()))?;
                println!("Cache cleared.");
            }
        },
    }

    Ok(())
}
