//! # FeedLink CLI
//!
//! Follows a dashboard notification feed from the terminal.
//!
//! Usage:
//!   feedlink watch                      # Live feed until Ctrl-C
//!   feedlink watch --desktop            # Also raise desktop notifications
//!   feedlink list --limit 50            # Print one snapshot page
//!   feedlink read <id>                  # Mark one notification read
//!   feedlink read-all                   # Mark everything read
//!   feedlink config --init              # Write ~/.feedlink/config.toml

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use feedlink_client::{
    DesktopNotifier, FeedApi, FeedClient, FeedEvent, HttpFeedApi, LogNotifier, Notifier, SnapshotLoader,
};
use feedlink_core::traits::StaticIdentity;
use feedlink_core::{FeedConfig, FeedItem, Pagination};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "feedlink", version, about = "📡 FeedLink — live notification feed client")]
struct Cli {
    /// Config file (default: ~/.feedlink/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Override the REST base URL
    #[arg(long, global = true)]
    api: Option<String>,

    /// Identity (user id) for the live channel
    #[arg(long, global = true)]
    identity: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow the live feed until Ctrl-C
    Watch {
        /// Raise desktop notifications for pushed items
        #[arg(long)]
        desktop: bool,
    },
    /// Print one page of notifications
    List {
        #[arg(long, default_value = "0")]
        skip: u32,
        /// Page size (capped by snapshot.page_limit)
        #[arg(long)]
        limit: Option<u32>,
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark one notification read
    Read { id: String },
    /// Mark all notifications read
    ReadAll,
    /// Show the effective config, or write a default one
    Config {
        #[arg(long)]
        init: bool,
    },
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

fn config_path(cli: &Cli) -> PathBuf {
    match &cli.config {
        Some(p) => expand_path(p),
        None => FeedConfig::default_path(),
    }
}

fn load_config(cli: &Cli) -> Result<FeedConfig> {
    let mut config = match &cli.config {
        Some(p) => {
            let path = expand_path(p);
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            FeedConfig::load_from(&path)?
        }
        None => FeedConfig::load()?,
    };

    if let Some(api) = &cli.api {
        config.api_base = api.clone();
    }
    if let Some(identity) = &cli.identity {
        config.identity = identity.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "feedlink=debug,feedlink_client=debug,feedlink_channel=debug"
    } else {
        "feedlink=info,feedlink_client=info,feedlink_channel=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    if let Command::Config { init } = &cli.command {
        return show_config(&cli, *init);
    }

    let config = load_config(&cli)?;
    match cli.command {
        Command::Watch { desktop } => watch(config, desktop).await,
        Command::List { skip, limit, json } => list(config, skip, limit, json).await,
        Command::Read { id } => {
            HttpFeedApi::new(&config)?.mark_read(&id).await?;
            println!("✅ Marked {id} as read");
            Ok(())
        }
        Command::ReadAll => {
            HttpFeedApi::new(&config)?.mark_all_read().await?;
            println!("✅ All notifications marked as read");
            Ok(())
        }
        Command::Config { .. } => Ok(()),
    }
}

async fn watch(config: FeedConfig, desktop: bool) -> Result<()> {
    let notifier: Arc<dyn Notifier> = if desktop {
        Arc::new(DesktopNotifier::new())
    } else {
        Arc::new(LogNotifier)
    };
    if config.fixed_identity().is_none() {
        tracing::warn!("No identity configured (set `identity` or pass --identity); polling only");
    }
    let identity = Arc::new(StaticIdentity::new(config.fixed_identity()));
    let endpoint = config.channel_endpoint();

    let client = FeedClient::from_config(config, identity, notifier)?;
    let mut sub = client.subscribe()?;
    println!("📡 Watching {endpoint} — Ctrl-C to stop\n");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = sub.next_event() => match event {
                Some(event) => print_event(&event),
                None => break,
            },
        }
    }

    let view = client.view();
    client.dispose().await;
    println!("\n👋 Stopped — {} items, {} unread", view.items.len(), view.unread_count);
    Ok(())
}

async fn list(config: FeedConfig, skip: u32, limit: Option<u32>, json: bool) -> Result<()> {
    let api: Arc<dyn FeedApi> = Arc::new(HttpFeedApi::new(&config)?);
    let loader = SnapshotLoader::new(api, &config.snapshot);
    let page = Pagination {
        skip,
        limit: limit.unwrap_or(config.snapshot.page_limit),
    };
    let snapshot = loader.fetch_checked(page).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    if snapshot.is_empty() {
        println!("📭 No notifications");
        return Ok(());
    }
    for item in &snapshot.items {
        println!("{}", format_item(item));
    }
    println!(
        "\n{} shown · {} unread · {} total",
        snapshot.items.len(),
        snapshot.unacknowledged_count,
        snapshot.total
    );
    Ok(())
}

fn show_config(cli: &Cli, init: bool) -> Result<()> {
    let path = config_path(cli);
    if init {
        if path.exists() {
            println!("⚠️  Config already exists: {}", path.display());
            return Ok(());
        }
        match &cli.config {
            Some(_) => FeedConfig::default().save_to(&path)?,
            None => FeedConfig::default().save()?,
        }
        println!("✅ Wrote default config to {}", path.display());
        return Ok(());
    }
    let config = load_config(cli)?;
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn format_item(item: &FeedItem) -> String {
    let mark = if item.acknowledged { " " } else { "●" };
    format!(
        "{mark} {} [{}] {} — {}  ({})",
        item.created_at.format("%Y-%m-%d %H:%M"),
        item.level,
        item.title,
        item.body,
        item.id
    )
}

fn print_event(event: &FeedEvent) {
    match event {
        FeedEvent::ItemReceived(item) => println!("{}", format_item(item)),
        FeedEvent::StateChanged(state) => tracing::info!("Channel {state}"),
        FeedEvent::Disconnected => println!("⚠️  Live channel lost, reconnecting…"),
        FeedEvent::Reconnected => println!("✅ Live channel restored"),
        FeedEvent::ActionFailed(message) => println!("❌ {message}"),
        FeedEvent::Degraded(reason) => println!("⚠️  Degraded: {reason}"),
    }
}
