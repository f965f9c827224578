use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use activity_sink::{
    config::Config,
    services::{FileProcessor, HttpImporter, SinkWatcher},
    storage::StaticDirectory,
};

#[derive(Parser)]
#[command(name = "activity-sink", version, about = "Imports activity files dropped into a sink folder")]
struct Cli {
    /// Override the configured watch root
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create the sink folder layout and exit
    Init,
    /// Process files already present, then exit
    Sweep,
    /// Sweep once, then watch for new files until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Load config
    let mut config = Config::load()?;
    if let Some(root) = cli.root {
        config.watch_root = root;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("activity_sink={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(config);

    let directory = Arc::new(StaticDirectory::from_config(&config));
    tracing::info!(
        "Loaded {} owner(s) and {} category(ies)",
        directory.owner_count(),
        directory.category_count()
    );

    let importer = HttpImporter::new(config.importer_url.clone())
        .with_token(config.importer_token.clone());

    // Verify import service health on startup
    match importer.health_check().await {
        Ok(true) => tracing::info!("Import service reachable at {}", config.importer_url),
        Ok(false) => tracing::warn!("Import service health check returned false"),
        Err(e) => tracing::warn!(
            "Import service not available: {}. Files will be parked in error/ until it is.",
            e
        ),
    }

    let processor = Arc::new(FileProcessor::from_config(
        &config,
        directory.clone(),
        directory,
        Arc::new(importer),
    ));
    let mut watcher = SinkWatcher::new(config.clone(), processor);

    match cli.command.unwrap_or(Command::Watch) {
        Command::Init => {
            watcher.initialize()?;
        }
        Command::Sweep => {
            watcher.initialize()?;
            let count = watcher.sweep().await?;
            println!("{}", count);
        }
        Command::Watch => {
            let count = watcher.start_and_recover().await?;
            tracing::info!("Recovered {} file(s) dropped while offline", count);
            tracing::info!("Sink folder watcher is running. Press Ctrl+C to stop.");

            tokio::signal::ctrl_c().await?;
            tracing::info!("Received interrupt signal");
            watcher.stop().await;
        }
    }

    Ok(())
}
