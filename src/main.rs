use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use listenlog::cli::{status, sync, timeline};
use listenlog::config::Config;
use listenlog::error::exit_code;
use listenlog::store::SessionStore;

#[derive(Parser)]
#[command(name = "listenlog")]
#[command(about = "Mirror media-server listening history into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "listenlog.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new listening sessions from the server
    Sync {
        /// Delete all stored sessions first and crawl the full history
        #[arg(long)]
        refresh: bool,
    },

    /// Show first and last listen per title
    Timeline,

    /// Show stored session count and history bounds
    Status,
}

fn main() -> ExitCode {
    if let Err(e) = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
    {
        eprintln!("failed to initialise logging: {}", e);
    }

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    // File values first, environment on top
    let mut config = Config::load(&cli.config)?;
    config.apply_process_env();

    match cli.command {
        Commands::Sync { refresh } => {
            if refresh {
                config.sync.refresh = true;
            }
            // Fail on missing settings before touching the database
            config.validate_sync()?;
            config.api_settings()?;

            info!("starting listening-history sync");
            let mut store = SessionStore::open(&config.database_path()?)?;
            sync::run(&mut store, &config)?;
            info!("finished sync");
        }
        Commands::Timeline => {
            let store = SessionStore::open(&config.database_path()?)?;
            timeline::run(&store)?;
        }
        Commands::Status => {
            let store = SessionStore::open(&config.database_path()?)?;
            status::run(&store)?;
        }
    }

    Ok(())
}
