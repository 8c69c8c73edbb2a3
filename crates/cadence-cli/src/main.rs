//! `cadence`: track onboarding worker and admin commands.
//!
//! Configuration comes from the environment (and `.env`); see `Config::from_env`.

use anyhow::{Context, Result};
use cadence_cli::init_tracing;
use cadence_cli::setup::{build_services, connect_database, run_migrations, setup_database, setup_local_storage};
use cadence_core::Config;
use cadence_db::{OnboardingQueue, TrackRepository, WorkQueue};
use cadence_worker::{OnboardingPool, TrackIntake};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "cadence", about = "Track onboarding pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the onboarding worker pool until interrupted
    Run {
        /// Override ONBOARDING_WORKERS
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Copy a local audio file into the onboarding queue
    Ingest {
        /// Path to the audio file
        file: PathBuf,
    },
    /// Return a claimed track to the queue
    ResetStatus {
        /// Track UUID
        id: Uuid,
    },
    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Run { workers } => {
            if let Some(workers) = workers {
                config.worker.worker_count = workers;
                config.validate()?;
            }
            run(config).await
        }
        Commands::Ingest { file } => ingest(&config, file).await,
        Commands::ResetStatus { id } => {
            let pool = connect_database(&config).await?;
            let queue = OnboardingQueue::new(pool);
            queue
                .reset_status(id)
                .await
                .with_context(|| format!("Failed to reset track {}", id))?;
            tracing::info!(track_id = %id, "Track returned to the queue");
            Ok(())
        }
        Commands::Migrate => {
            let pool = connect_database(&config).await?;
            run_migrations(&pool).await
        }
    }
}

async fn run(config: Config) -> Result<()> {
    tracing::info!(environment = %config.environment, "Starting onboarding service");

    let pool = setup_database(&config).await?;
    let services = build_services(&config, pool).await?;
    let workers = OnboardingPool::start(services);

    let signal = shutdown_signal().await;

    // In-flight items finish (or compensate) before the process exits.
    workers.shutdown_and_join().await;
    tracing::info!("Onboarding service stopped");
    signal
}

async fn ingest(config: &Config, file: PathBuf) -> Result<()> {
    let pool = connect_database(config).await?;
    let local = setup_local_storage(config).await?;
    let intake = TrackIntake::new(local, Arc::new(TrackRepository::new(pool)));

    let source = tokio::fs::File::open(&file)
        .await
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let id = intake
        .accept_upload(source)
        .await
        .with_context(|| format!("Failed to ingest {}", file.display()))?;

    tracing::info!(track_id = %id, file = %file.display(), "Track queued for onboarding");
    println!("{}", id);
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to install Ctrl+C handler")
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("Failed to install signal handler")?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            tracing::info!("Received Ctrl+C signal");
        },
        result = terminate => {
            result?;
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
    Ok(())
}
