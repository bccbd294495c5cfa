/*
Developer blog:
- The window used to register its event listeners on every render pass and never release them.
    After a while a single node_status event ran the handler a dozen times, each one writing back a
    copy of the node list it captured when it was registered. Nodes reappeared after disconnecting.
    All registry state now lives behind one reconciler task, and the views only hold
    subscription handles.
- Kept the command names the backend already exposes so the window does not need to change.
- Added a replay subcommand so a recorded session can be fed back without a running farm.
    Record with the devtools console, one event per line.

[F] - stream the snapshot to the window instead of polling latest()
*/
use clap::{Parser, Subcommand};
use config::Config;
use dotenv::dotenv;
use services::replay::ReplayApp;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod domains;
pub mod models;
pub mod services;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a recorded event log through the reconciler and print the resulting state.
    Replay {
        /// one `{"event": .., "payload": ..}` object per line
        events: PathBuf,
        /// recorded node list response
        #[arg(long)]
        nodes: Option<PathBuf>,
        /// recorded job list response
        #[arg(long)]
        jobs: Option<PathBuf>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let cli = Cli::parse();
    let config = Config::load();

    match cli.command {
        Commands::Replay {
            events,
            nodes,
            jobs,
        } => {
            let mut app = ReplayApp::new(config);
            if let Some(path) = nodes {
                app = app.with_nodes(&tokio::fs::read_to_string(&path).await?);
            }
            if let Some(path) = jobs {
                app = app.with_jobs(&tokio::fs::read_to_string(&path).await?);
            }

            let report = app.run_file(&events).await?;
            for notification in &report.notifications {
                tracing::info!(?notification);
            }
            if report.unhandled > 0 {
                tracing::warn!(count = report.unhandled, "Events without a handler were dropped");
            }
            println!("{}", serde_json::to_string_pretty(&report.snapshot)?);
        }
    }
    Ok(())
}
