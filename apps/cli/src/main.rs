use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::Parser;
use dfu_core::{
    DestinationOutcome, DeviceHandle, EngineStatus, FlowConfig, FlowController, FlowState,
    MockNavigator, SimulatedRepository, UserCommand,
};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "DFU update flow driver (simulated engine)", long_about = None)]
struct Args {
    /// Path to the DFU package (.zip)
    archive: PathBuf,

    /// Address of the target device reported by discovery
    #[arg(long, default_value = "C8:1E:40:2A:91:07")]
    device_address: String,

    /// Advertised name of the target device
    #[arg(long)]
    device_name: Option<String>,

    /// Flow configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to this file and continue
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Delay between simulated engine reports, in milliseconds
    #[arg(long, default_value_t = 200)]
    step_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {}", e);
    }

    info!("Starting DFU flow driver...");

    if let Err(e) = run(args).await {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => FlowConfig::load_from_file(path)?,
        None => FlowConfig::default(),
    };
    if let Some(path) = &args.write_config {
        config.save_to_file(path)?;
        info!(path = %path.display(), "Configuration written");
    }

    let mut device = DeviceHandle::new(args.device_address);
    if let Some(name) = args.device_name {
        device = device.with_name(name);
    }

    let repository = Arc::new(SimulatedRepository::new(Duration::from_millis(args.step_ms)));
    let navigator = Arc::new(MockNavigator::new());
    navigator.script([DestinationOutcome::Succeeded(device)]);

    let mut session = FlowController::new(config, repository, navigator).spawn();
    let mut states = session.subscribe();

    let archive = args.archive.to_string_lossy().into_owned();
    session.submit(UserCommand::SelectArchive(archive))?;

    let outcome = loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break Err(anyhow!("session ended unexpectedly"));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, stopping transfer");
                session.submit(UserCommand::Stop)?;
                continue;
            }
        }

        let state = states.borrow_and_update().clone();
        match state {
            FlowState::AwaitingFile {
                invalid_selection: true,
            } => break Err(anyhow!("{} is not a valid DFU package", args.archive.display())),
            FlowState::AwaitingFile { .. } => {}
            FlowState::FileSummary { archive, target } => {
                info!(archive = %archive, target = %target, "Ready to install");
                session.submit(UserCommand::Install)?;
            }
            FlowState::InProgress { status } => {
                info!(status = %status, "Update");
                match status {
                    EngineStatus::Completed => break Ok(()),
                    EngineStatus::Aborted => break Err(anyhow!("update aborted")),
                    EngineStatus::Failed { message } => break Err(anyhow!(message)),
                    _ => {}
                }
            }
        }
    };

    session.dispose().await;
    outcome?;
    info!("Update complete");
    Ok(())
}
