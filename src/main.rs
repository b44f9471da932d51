use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waveforge::{
    arena::SimulatedArena,
    clock::{Clock, ManualClock, SystemClock},
    config::ConfigLoader,
    encounter::EncounterController,
    service::{ConfigSource, EncounterService},
    wave::WavePhase,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Wave survival encounter runner")]
struct Cli {
    /// Path to the encounter YAML file
    #[arg(long, default_value = "configs/arena.yaml")]
    config: PathBuf,

    /// Master seed for every random stream
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play every configured wave against a simulated arena
    Run {
        /// Advance a manual clock instead of waiting in real time
        #[arg(long)]
        instant: bool,
    },
    /// Serve the HTTP control surface
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Driver tick period in milliseconds
        #[arg(long, default_value_t = 100)]
        tick_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let loader = ConfigLoader::new(".");
    let report = loader.load(&cli.config)?;

    match cli.command {
        Command::Run { instant } => {
            let manual = ManualClock::new();
            let clock: Arc<dyn Clock> = if instant {
                Arc::new(manual.clone())
            } else {
                Arc::new(SystemClock::new())
            };
            let arena = SimulatedArena::new().without_call_log();
            let mut controller = EncounterController::new(report.config, arena, clock, cli.seed);
            if let Err(err) = controller.start_waves() {
                bail!("cannot start: {err}");
            }
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            while controller.phase() != WavePhase::Idle {
                if instant {
                    manual.advance(Duration::from_secs(1));
                } else {
                    ticker.tick().await;
                }
                controller.tick();
            }
            let standings = controller.leaderboard();
            info!(
                waves = controller.run_state().current_wave_index,
                players = standings.len(),
                "encounter finished"
            );
        }
        Command::Serve {
            host,
            port,
            tick_ms,
        } => {
            let controller = EncounterController::new(
                report.config,
                SimulatedArena::new().without_call_log(),
                Arc::new(SystemClock::new()),
                cli.seed,
            );
            let service = EncounterService::new(controller).with_config_source(ConfigSource {
                base_dir: PathBuf::from("."),
                file: cli.config.clone(),
            });
            web::run(
                Arc::new(service),
                WebServerConfig {
                    host,
                    port,
                    tick: Duration::from_millis(tick_ms.max(1)),
                },
            )
            .await?;
        }
    }
    Ok(())
}
