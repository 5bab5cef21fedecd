//! CLI entry point for the Nemesys pump driver.
//!
//! Runs pump commands against the simulated EPOS bus:
//! - `info`: conversion factors and live status as JSON
//! - `home`, `aspirate`, `dose`, `move`, `valve`: single pump commands
//! - `demo`: the two-pump reference sequence
//! - `config`: print the effective configuration
//!
//! # Usage
//!
//! ```bash
//! nemesys --config config/nemesys.toml info
//! nemesys aspirate 100 10 --pump pump_a
//! nemesys --format json demo
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use nemesys::config::{AppConfig, PumpConfig, DEFAULT_CONFIG_PATH};
use nemesys::logging::{self, OutputFormat, TracingConfig};
use nemesys::sim::{SimNodeConfig, SimulatedEpos};
use nemesys::{HomingDirection, PumpError, PumpResult, PumpSession, SharedBus};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nemesys")]
#[command(about = "Cetoni Nemesys syringe pump control", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format (pretty, compact, json)
    #[arg(long, global = true, default_value = "compact")]
    format: OutputFormat,

    /// TOML description of the simulated controller nodes
    #[arg(long, global = true)]
    sim_node: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show conversion factors and status
    Info {
        /// Pump name (all pumps when omitted)
        #[arg(long)]
        pump: Option<String>,
    },

    /// Reference search against a limit switch
    Home {
        /// Pump name
        #[arg(long)]
        pump: Option<String>,
        /// Home against the negative limit switch
        #[arg(long)]
        negative: bool,
        /// Return without waiting for completion
        #[arg(long)]
        no_wait: bool,
    },

    /// Draw liquid into the syringe
    Aspirate {
        /// Volume (µl)
        volume: f64,
        /// Flow rate (µl/s)
        flow: f64,
        /// Pump name
        #[arg(long)]
        pump: Option<String>,
    },

    /// Expel liquid from the syringe
    Dose {
        /// Volume (µl)
        volume: f64,
        /// Flow rate (µl/s)
        flow: f64,
        /// Pump name
        #[arg(long)]
        pump: Option<String>,
    },

    /// Move the plunger to an absolute position
    Move {
        /// Position (µl, ≤ 0)
        #[arg(allow_negative_numbers = true)]
        position: f64,
        /// Flow rate (µl/s)
        flow: f64,
        /// Pump name
        #[arg(long)]
        pump: Option<String>,
        /// Return without waiting for completion
        #[arg(long)]
        no_wait: bool,
    },

    /// Switch the valve
    Valve {
        /// Pump name
        #[arg(long)]
        pump: Option<String>,
    },

    /// Run the two-pump reference sequence
    Demo,

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(level) = &cli.log_level {
        config.application.log_level = level.clone();
    }
    config.validate()?;
    logging::init(TracingConfig::from_app_config(&config)?.with_format(cli.format))?;

    let sim = match &cli.sim_node {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            SimulatedEpos::with_defaults(SimNodeConfig::from_toml_str(&text)?)
        }
        None => SimulatedEpos::new(),
    };
    let bus = SharedBus::new(sim);

    match cli.command {
        Commands::Info { pump } => {
            let names = match pump {
                Some(name) => vec![name],
                None => config.pumps.iter().map(|p| p.name.clone()).collect(),
            };
            for name in names {
                let session = open(&bus, select(&config, Some(&name))?).await?;
                let result = async {
                    Ok::<_, PumpError>(serde_json::json!({
                        "info": session.info()?,
                        "status": session.status().await?,
                    }))
                }
                .await;
                let report = finish(session, result).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Commands::Home {
            pump,
            negative,
            no_wait,
        } => {
            let direction = if negative {
                HomingDirection::Negative
            } else {
                HomingDirection::Positive
            };
            let mut session = open(&bus, select(&config, pump.as_deref())?).await?;
            let result = async {
                session.home(direction, !no_wait).await?;
                session.position().await
            }
            .await;
            println!("position: {:.1} µl", finish(session, result).await?);
        }
        Commands::Aspirate { volume, flow, pump } => {
            let mut session = open(&bus, select(&config, pump.as_deref())?).await?;
            let result = async {
                session.aspirate(volume, flow).await?;
                session.position().await
            }
            .await;
            println!("position: {:.1} µl", finish(session, result).await?);
        }
        Commands::Dose { volume, flow, pump } => {
            let mut session = open(&bus, select(&config, pump.as_deref())?).await?;
            let result = async {
                session.dose(volume, flow).await?;
                session.position().await
            }
            .await;
            println!("position: {:.1} µl", finish(session, result).await?);
        }
        Commands::Move {
            position,
            flow,
            pump,
            no_wait,
        } => {
            let mut session = open(&bus, select(&config, pump.as_deref())?).await?;
            let result = async {
                session.move_to(position, flow, !no_wait).await?;
                session.position().await
            }
            .await;
            println!("position: {:.1} µl", finish(session, result).await?);
        }
        Commands::Valve { pump } => {
            let mut session = open(&bus, select(&config, pump.as_deref())?).await?;
            let result = session.toggle_valve().await;
            let is_open = finish(session, result).await?;
            println!("valve {}", if is_open { "open" } else { "closed" });
        }
        Commands::Demo => run_demo(&bus, &config).await?,
        Commands::Config => print!("{}", config.to_toml_string()?),
    }

    Ok(())
}

async fn open(bus: &SharedBus<SimulatedEpos>, config: &PumpConfig) -> Result<PumpSession> {
    PumpSession::open(Box::new(bus.clone()), config.clone())
        .await
        .with_context(|| format!("opening pump '{}'", config.name))
}

/// Close `session`, then hand back the command result. A command error
/// takes precedence over a close error.
async fn finish<T>(session: PumpSession, result: PumpResult<T>) -> Result<T> {
    let closed = session.close().await;
    let value = result?;
    closed?;
    Ok(value)
}

fn select<'a>(config: &'a AppConfig, name: Option<&str>) -> Result<&'a PumpConfig> {
    match name {
        Some(name) => config
            .pump(name)
            .ok_or_else(|| anyhow!("no pump named '{name}' in the configuration")),
        None => config
            .pumps
            .first()
            .ok_or_else(|| anyhow!("no pumps configured")),
    }
}

/// Home both pumps, draw 50 µl through the valve, and home again.
async fn run_demo(bus: &SharedBus<SimulatedEpos>, config: &AppConfig) -> Result<()> {
    let [a, b] = match config.pumps.as_slice() {
        [a, b, ..] => [a, b],
        _ => return Err(anyhow!("the demo needs two configured pumps")),
    };
    let mut pump_a = open(bus, a).await?;
    let mut pump_b = match open(bus, b).await {
        Ok(session) => session,
        Err(e) => {
            if let Err(close_error) = pump_a.close().await {
                tracing::warn!(error = %close_error, "Closing pump after failed open");
            }
            return Err(e);
        }
    };

    let result = demo_sequence(&mut pump_a, &mut pump_b).await;
    let closed_a = pump_a.close().await;
    let closed_b = pump_b.close().await;
    result?;
    closed_a?;
    closed_b?;
    Ok(())
}

async fn demo_sequence(pump_a: &mut PumpSession, pump_b: &mut PumpSession) -> Result<()> {
    futures::try_join!(
        pump_a.home(HomingDirection::Positive, true),
        pump_b.home(HomingDirection::Positive, true),
    )?;

    pump_a.toggle_valve().await?;
    futures::try_join!(
        pump_a.move_to(-50.0, 50.0, true),
        pump_b.move_to(-50.0, 50.0, true),
    )?;
    pump_a.toggle_valve().await?;

    for pump in [&*pump_a, &*pump_b] {
        let status = pump.status().await?;
        println!("{}", serde_json::to_string(&status)?);
    }

    futures::try_join!(
        pump_a.home(HomingDirection::Positive, true),
        pump_b.home(HomingDirection::Positive, true),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nemesys::sim::error_codes;
    use nemesys::transport::ops;
    use nemesys::NodeId;

    #[tokio::test(start_paused = true)]
    async fn test_failed_command_still_closes_session() {
        let bus = SharedBus::new(SimulatedEpos::new());
        let config = PumpConfig::new("pump_a", NodeId(2));
        let mut session = open(&bus, &config).await.unwrap();
        assert_eq!(bus.open_handles(), 1);

        let result = session.aspirate(1000.0, 10.0).await;
        let err = finish(session, result).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PumpError>(),
            Some(PumpError::Capacity { .. })
        ));
        assert_eq!(bus.open_handles(), 0);
        assert!(!bus.with_transport(|sim| sim.is_open()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_closes_both_pumps_on_failure() {
        let bus = SharedBus::new(SimulatedEpos::new());
        bus.with_transport(|sim| sim.fail_once(NodeId(3), ops::FIND_HOME, error_codes::OVERCURRENT))
            .await;
        let config = AppConfig {
            pumps: vec![
                PumpConfig::new("pump_a", NodeId(2)),
                PumpConfig::new("pump_b", NodeId(3)),
            ],
            ..AppConfig::default()
        };

        assert!(run_demo(&bus, &config).await.is_err());
        assert_eq!(bus.open_handles(), 0);
    }
}
