//! muses - live MIDI companion
//!
//! Subcommands:
//! - `muses run` - Listen on the input port and play along
//! - `muses ports` - List MIDI input and output ports
//! - `muses config` - Print the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use musesconf::{MusesConfig, RhythmSource};
use tracing::info;
use tracing_subscriber::EnvFilter;

use muses::midi_io::{list_input_ports, list_output_ports};
use muses::{open_ports, Engine};

#[derive(Parser)]
#[command(name = "muses")]
#[command(about = "Live MIDI companion: infers your mode and plays along")]
#[command(version)]
struct Cli {
    /// Config file used instead of ./muses.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen and play along until the input port closes
    Run {
        /// Input port name (substring match)
        #[arg(long)]
        input: Option<String>,

        /// Melody output port
        #[arg(long)]
        melody: Option<String>,

        /// Chord output port
        #[arg(long)]
        chord: Option<String>,

        /// Click output port
        #[arg(long)]
        rhythm: Option<String>,

        /// Tempo in beats per minute
        #[arg(long)]
        bpm: Option<f64>,

        /// Seed for reproducible generation
        #[arg(long)]
        seed: Option<u64>,

        /// Where the played rhythm comes from: echo or markov
        #[arg(long, value_parser = parse_rhythm_source)]
        rhythm_source: Option<RhythmSource>,
    },

    /// List available MIDI ports
    Ports,

    /// Print the effective configuration as TOML
    Config,
}

fn parse_rhythm_source(s: &str) -> Result<RhythmSource, String> {
    match s.to_ascii_lowercase().as_str() {
        "echo" => Ok(RhythmSource::Echo),
        "markov" => Ok(RhythmSource::Markov),
        other => Err(format!("expected echo or markov, got {other:?}")),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = MusesConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    init_logging(&config.telemetry.log_level);

    match cli.command {
        Commands::Run {
            input,
            melody,
            chord,
            rhythm,
            bpm,
            seed,
            rhythm_source,
        } => {
            let ports = &mut config.ports;
            for (slot, value) in [
                (&mut ports.input, input),
                (&mut ports.melody, melody),
                (&mut ports.chord, chord),
                (&mut ports.rhythm, rhythm),
            ] {
                if let Some(value) = value {
                    *slot = value;
                }
            }
            if let Some(bpm) = bpm {
                config.tempo.bpm = bpm;
            }
            if seed.is_some() {
                config.generator.seed = seed;
            }
            if let Some(source) = rhythm_source {
                config.generator.rhythm_source = source;
            }

            for file in &sources.files {
                info!("config file: {}", file.display());
            }
            for var in &sources.env_overrides {
                info!("env override: {}", var);
            }

            run(config)?;
        }
        Commands::Ports => {
            println!("Inputs:");
            for port in list_input_ports().context("Failed to list MIDI inputs")? {
                println!("  [{}] {}", port.index, port.name);
            }
            println!("Outputs:");
            for port in list_output_ports().context("Failed to list MIDI outputs")? {
                println!("  [{}] {}", port.index, port.name);
            }
        }
        Commands::Config => {
            for file in &sources.files {
                println!("# from {}", file.display());
            }
            for var in &sources.env_overrides {
                println!("# env {}", var);
            }
            print!("{}", config.to_toml().context("Failed to render configuration")?);
        }
    }

    Ok(())
}

fn run(config: MusesConfig) -> Result<()> {
    let engine = Engine::new(config).context("Invalid configuration")?;
    let (_input, notes, outputs) =
        open_ports(&engine.config().ports).context("Failed to open MIDI ports")?;

    info!("muses {} listening", env!("CARGO_PKG_VERSION"));
    let handle = engine
        .start(notes, outputs)
        .context("Failed to start engine")?;

    if handle.join_listener().is_err() {
        anyhow::bail!("listener thread panicked");
    }
    info!("input closed, shutting down");
    Ok(())
}
