use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use drone_client::{load_script, load_settings, run, RunOptions, Script, Simulation};
use drone_shared::SwarmSettings;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless drone swarm simulation", long_about = None)]
struct Args {
    /// Canvas width in world units
    #[arg(long, default_value_t = 800.0)]
    width: f32,

    /// Canvas height in world units
    #[arg(long, default_value_t = 600.0)]
    height: f32,

    /// Number of ticks to simulate
    #[arg(short, long, default_value_t = 600)]
    ticks: u64,

    /// JSON script of formation and pointer steps
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// JSON settings file; missing fields keep their defaults
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write snapshots here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a snapshot line every N ticks
    #[arg(long)]
    snapshot_every: Option<u64>,

    /// Spawn the pointer-following drone at startup
    #[arg(long)]
    pointer: bool,

    /// Seed for the world's random source
    #[arg(long)]
    seed: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let settings = match &args.settings {
        Some(path) => load_settings(path)?,
        None => SwarmSettings::default(),
    };
    let script = match &args.script {
        Some(path) => load_script(path)?,
        None => Script::default(),
    };

    log::info!("Drone swarm starting...");
    log::info!("Canvas: {}x{}, {} ticks", args.width, args.height, args.ticks);
    log::info!("Script steps: {}", script.steps.len());

    let options = RunOptions {
        width: args.width,
        height: args.height,
        seed: args.seed,
        pointer: args.pointer,
    };
    let mut simulation = Simulation::new(&settings, options, script);

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("Failed to create output file {}", path.display())
        })?)),
        None => Box::new(io::stdout().lock()),
    };

    let status = run(&mut simulation, args.ticks, args.snapshot_every, &mut out)
        .context("Simulation error")?;
    simulation.shutdown();

    log::info!(
        "Finished after {} ticks: {} active, {} retiring, {} spawned, {} retired",
        status.ticks,
        status.active,
        status.retiring,
        status.spawned,
        status.retired
    );

    Ok(())
}
