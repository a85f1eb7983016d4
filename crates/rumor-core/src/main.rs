//! Rumor Simulation
//!
//! Runs a small world of wandering agents trading rumors and writes every
//! lifecycle event to a JSONL log.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rumor_core::config::{default_config_toml, RumorConfig, DEFAULT_CONFIG_PATH};
use rumor_core::events::EventLogger;
use rumor_core::sim::{faction_summary, Simulation};

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "rumor_sim")]
#[command(about = "Rumor propagation among wandering NPC agents")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 1000)]
    ticks: u64,

    /// TOML config file (defaults to rumors.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the JSONL event log
    #[arg(long, default_value = "output/rumor_events.jsonl")]
    events_out: PathBuf,

    /// Override the configured agent count
    #[arg(long)]
    agents: Option<usize>,

    /// Print the default config as TOML and exit
    #[arg(long)]
    print_default_config: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<RumorConfig, rumor_core::config::ConfigError> {
    match path {
        Some(path) => RumorConfig::from_file(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            RumorConfig::from_file(Path::new(DEFAULT_CONFIG_PATH))
        }
        None => Ok(RumorConfig::default()),
    }
}

fn main() {
    let args = Args::parse();

    if args.print_default_config {
        print!("{}", default_config_toml());
        return;
    }

    init_tracing();

    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: could not load config: {}", e);
            process::exit(1);
        }
    };
    if let Some(agents) = args.agents {
        config.simulation.agent_count = agents;
    }

    let logger = match EventLogger::new(&args.events_out) {
        Ok(logger) => logger,
        Err(e) => {
            warn!(path = %args.events_out.display(), error = %e, "event log unavailable, discarding events");
            EventLogger::null()
        }
    };

    info!(seed = args.seed, ticks = args.ticks, agents = config.simulation.agent_count, "starting");

    let mut sim = match Simulation::new(config, args.seed, logger) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("Error: could not set up simulation: {}", e);
            process::exit(1);
        }
    };
    for (faction, count) in faction_summary(sim.world_mut()) {
        info!(faction = %faction, agents = count, "faction");
    }

    for tick in 1..=args.ticks {
        sim.step();
        if tick % 100 == 0 {
            let stats = sim.stats();
            info!(
                tick,
                rumors = sim.engine().store().len(),
                delivered = stats.delivered,
                forgotten = stats.forgotten,
                "progress"
            );
        }
    }

    if let Err(e) = sim.finish() {
        warn!(error = %e, "could not flush event log");
    }

    let summary = serde_json::json!({
        "ticks": sim.current_tick(),
        "simulation": sim.stats(),
        "rumors": sim.engine().statistics(),
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: could not render summary: {}", e),
    }
}
