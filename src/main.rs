use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crossroad_sim::simulation::{LightPolicy, PacingStrategy, SimConfig, SimWorld};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Random,
    Static,
    Count,
    WaitTime,
}

impl From<PolicyArg> for LightPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Random => LightPolicy::Random,
            PolicyArg::Static => LightPolicy::Static,
            PolicyArg::Count => LightPolicy::CountPreferred,
            PolicyArg::WaitTime => LightPolicy::WaitTimePreferred,
        }
    }
}

#[derive(Parser)]
#[command(name = "crossroad_sim")]
#[command(about = "Signal-controlled crossroad simulation")]
struct Cli {
    /// Traffic light policy
    #[arg(long, value_enum, default_value = "count")]
    policy: PolicyArg,

    /// Mean car arrivals per time unit
    #[arg(long, default_value = "2.0")]
    rate: f64,

    /// Simulated time to run
    #[arg(long, default_value = "40.0")]
    horizon: f64,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Pace the run against the wall clock, FACTOR time units per second
    #[arg(long, value_name = "FACTOR")]
    realtime: Option<f64>,

    /// Draw the grid once per time unit (real-time) or at the end
    #[arg(long)]
    map: bool,

    /// Only log warnings and errors
    #[arg(long)]
    quiet: bool,

    /// Compare all policies over this many seeds instead of a single run
    #[arg(long, value_name = "ROUNDS")]
    compare: Option<u32>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = SimConfig {
        policy: cli.policy.into(),
        arrival_rate: cli.rate,
        horizon: cli.horizon,
        seed: cli.seed,
        pacing: match cli.realtime {
            Some(factor) => PacingStrategy::RealtimePaced { factor },
            None => PacingStrategy::Unthrottled,
        },
        ..SimConfig::default()
    };

    match cli.compare {
        Some(rounds) => compare_policies(&config, rounds),
        None => run_single(config, cli.map),
    }
}

/// Run one session and print its statistics
fn run_single(config: SimConfig, map: bool) -> Result<()> {
    info!(
        "Running crossroad: policy={}, rate={}, horizon={}, seed={}",
        config.policy.name(),
        config.arrival_rate,
        config.horizon,
        config.seed
    );

    let horizon = config.horizon;
    let realtime = matches!(config.pacing, PacingStrategy::RealtimePaced { .. });
    let mut world = SimWorld::new(config).context("Invalid simulation configuration")?;

    if realtime {
        // Advance one time unit at a time so the map keeps up with the run
        while world.now() < horizon {
            let next = (world.now() + 1.0).min(horizon);
            world.run_until(next).context("Simulation aborted")?;
            if map {
                world.draw_map();
            }
        }
    } else {
        world.run().context("Simulation aborted")?;
        if map {
            world.draw_map();
        }
    }

    world.print_summary();
    Ok(())
}

/// Run every policy on the same seeds and print one line per run
fn compare_policies(base: &SimConfig, rounds: u32) -> Result<()> {
    if rounds == 0 {
        bail!("--compare needs at least one round");
    }
    let mut rng = StdRng::seed_from_u64(base.seed);
    let seeds: Vec<u64> = (0..rounds).map(|_| rng.random_range(0..1000)).collect();

    println!("Results");
    for seed in seeds {
        for policy in LightPolicy::ALL {
            let config = SimConfig {
                policy,
                seed,
                pacing: PacingStrategy::Unthrottled,
                ..base.clone()
            };
            let mut world = SimWorld::new(config)
                .with_context(|| format!("Invalid configuration for {}", policy.name()))?;
            world
                .run()
                .with_context(|| format!("Run with seed {seed} aborted"))?;
            match world.summary() {
                Ok(summary) => println!("{summary} {} (seed {seed})", policy.name()),
                Err(e) => println!("{e} {} (seed {seed})", policy.name()),
            }
        }
        println!();
    }
    Ok(())
}
