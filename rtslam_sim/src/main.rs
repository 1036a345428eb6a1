// rtslam_sim/src/main.rs

use anyhow::{ensure, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rtslam_sim::cli::Cli;
use rtslam_sim::prelude::*;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("rtslam_sim=info".parse()?)
                .add_directive("rtslam_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    ensure!(
        cli.scenario.is_file(),
        "scenario file {} does not exist",
        cli.scenario.display()
    );

    info!("Loading scenario from {:?}", cli.scenario);
    let mut config = ScenarioConfig::load(&cli.scenario)
        .with_context(|| format!("failed to parse scenario {}", cli.scenario.display()))?;
    if let Some(seed) = cli.seed {
        config.simulation.seed = Some(seed);
    }
    if let Some(duration) = cli.duration {
        config.simulation.duration_seconds = duration;
    }

    let report = ScenarioRunner::new(config)?.run()?;
    println!("{report}");
    Ok(())
}
