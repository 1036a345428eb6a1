// rtslam_sim/src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// rtslam_sim: runs an absolute-localization scenario through the fusion core.
///
/// This struct defines the command-line arguments accepted by the scenario
/// binary. Flags override the matching scenario file entries.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run.
    #[arg(
        short,
        long,
        default_value = "assets/scenarios/00_gps_compass_loop.toml"
    )]
    pub scenario: PathBuf,

    /// Seed for the noise generator, overriding `simulation.seed`.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Simulated duration in seconds, overriding `simulation.duration_seconds`.
    #[arg(short, long)]
    pub duration: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_parse() {
        let cli = Cli::parse_from(["rtslam_sim", "--scenario", "x.toml", "--seed", "7", "-d", "2.5"]);
        assert_eq!(cli.scenario, PathBuf::from("x.toml"));
        assert_eq!(cli.seed, Some(7));
        assert_eq!(cli.duration, Some(2.5));
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["rtslam_sim"]);
        assert!(cli.scenario.ends_with("00_gps_compass_loop.toml"));
        assert_eq!(cli.seed, None);
    }
}
