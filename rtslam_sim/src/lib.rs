// rtslam_sim/src/lib.rs

// This prelude is for convenience for other files WITHIN the rtslam_sim crate.
pub mod prelude;

// Command line of the scenario binary.
pub mod cli;
// Ground truth, simulated drivers and the scenario loop.
pub mod simulation;
