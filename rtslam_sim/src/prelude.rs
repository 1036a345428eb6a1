// rtslam_sim/src/prelude.rs

pub use crate::simulation::core::config::{MapConfig, RobotConfig, ScenarioConfig, SensorConfig, Simulation};
pub use crate::simulation::core::prng::SimulationRng;
pub use crate::simulation::core::runner::{ScenarioRunner, SimulationReport};
pub use crate::simulation::sensors::absloc::AbslocSimulator;
pub use crate::simulation::vehicles::unicycle::Unicycle;
