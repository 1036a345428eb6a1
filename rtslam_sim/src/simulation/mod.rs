// rtslam_sim/src/simulation/mod.rs

pub mod core;
pub mod sensors;
pub mod vehicles;
