// rtslam_sim/src/simulation/vehicles/mod.rs

pub mod unicycle;
