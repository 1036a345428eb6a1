// rtslam_core/src/lib.rs

// Absolute-localization fusion core of an EKF localization and mapping engine.
pub mod config;
pub mod error;
pub mod estimation;
pub mod gaussian;
pub mod hardware;
pub mod mapping;
pub mod math;
pub mod models;
pub mod prelude;
pub mod robot;
pub mod types;
