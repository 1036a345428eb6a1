// rtslam_core/src/estimation/filters/mod.rs

mod ekf;

pub use ekf::ExtendedKalmanFilter;
