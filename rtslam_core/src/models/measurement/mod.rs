// rtslam_core/src/models/measurement/mod.rs

//! Measurement models `z = h(x) + v` with their Jacobians.

pub mod absloc;

pub use absloc::{AbslocModel, Channel, ChannelLayout};
