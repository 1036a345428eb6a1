// rtslam_core/src/estimation/mod.rs

use crate::mapping::Map;
use crate::robot::Robot;

/// The slice of the world a sensor may read and write during one processing
/// cycle. Created by the host (scheduler, simulator) and passed in explicitly.
///
/// Holding both `&mut` borrows for the duration of the cycle makes the sensor
/// the only writer of the joint state while it runs.
pub struct FilterContext<'a> {
    /// The map, owning the joint filter.
    pub map: &'a mut Map,
    /// The robot carrying the sensor.
    pub robot: &'a mut Robot,
}

impl<'a> FilterContext<'a> {
    pub fn new(map: &'a mut Map, robot: &'a mut Robot) -> Self {
        Self { map, robot }
    }
}

pub mod filters;
pub mod sensors;
