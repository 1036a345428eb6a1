// rtslam_core/src/hardware/buffered.rs

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{EstimationError, Result};
use crate::hardware::{HardwareSensorProprio, Quantity, RawInfo, RawInfos, RawReading};
use crate::types::RawId;

/// Which quantities an absolute localization source reports. Present
/// channels are packed in the order position, orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelSet {
    #[serde(default = "default_true")]
    pub position: bool,
    #[serde(default)]
    pub orientation: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self {
            position: true,
            orientation: false,
        }
    }
}

impl ChannelSet {
    pub const POSITION: Self = Self {
        position: true,
        orientation: false,
    };
    pub const ORIENTATION: Self = Self {
        position: false,
        orientation: true,
    };
    pub const FULL: Self = Self {
        position: true,
        orientation: true,
    };

    /// Number of scalar channels per reading.
    pub fn data_size(&self) -> usize {
        3 * (self.position as usize + self.orientation as usize)
    }
}

#[derive(Debug, Default)]
struct ReadingLog {
    next_id: RawId,
    readings: VecDeque<(RawId, RawReading)>,
}

fn lock(log: &Mutex<ReadingLog>) -> MutexGuard<'_, ReadingLog> {
    // A panicking producer cannot leave the log half-written.
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Producer side of a [`BufferedAbslocSource`]. Cheap to clone and `Send`, so
/// a driver thread can own one.
#[derive(Debug, Clone)]
pub struct ReadingFeeder {
    data_size: usize,
    capacity: usize,
    log: Arc<Mutex<ReadingLog>>,
}

impl ReadingFeeder {
    /// Appends a reading and returns its id. The oldest reading is dropped
    /// once the buffer holds `capacity` readings.
    pub fn push(&self, timestamp: f64, values: &[f64], uncertainties: &[f64]) -> Result<RawId> {
        for got in [values.len(), uncertainties.len()] {
            if got != self.data_size {
                return Err(EstimationError::ReadingSize {
                    expected: self.data_size,
                    got,
                });
            }
        }

        let mut log = lock(&self.log);
        let id = log.next_id;
        log.next_id += 1;
        if log.readings.len() == self.capacity {
            log.readings.pop_front();
        }
        log.readings
            .push_back((id, RawReading::from_parts(timestamp, values, uncertainties)));
        Ok(id)
    }
}

/// An in-memory, bounded history of absolute localization readings.
#[derive(Debug)]
pub struct BufferedAbslocSource {
    channels: ChannelSet,
    capacity: usize,
    log: Arc<Mutex<ReadingLog>>,
}

impl BufferedAbslocSource {
    pub fn new(channels: ChannelSet, capacity: usize) -> Self {
        assert!(channels.data_size() > 0, "BufferedAbslocSource: no channel enabled");
        assert!(capacity > 0, "BufferedAbslocSource: capacity must be positive");
        Self {
            channels,
            capacity,
            log: Arc::new(Mutex::new(ReadingLog::default())),
        }
    }

    pub fn channels(&self) -> ChannelSet {
        self.channels
    }

    /// A handle to push readings into this buffer.
    pub fn feeder(&self) -> ReadingFeeder {
        ReadingFeeder {
            data_size: self.channels.data_size(),
            capacity: self.capacity,
            log: Arc::clone(&self.log),
        }
    }
}

impl HardwareSensorProprio for BufferedAbslocSource {
    fn data_size(&self) -> usize {
        self.channels.data_size()
    }

    fn get_quantity(&self, quantity: Quantity) -> Option<usize> {
        match quantity {
            Quantity::Position => self.channels.position.then_some(1),
            Quantity::OrientationEuler => self
                .channels
                .orientation
                .then_some(1 + 3 * self.channels.position as usize),
        }
    }

    fn get_raw(&mut self, id: RawId, reading: &mut RawReading) -> Result<()> {
        let mut log = lock(&self.log);
        let pos = log
            .readings
            .iter()
            .position(|(rid, _)| *rid == id)
            .ok_or(EstimationError::RawNotAvailable(id))?;
        reading.clone_from(&log.readings[pos].1);
        log.readings.drain(..=pos);
        Ok(())
    }

    fn observe_raw(&self, id: RawId, reading: &mut RawReading) -> Result<()> {
        let log = lock(&self.log);
        let (_, found) = log
            .readings
            .iter()
            .find(|(rid, _)| *rid == id)
            .ok_or(EstimationError::RawNotAvailable(id))?;
        reading.clone_from(found);
        Ok(())
    }

    fn available_raws(&self) -> RawInfos {
        let log = lock(&self.log);
        RawInfos {
            available: log
                .readings
                .iter()
                .map(|(id, r)| RawInfo {
                    id: *id,
                    timestamp: r.timestamp(),
                })
                .collect(),
        }
    }
}
