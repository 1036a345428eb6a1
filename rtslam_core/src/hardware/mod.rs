// rtslam_core/src/hardware/mod.rs

//! The contract between estimator sensors and the drivers that buffer their
//! raw readings.

use nalgebra::{DVector, Vector3};
use std::fmt::Debug;

use crate::error::Result;
use crate::types::RawId;

/// Physical quantities a proprioceptive reading can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    /// Absolute position `[x, y, z]`.
    Position,
    /// Absolute orientation as Euler angles `[roll, pitch, yaw]`.
    OrientationEuler,
}

/// One raw reading laid out as `[timestamp | values | uncertainties]`, where
/// `values` and `uncertainties` both have `data_size` elements and the
/// uncertainty of `data[i]` sits at `data[i + data_size]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub data: DVector<f64>,
}

impl RawReading {
    /// A zeroed reading for a source reporting `data_size` scalar channels.
    pub fn new(data_size: usize) -> Self {
        Self {
            data: DVector::zeros(1 + 2 * data_size),
        }
    }

    /// Builds a reading from its parts.
    pub fn from_parts(timestamp: f64, values: &[f64], uncertainties: &[f64]) -> Self {
        assert_eq!(values.len(), uncertainties.len(), "RawReading: values and uncertainties differ in size");
        let mut reading = Self::new(values.len());
        reading.data[0] = timestamp;
        for (i, (v, u)) in values.iter().zip(uncertainties).enumerate() {
            reading.data[1 + i] = *v;
            reading.data[1 + values.len() + i] = *u;
        }
        reading
    }

    pub fn data_size(&self) -> usize {
        (self.data.len() - 1) / 2
    }

    pub fn timestamp(&self) -> f64 {
        self.data[0]
    }

    /// The three values starting at data index `index`.
    pub fn value3(&self, index: usize) -> Vector3<f64> {
        self.data.fixed_rows::<3>(index).into_owned()
    }

    /// The uncertainties of the three values starting at data index `index`.
    pub fn uncertainty3(&self, index: usize) -> Vector3<f64> {
        self.data.fixed_rows::<3>(index + self.data_size()).into_owned()
    }

    pub fn set_value3(&mut self, index: usize, value: &Vector3<f64>) {
        self.data.fixed_rows_mut::<3>(index).copy_from(value);
    }

    pub fn set_uncertainty3(&mut self, index: usize, uncertainty: &Vector3<f64>) {
        let offset = index + self.data_size();
        self.data.fixed_rows_mut::<3>(offset).copy_from(uncertainty);
    }
}

/// Identity of a reading available in a hardware buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawInfo {
    pub id: RawId,
    pub timestamp: f64,
}

/// The readings currently held by a source, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInfos {
    pub available: Vec<RawInfo>,
}

/// A source of proprioceptive readings (GPS receiver, motion-capture link...).
///
/// Any blocking on data availability happens inside the implementation.
pub trait HardwareSensorProprio: Debug + Send {
    /// Number of scalar channels per reading.
    fn data_size(&self) -> usize;

    /// Index in [`RawReading::data`] where `quantity` starts, or `None` if
    /// this source does not report it. Indices start at 1, after the timestamp.
    fn get_quantity(&self, quantity: Quantity) -> Option<usize>;

    /// Fetches reading `id` and releases it together with every older reading.
    fn get_raw(&mut self, id: RawId, reading: &mut RawReading) -> Result<()>;

    /// Copies reading `id` without releasing anything.
    fn observe_raw(&self, id: RawId, reading: &mut RawReading) -> Result<()>;

    /// Lists the readings currently available, oldest first.
    fn available_raws(&self) -> RawInfos;
}

mod buffered;

pub use buffered::{BufferedAbslocSource, ChannelSet, ReadingFeeder};
