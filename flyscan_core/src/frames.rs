//! Detector frame reads and energy tagging.

use flyscan_traits::BufferedDetector;

use crate::error::ScanError;
use crate::hw_error::{map_detector_error, map_hw_error};
use crate::profile::MotionPlan;
use crate::types::CrystalGeometry;

/// One detector frame with the photon energy it was triggered at.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedFrame {
    pub index: usize,
    pub energy_ev: f64,
    pub channels: Vec<f64>,
}

pub fn frames_available<D: BufferedDetector + ?Sized>(detector: &mut D) -> Result<usize, ScanError> {
    detector
        .number_of_frames_available()
        .map_err(|e| ScanError::Detector(map_hw_error(&*e)))
}

/// Read frames `start..end`. A range beyond the buffered frames is a
/// `ScanError::FrameRange` carrying the detector's own count.
pub fn read_frames<D: BufferedDetector + ?Sized>(
    detector: &mut D,
    start: usize,
    end: usize,
) -> Result<Vec<Vec<f64>>, ScanError> {
    detector
        .read_frames(start, end)
        .map_err(|e| map_detector_error(&*e))
}

/// Pair frames read from `first_index` onward with their energies.
pub fn tag_frames(
    frames: Vec<Vec<f64>>,
    first_index: usize,
    plan: &MotionPlan,
    geometry: &CrystalGeometry,
    frame_offset: f64,
) -> Result<Vec<TaggedFrame>, ScanError> {
    frames
        .into_iter()
        .enumerate()
        .map(|(i, channels)| {
            let index = first_index + i;
            Ok(TaggedFrame {
                index,
                energy_ev: plan.energy_at_frame(index, geometry, frame_offset)?,
                channels,
            })
        })
        .collect()
}
