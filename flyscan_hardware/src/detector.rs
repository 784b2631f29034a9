use flyscan_traits::clock::{Clock, MonotonicClock};
use flyscan_traits::{BufferedDetector, FrameRangeError, HwResult};

use crate::trigger::SimulatedTriggerModule;

/// Buffers one frame per pulse of the trigger module it listens to.
///
/// Frame contents are synthetic counts: channel `c` of frame `i` reads
/// `1000 + 10 i + c`, which makes off-by-one reads easy to spot.
#[derive(Debug, Clone)]
pub struct SimulatedDetector<C: Clock = MonotonicClock> {
    trigger: SimulatedTriggerModule<C>,
    channels: usize,
}

impl<C: Clock> SimulatedDetector<C> {
    pub fn new(trigger: SimulatedTriggerModule<C>, channels: usize) -> Self {
        Self { trigger, channels }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    #[allow(clippy::cast_precision_loss)]
    fn frame(&self, index: usize) -> Vec<f64> {
        (0..self.channels)
            .map(|c| 1000.0 + 10.0 * index as f64 + c as f64)
            .collect()
    }
}

impl<C: Clock> BufferedDetector for SimulatedDetector<C> {
    fn number_of_frames_available(&mut self) -> HwResult<usize> {
        Ok(self.trigger.pulses() as usize)
    }

    fn read_frames(&mut self, start: usize, end: usize) -> HwResult<Vec<Vec<f64>>> {
        let available = self.trigger.pulses() as usize;
        if start > end || end > available {
            return Err(Box::new(FrameRangeError {
                start,
                end,
                available,
            }));
        }
        Ok((start..end).map(|i| self.frame(i)).collect())
    }
}
