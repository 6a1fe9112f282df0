//! Aggregated derivative computation
//!
//! Walks consecutive reading pairs keeping a running total: non-negative
//! deltas add to it, any negative delta resets it to zero. The result grows
//! under a sustained non-decreasing run and snaps to zero as soon as the trend
//! reverses.

use super::ring_buffer::ReadingBuffer;
use crate::error::Result;

/// Aggregated derivative over `readings`, oldest first
///
/// Returns 0.0 for fewer than two readings.
///
/// ```
/// use vela_player::agd::aggregated_derivative;
///
/// // (1,3) +2 → 2, (3,2) reset → 0, (2,5) +3 → 3
/// assert_eq!(aggregated_derivative([1.0, 3.0, 2.0, 5.0]), 3.0);
/// ```
pub fn aggregated_derivative<I>(readings: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut readings = readings.into_iter();
    let Some(mut previous) = readings.next() else {
        return 0.0;
    };

    let mut total = 0.0;
    for reading in readings {
        let delta = reading - previous;
        if delta >= 0.0 {
            total += delta;
        } else {
            total = 0.0;
        }
        previous = reading;
    }
    total
}

/// Reading buffer plus aggregation
///
/// Recomputes the aggregate from the whole buffer on every reading; the
/// buffer is the only state.
#[derive(Debug)]
pub struct SignalAggregator {
    readings: ReadingBuffer,
}

impl SignalAggregator {
    pub fn new(buffer_size: usize) -> Result<Self> {
        Ok(Self {
            readings: ReadingBuffer::new(buffer_size)?,
        })
    }

    /// Record `reading` and return the aggregated derivative of the buffer
    pub fn observe(&mut self, reading: f64) -> f64 {
        self.readings.push(reading);
        aggregated_derivative(self.readings.iter())
    }

    pub fn readings(&self) -> &ReadingBuffer {
        &self.readings
    }
}
