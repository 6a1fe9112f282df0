//! Fixed-capacity reading buffer
//!
//! Keeps the last `capacity` readings in arrival order. Pushing into a full
//! buffer evicts the oldest reading.

use crate::error::{Error, Result};
use ringbuf::{traits::*, HeapRb};
use std::fmt;

/// Ring buffer of sensor readings
pub struct ReadingBuffer {
    buffer: HeapRb<f64>,
}

impl ReadingBuffer {
    /// Create an empty buffer holding at most `capacity` readings
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Config("Reading buffer capacity must be non-zero".to_string()));
        }
        Ok(Self {
            buffer: HeapRb::new(capacity),
        })
    }

    /// Append a reading, returning the evicted one when the buffer was full
    pub fn push(&mut self, reading: f64) -> Option<f64> {
        self.buffer.push_overwrite(reading)
    }

    /// Readings from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.buffer.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.buffer.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity().get()
    }
}

impl fmt::Debug for ReadingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
