//! Per-level threshold table
//!
//! One threshold per foreground level, 1-indexed. The number of levels is
//! fixed at construction; values may be overwritten at any time and carry no
//! ordering constraint.

use crate::error::{Error, Result};
use std::sync::{Arc, PoisonError, RwLock};

/// Ordered thresholds for levels 1..=N
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    values: Vec<f64>,
}

impl ThresholdTable {
    /// `values[0]` is the level 1 threshold
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Number of levels (N)
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All `(level, threshold)` pairs in level order
    pub fn get_all(&self) -> Vec<(usize, f64)> {
        self.iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values.iter().enumerate().map(|(i, v)| (i + 1, *v))
    }

    pub fn get(&self, level: usize) -> Option<f64> {
        level.checked_sub(1).and_then(|i| self.values.get(i)).copied()
    }

    /// Overwrite the threshold for `level`
    ///
    /// # Errors
    ///
    /// `Error::InvalidLevel` if `level` is outside 1..=N; the table is left
    /// unchanged.
    pub fn set(&mut self, level: usize, value: f64) -> Result<()> {
        let max = self.values.len();
        match level.checked_sub(1).and_then(|i| self.values.get_mut(i)) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::InvalidLevel { level, max }),
        }
    }
}

/// Threshold table shared between the processor and control surfaces
///
/// Each `set` is a single overwrite under the write lock.
#[derive(Debug, Clone)]
pub struct SharedThresholds {
    inner: Arc<RwLock<ThresholdTable>>,
}

impl SharedThresholds {
    pub fn new(table: ThresholdTable) -> Self {
        Self {
            inner: Arc::new(RwLock::new(table)),
        }
    }

    pub fn get_all(&self) -> Vec<(usize, f64)> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).get_all()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set(&self, level: usize, value: f64) -> Result<()> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set(level, value)
    }

    /// Run `f` against a consistent snapshot of the table
    pub fn with_table<R>(&self, f: impl FnOnce(&ThresholdTable) -> R) -> R {
        f(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }
}
