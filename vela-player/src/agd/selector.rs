//! Play level selection
//!
//! Levels qualify independently (`value >= threshold`); the scan keeps the
//! last qualifying level, so with a non-monotonic table a higher level wins
//! over a lower one whose threshold is larger.

use super::thresholds::ThresholdTable;

/// Highest-indexed level whose threshold `value` meets, or 0 if none
///
/// ```
/// use vela_player::agd::{select_level, ThresholdTable};
///
/// let thresholds = ThresholdTable::new(vec![5.0, 10.0, 20.0]);
/// assert_eq!(select_level(12.0, &thresholds), 2);
/// assert_eq!(select_level(1.0, &thresholds), 0);
/// ```
pub fn select_level(value: f64, thresholds: &ThresholdTable) -> usize {
    let mut selected = 0;
    for (level, threshold) in thresholds.iter() {
        if value >= threshold {
            selected = level;
        }
    }
    selected
}

/// Edge detector over selected levels
///
/// Remembers the last level it reported; starts at 0 (idle).
#[derive(Debug, Default)]
pub struct LevelSelector {
    last_level: usize,
}

impl LevelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(level)` only when `level` differs from the last one reported
    pub fn update(&mut self, level: usize) -> Option<usize> {
        if level == self.last_level {
            return None;
        }
        self.last_level = level;
        Some(level)
    }

    pub fn last_level(&self) -> usize {
        self.last_level
    }
}
