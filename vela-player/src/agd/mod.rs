//! Aggregated derivative (AGD) signal pipeline
//!
//! Readings from one input are kept in a fixed-capacity buffer, reduced to an
//! aggregated derivative, and compared against the threshold table to select
//! a play level:
//!
//! reading → [`ReadingBuffer`] → [`aggregated_derivative`] → [`select_level`]
//! (against [`ThresholdTable`]) → [`LevelSelector`] edge detection.
//!
//! [`AgdProcessor`] wires the pipeline to the EventBus.

pub mod aggregator;
pub mod processor;
pub mod ring_buffer;
pub mod selector;
pub mod thresholds;

pub use aggregator::{aggregated_derivative, SignalAggregator};
pub use processor::{AgdProcessor, Observation};
pub use ring_buffer::ReadingBuffer;
pub use selector::{select_level, LevelSelector};
pub use thresholds::{SharedThresholds, ThresholdTable};
