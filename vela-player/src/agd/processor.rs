//! Aggregated derivative processor
//!
//! Consumes `Reading` events from the configured input, publishes an
//! `AgdOutput` per reading and an edge-triggered `PlayLevelChange`, and
//! serves threshold queries and updates.

use super::aggregator::SignalAggregator;
use super::selector::{select_level, LevelSelector};
use super::thresholds::SharedThresholds;
use crate::error::Result;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use vela_common::events::{EventBus, VelaEvent};

/// Result of processing one reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub raw: f64,
    pub agd: f64,
    /// Level selected for this reading
    pub level: usize,
    /// Set only when `level` differs from the previously reported level
    pub level_change: Option<usize>,
}

/// AGD pipeline bound to one input source
pub struct AgdProcessor {
    source: String,
    aggregator: SignalAggregator,
    thresholds: SharedThresholds,
    selector: LevelSelector,
    bus: EventBus,
}

impl AgdProcessor {
    /// # Errors
    ///
    /// Returns `Error::Config` if `buffer_size` is zero.
    pub fn new(
        source: impl Into<String>,
        buffer_size: usize,
        thresholds: SharedThresholds,
        bus: EventBus,
    ) -> Result<Self> {
        Ok(Self {
            source: source.into(),
            aggregator: SignalAggregator::new(buffer_size)?,
            thresholds,
            selector: LevelSelector::new(),
            bus,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn thresholds(&self) -> &SharedThresholds {
        &self.thresholds
    }

    /// Run `reading` through buffer, aggregation, selection and edge detection
    ///
    /// Publishes nothing; see [`AgdProcessor::process_reading`].
    pub fn observe(&mut self, reading: f64) -> Observation {
        let agd = self.aggregator.observe(reading);
        let level = self.thresholds.with_table(|table| select_level(agd, table));
        let level_change = self.selector.update(level);

        Observation {
            raw: reading,
            agd,
            level,
            level_change,
        }
    }

    /// Observe `reading` and publish its outputs
    pub fn process_reading(&mut self, reading: f64) -> Observation {
        let observation = self.observe(reading);

        info!(reading, agd = observation.agd, "reading processed");
        debug!("readings={:?}", self.aggregator.readings());

        self.bus.emit_lossy(VelaEvent::AgdOutput {
            source: self.source.clone(),
            raw: observation.raw,
            agd: observation.agd,
            timestamp: chrono::Utc::now(),
        });

        if let Some(level) = observation.level_change {
            let comment = format!("agd-{} == {:?}", self.source, observation.agd);
            info!(level, %comment, "play level change");
            self.bus.emit_lossy(VelaEvent::PlayLevelChange { level, comment });
        }

        observation
    }

    /// Publish one `AgdThreshold` per level, in level order
    pub fn notify_thresholds(&self) {
        for (level, value) in self.thresholds.get_all() {
            self.bus.emit_lossy(VelaEvent::AgdThreshold { level, value });
        }
    }

    /// Overwrite one threshold and echo it
    ///
    /// Invalid levels are logged and produce no notification.
    pub fn set_threshold(&self, level: usize, value: f64) -> Result<()> {
        match self.thresholds.set(level, value) {
            Ok(()) => {
                info!(level, value, "threshold set");
                self.bus.emit_lossy(VelaEvent::AgdThreshold { level, value });
                Ok(())
            }
            Err(e) => {
                warn!(level, "invalid threshold level: {}", e);
                Err(e)
            }
        }
    }

    /// Dispatch one bus event; events for other components are ignored
    pub fn handle_event(&mut self, event: VelaEvent) {
        match event {
            VelaEvent::Reading { source, value } if source == self.source => {
                self.process_reading(value);
            }
            VelaEvent::RequestThresholds => self.notify_thresholds(),
            VelaEvent::SetThreshold { level, value } => {
                // Already logged
                let _ = self.set_threshold(level, value);
            }
            _ => {}
        }
    }

    /// Consume bus events until the bus closes
    ///
    /// Lagging behind the bus drops events; that is logged and processing
    /// continues with the next available event.
    pub async fn run(mut self, mut rx: broadcast::Receiver<VelaEvent>) {
        info!(source = %self.source, "AGD processor started");
        loop {
            match rx.recv().await {
                Ok(event) => self.handle_event(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("AGD processor lagged, {} events dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("AGD processor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agd::ThresholdTable;

    fn processor(buffer_size: usize, thresholds: Vec<f64>) -> (AgdProcessor, EventBus) {
        let bus = EventBus::new(100);
        let shared = SharedThresholds::new(ThresholdTable::new(thresholds));
        let processor = AgdProcessor::new("network", buffer_size, shared, bus.clone()).unwrap();
        (processor, bus)
    }

    fn drain(rx: &mut broadcast::Receiver<VelaEvent>) -> Vec<VelaEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_observe_selects_level() {
        let (mut processor, _bus) = processor(4, vec![1.0, 2.5, 10.0]);
        let observations: Vec<Observation> = [1.0, 3.0, 2.0, 5.0]
            .into_iter()
            .map(|r| processor.observe(r))
            .collect();

        assert_eq!(
            observations.iter().map(|o| o.agd).collect::<Vec<_>>(),
            vec![0.0, 2.0, 0.0, 3.0]
        );
        assert_eq!(
            observations.iter().map(|o| o.level).collect::<Vec<_>>(),
            vec![0, 1, 0, 2]
        );
        assert_eq!(
            observations.iter().map(|o| o.level_change).collect::<Vec<_>>(),
            vec![None, Some(1), Some(0), Some(2)]
        );
    }

    #[test]
    fn test_process_reading_publishes_output_and_edge() {
        let (mut processor, bus) = processor(10, vec![5.0, 10.0, 20.0]);
        let mut rx = bus.subscribe();

        for r in [0.0, 6.0, 7.0, 7.0] {
            processor.process_reading(r);
        }

        let events = drain(&mut rx);
        let outputs = events
            .iter()
            .filter(|e| matches!(e, VelaEvent::AgdOutput { .. }))
            .count();
        assert_eq!(outputs, 4, "one AgdOutput per reading");

        let changes: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                VelaEvent::PlayLevelChange { level, comment } => Some((*level, comment.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(changes, vec![(1, "agd-network == 6.0".to_string())]);
    }

    #[test]
    fn test_readings_from_other_sources_ignored() {
        let (mut processor, bus) = processor(4, vec![1.0]);
        let mut rx = bus.subscribe();

        processor.handle_event(VelaEvent::Reading {
            source: "web".to_string(),
            value: 1.0,
        });
        assert!(drain(&mut rx).is_empty());

        processor.handle_event(VelaEvent::Reading {
            source: "network".to_string(),
            value: 1.0,
        });
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_request_thresholds_emits_one_per_level() {
        let (mut processor, bus) = processor(4, vec![5.0, 10.0, 20.0]);
        let mut rx = bus.subscribe();

        processor.handle_event(VelaEvent::RequestThresholds);

        assert_eq!(
            drain(&mut rx),
            vec![
                VelaEvent::AgdThreshold { level: 1, value: 5.0 },
                VelaEvent::AgdThreshold { level: 2, value: 10.0 },
                VelaEvent::AgdThreshold { level: 3, value: 20.0 },
            ]
        );
    }

    #[test]
    fn test_set_threshold_echoes_only_on_success() {
        let (mut processor, bus) = processor(4, vec![5.0, 10.0]);
        let mut rx = bus.subscribe();

        processor.handle_event(VelaEvent::SetThreshold { level: 3, value: 1.0 });
        processor.handle_event(VelaEvent::SetThreshold { level: 0, value: 1.0 });
        assert!(drain(&mut rx).is_empty());
        assert_eq!(processor.thresholds().get_all(), vec![(1, 5.0), (2, 10.0)]);

        processor.handle_event(VelaEvent::SetThreshold { level: 2, value: 3.0 });
        assert_eq!(drain(&mut rx), vec![VelaEvent::AgdThreshold { level: 2, value: 3.0 }]);
        assert_eq!(processor.thresholds().get_all(), vec![(1, 5.0), (2, 3.0)]);
    }

    #[test]
    fn test_lowered_threshold_applies_to_next_reading() {
        let (mut processor, _bus) = processor(4, vec![5.0]);
        assert_eq!(processor.observe(0.0).level, 0);
        assert_eq!(processor.observe(2.0).level, 0);

        processor.set_threshold(1, 2.0).unwrap();
        let observation = processor.observe(2.0);
        assert_eq!(observation.agd, 2.0);
        assert_eq!(observation.level_change, Some(1));
    }
}
