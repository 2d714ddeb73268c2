use crate::codec;
use crate::pipeline::error::{ErrorReporter, StationError};
use crate::pipeline::station::Station;
use crate::pipeline::topology::Topology;
use crate::pipeline::types::Delivery;
use crate::transport::LogRecord;
use std::sync::Arc;

/// Decodes log records and runs them through the topology.
///
/// Malformed records are reported and passed on so their offset still gets
/// committed. A capability failure is fatal for the partition.
pub struct TopologyStation {
    topology: Arc<Topology>,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl TopologyStation {
    pub fn new(topology: Arc<Topology>, error_reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            topology,
            error_reporter,
        }
    }
}

impl Station for TopologyStation {
    type Input = LogRecord;
    type Output = Delivery;

    fn process(&mut self, record: LogRecord) -> Result<Option<Delivery>, StationError> {
        let command = match codec::decode_command(record.key.as_deref(), &record.value) {
            Ok(command) => command,
            Err(e) => {
                self.error_reporter.report(
                    self.name(),
                    &StationError::Recoverable(format!(
                        "{}/{}@{}: {}",
                        record.topic, record.partition, record.offset, e
                    )),
                );
                let reason = e.to_string();
                return Ok(Some(Delivery::malformed(record, reason)));
            }
        };

        match self.topology.process(&command) {
            Ok(outcome) => Ok(Some(Delivery::routed(record, outcome))),
            Err(e) => Err(StationError::Fatal(format!(
                "{}/{}@{}: {}",
                record.topic, record.partition, record.offset, e
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "topology"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_command;
    use crate::config::TopologyConfig;
    use crate::model::VoiceCommand;
    use crate::pipeline::types::{Disposition, Outcome, Route};
    use crate::stt::{MockRecognition, MockRecognizer};
    use crate::translate::MockTranslator;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockReporter {
        errors: Mutex<Vec<StationError>>,
    }

    impl ErrorReporter for MockReporter {
        fn report(&self, _station: &str, error: &StationError) {
            self.errors.lock().unwrap().push(error.clone());
        }
    }

    fn station(recognizer: MockRecognizer) -> (TopologyStation, Arc<MockReporter>) {
        let reporter = Arc::new(MockReporter::default());
        let topology = Topology::new(
            &TopologyConfig::default(),
            Arc::new(recognizer),
            Arc::new(MockTranslator::new("en")),
        );
        (
            TopologyStation::new(Arc::new(topology), reporter.clone()),
            reporter,
        )
    }

    fn record(key: Option<&str>, value: Vec<u8>) -> LogRecord {
        LogRecord {
            topic: "voice-commands".to_string(),
            partition: 2,
            offset: 5,
            key: key.map(str::to_string),
            value,
        }
    }

    fn encoded(id: &str) -> Vec<u8> {
        encode_command(&VoiceCommand::new(id, vec![0; 20], "FLAC", "en-US")).unwrap()
    }

    #[test]
    fn test_routes_decoded_record() {
        let (mut station, reporter) = station(
            MockRecognizer::new().with_script("X", MockRecognition::new("call John", 0.98)),
        );

        let delivery = station.process(record(Some("X"), encoded("X"))).unwrap().unwrap();
        assert_eq!(delivery.record.offset, 5);
        match delivery.disposition {
            Disposition::Routed(Outcome::Recognized { command, .. }) => {
                assert_eq!(command.text, "call John")
            }
            other => panic!("Expected recognized, got {:?}", other),
        }
        assert!(reporter.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_record_is_reported_and_passed_on() {
        let (mut station, reporter) = station(MockRecognizer::new());

        let delivery = station
            .process(record(Some("X"), b"not json".to_vec()))
            .unwrap()
            .unwrap();
        assert_eq!(delivery.route(), Route::Malformed);
        assert_eq!(delivery.record.value, b"not json");

        let errors = reporter.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(!errors[0].is_fatal());
        assert!(errors[0].to_string().contains("voice-commands/2@5"));
    }

    #[test]
    fn test_key_mismatch_is_malformed() {
        let (mut station, _) = station(MockRecognizer::new());
        let delivery = station.process(record(Some("other"), encoded("X"))).unwrap().unwrap();
        assert_eq!(delivery.route(), Route::Malformed);
    }

    #[test]
    fn test_capability_failure_is_fatal() {
        let (mut station, _) = station(MockRecognizer::new().with_failure());
        match station.process(record(Some("X"), encoded("X"))) {
            Err(StationError::Fatal(msg)) => assert!(msg.contains("Speech recognition failed")),
            other => panic!("Expected fatal error, got {:?}", other),
        }
    }
}
