use crate::codec;
use crate::config::TopicsConfig;
use crate::error::Result;
use crate::model::ParsedVoiceCommand;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::{Delivery, Disposition, Outcome, Receipt};
use crate::transport::{LogTransport, LogWriter};
use std::sync::Arc;

/// Terminal station: writes each outcome to its topic, then commits the offset.
///
/// The commit happens only after the write is flushed, so a crash between the
/// two replays the record instead of losing it.
pub struct DeliveryStation {
    transport: Arc<dyn LogTransport>,
    writer: Arc<dyn LogWriter>,
    topics: TopicsConfig,
    group: String,
}

impl DeliveryStation {
    pub fn new(transport: Arc<dyn LogTransport>, topics: TopicsConfig, group: &str) -> Self {
        Self {
            writer: transport.writer(),
            transport,
            topics,
            group: group.to_string(),
        }
    }

    fn publish(&self, topic: &str, command: &ParsedVoiceCommand) -> Result<()> {
        let value = codec::encode_parsed(command)?;
        self.writer.send(topic, &command.id, &value)
    }

    fn deliver(&self, delivery: &Delivery) -> Result<()> {
        let record = &delivery.record;

        match &delivery.disposition {
            Disposition::Routed(Outcome::Dropped) => {}
            Disposition::Routed(Outcome::Unrecognized(command)) => {
                self.publish(&self.topics.unrecognized, command)?;
            }
            Disposition::Routed(Outcome::Recognized { command, path }) => {
                tracing::debug!(id = %command.id, ?path, "recognized");
                self.publish(&self.topics.recognized, command)?;
            }
            Disposition::Malformed { reason } => {
                if let Some(ref dead_letter) = self.topics.dead_letter {
                    let key = record.key.as_deref().unwrap_or_default();
                    self.writer.send(dead_letter, key, &record.value)?;
                } else {
                    tracing::warn!(
                        partition = record.partition,
                        offset = record.offset,
                        "skipping malformed record: {}",
                        reason
                    );
                }
            }
        }

        self.writer.flush()?;
        self.transport
            .commit(&self.group, &record.topic, record.partition, record.offset + 1)
    }
}

impl Station for DeliveryStation {
    type Input = Delivery;
    type Output = Receipt;

    fn process(&mut self, delivery: Delivery) -> std::result::Result<Option<Receipt>, StationError> {
        self.deliver(&delivery).map_err(|e| {
            StationError::Fatal(format!(
                "{}/{}@{}: {}",
                delivery.record.topic, delivery.record.partition, delivery.record.offset, e
            ))
        })?;

        Ok(Some(Receipt {
            partition: delivery.record.partition,
            offset: delivery.record.offset,
            route: delivery.route(),
        }))
    }

    fn name(&self) -> &'static str {
        "delivery"
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::error!("failed to flush output on shutdown: {}", e);
        }
    }
}
