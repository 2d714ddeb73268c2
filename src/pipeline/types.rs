//! Values passed between the stages and stations of a partition worker.

use crate::model::ParsedVoiceCommand;
use crate::transport::LogRecord;

/// Which confident branch a recognized command took before the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguagePath {
    /// Recognized text was already in the target language.
    AlreadyTarget,
    /// Recognized text went through the translation stage.
    Translated,
}

/// Terminal state of one inbound command after the topology.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Filtered before recognition. Nothing is written.
    Dropped,
    /// Confidence at or below the threshold.
    Unrecognized(ParsedVoiceCommand),
    /// Confident, after the language branches merged.
    Recognized {
        command: ParsedVoiceCommand,
        path: LanguagePath,
    },
}

impl Outcome {
    /// The record to write, if any.
    pub fn command(&self) -> Option<&ParsedVoiceCommand> {
        match self {
            Outcome::Dropped => None,
            Outcome::Unrecognized(command) | Outcome::Recognized { command, .. } => Some(command),
        }
    }

    pub fn route(&self) -> Route {
        match self {
            Outcome::Dropped => Route::Dropped,
            Outcome::Unrecognized(_) => Route::Unrecognized,
            Outcome::Recognized { path, .. } => Route::Recognized(*path),
        }
    }
}

/// What the topology made of one log record.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Routed(Outcome),
    /// The value could not be decoded into a command.
    Malformed { reason: String },
}

/// A processed record waiting to be written and committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub record: LogRecord,
    pub disposition: Disposition,
}

impl Delivery {
    pub fn routed(record: LogRecord, outcome: Outcome) -> Self {
        Self {
            record,
            disposition: Disposition::Routed(outcome),
        }
    }

    pub fn malformed(record: LogRecord, reason: impl Into<String>) -> Self {
        Self {
            record,
            disposition: Disposition::Malformed {
                reason: reason.into(),
            },
        }
    }

    pub fn route(&self) -> Route {
        match &self.disposition {
            Disposition::Routed(outcome) => outcome.route(),
            Disposition::Malformed { .. } => Route::Malformed,
        }
    }
}

/// Where a committed record went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Dropped,
    Unrecognized,
    Recognized(LanguagePath),
    Malformed,
}

/// Emitted once a record's output is written and its offset committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub partition: u32,
    pub offset: u64,
    pub route: Route,
}

/// Per-partition tally of committed records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionStats {
    pub dropped: u64,
    pub unrecognized: u64,
    /// Includes `translated`.
    pub recognized: u64,
    pub translated: u64,
    pub malformed: u64,
    /// Highest committed offset, if anything was committed this run.
    pub last_offset: Option<u64>,
}

impl PartitionStats {
    pub fn record(&mut self, receipt: &Receipt) {
        match receipt.route {
            Route::Dropped => self.dropped += 1,
            Route::Unrecognized => self.unrecognized += 1,
            Route::Recognized(path) => {
                self.recognized += 1;
                if path == LanguagePath::Translated {
                    self.translated += 1;
                }
            }
            Route::Malformed => self.malformed += 1,
        }
        self.last_offset = Some(receipt.offset);
    }

    /// Records committed this run.
    pub fn committed(&self) -> u64 {
        self.dropped + self.unrecognized + self.recognized + self.malformed
    }
}
