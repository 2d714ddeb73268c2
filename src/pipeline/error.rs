//! Error classification and reporting for pipeline stations.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Errors that can occur while a station processes one item.
#[derive(Debug, Clone, PartialEq)]
pub enum StationError {
    /// The item is dealt with and the station keeps going.
    Recoverable(String),
    /// The station stops. Nothing after the failing item is processed.
    Fatal(String),
}

impl StationError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StationError::Fatal(_))
    }
}

impl fmt::Display for StationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            StationError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for StationError {}

/// Trait for reporting station errors.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from a station.
    fn report(&self, station: &str, error: &StationError);
}

/// Reporter that emits station errors as tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, station: &str, error: &StationError) {
        match error {
            StationError::Recoverable(msg) => tracing::warn!(station, "{}", msg),
            StationError::Fatal(msg) => tracing::error!(station, "{}", msg),
        }
    }
}

/// A fatal failure captured by [`FailureLatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationFailure {
    pub station: String,
    pub message: String,
}

/// Forwards every report to an inner reporter and remembers the fatal ones.
pub struct FailureLatch {
    inner: Arc<dyn ErrorReporter>,
    failures: Mutex<Vec<StationFailure>>,
}

impl FailureLatch {
    pub fn new(inner: Arc<dyn ErrorReporter>) -> Self {
        Self {
            inner,
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Fatal failures reported so far, in report order.
    pub fn failures(&self) -> Vec<StationFailure> {
        match self.failures.lock() {
            Ok(failures) => failures.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ErrorReporter for FailureLatch {
    fn report(&self, station: &str, error: &StationError) {
        if let StationError::Fatal(msg) = error {
            let failure = StationFailure {
                station: station.to_string(),
                message: msg.clone(),
            };
            match self.failures.lock() {
                Ok(mut failures) => failures.push(failure),
                Err(poisoned) => poisoned.into_inner().push(failure),
            }
        }
        self.inner.report(station, error);
    }
}
