//! Station abstraction and the thread runner that drives it.

use crate::pipeline::error::{ErrorReporter, StationError};
use crossbeam_channel::{Receiver, Sender};
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A processing station of a partition worker.
///
/// Stations run in their own threads and are connected by bounded channels,
/// so items leave a station in the order they arrived.
pub trait Station: Send + 'static {
    /// The input type this station receives.
    type Input: Send + 'static;
    /// The output type this station produces.
    type Output: Send + 'static;

    /// Processes a single input item.
    ///
    /// Returns:
    /// - `Ok(Some(output))` - Processed and produced output
    /// - `Ok(None)` - Processed, nothing to pass on
    /// - `Err(StationError)` - Processing failed
    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError>;

    /// Returns the name of this station for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Called once when the station stops, on every exit path.
    fn shutdown(&mut self) {}
}

/// Runs a station in a dedicated thread.
pub struct StationRunner<S: Station> {
    handle: Option<JoinHandle<()>>,
    station_name: &'static str,
    _phantom: PhantomData<S>,
}

impl<S: Station> StationRunner<S> {
    /// Spawns `station` in a dedicated thread.
    ///
    /// The station stops when `input_rx` is closed and drained, when
    /// `output_tx` is closed, or after reporting a fatal error. Dropping
    /// `output_tx` on exit is what stops the next station in line.
    pub fn spawn(
        station: S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self::spawn_named(station, None, input_rx, output_tx, error_reporter)
    }

    /// Like [`spawn`](Self::spawn) but names the OS thread, e.g. `topology-2`.
    pub fn spawn_named(
        mut station: S,
        thread_name: Option<String>,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let station_name = station.name();
        let body = move || {
            Self::run_station(&mut station, input_rx, output_tx, error_reporter);
        };

        let handle = match thread_name {
            Some(name) => thread::Builder::new().name(name).spawn(body),
            None => Ok(thread::spawn(body)),
        };

        match handle {
            Ok(handle) => Self {
                handle: Some(handle),
                station_name,
                _phantom: PhantomData,
            },
            Err(e) => {
                tracing::error!(station = station_name, "failed to spawn station thread: {}", e);
                Self {
                    handle: None,
                    station_name,
                    _phantom: PhantomData,
                }
            }
        }
    }

    fn run_station(
        station: &mut S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) {
        let station_name = station.name();

        while let Ok(input) = input_rx.recv() {
            match station.process(input) {
                Ok(Some(output)) => {
                    if output_tx.send(output).is_err() {
                        tracing::debug!(station = station_name, "downstream closed");
                        break;
                    }
                }
                Ok(None) => {}
                Err(error @ StationError::Recoverable(_)) => {
                    error_reporter.report(station_name, &error);
                }
                Err(error @ StationError::Fatal(_)) => {
                    error_reporter.report(station_name, &error);
                    break;
                }
            }
        }

        station.shutdown();
    }

    /// Waits for the station thread to complete.
    pub fn join(mut self) -> Result<(), String> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| format!("Station '{}' thread panicked", self.station_name)),
            None => Err(format!("Station '{}' never started", self.station_name)),
        }
    }

    /// Returns the name of the station.
    pub fn name(&self) -> &'static str {
        self.station_name
    }
}
