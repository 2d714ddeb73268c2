//! Voice command routing pipeline.
//!
//! The topology is a set of pure stages. The runtime wraps it in stations,
//! one chain of threads per input partition, connected by bounded crossbeam
//! channels for backpressure.

pub mod delivery_station;
pub mod error;
pub mod gates;
pub mod orchestrator;
pub mod stages;
pub mod station;
pub mod topology;
pub mod topology_station;
pub mod types;

pub use delivery_station::DeliveryStation;
pub use error::{ErrorReporter, FailureLatch, LogReporter, StationError, StationFailure};
pub use gates::{Confidence, ConfidenceGate, Language, LanguageGate};
pub use orchestrator::{Pipeline, PipelineConfig, PipelineHandle, PipelineReport};
pub use stages::{LengthFilter, RecognitionStage, TranslationStage};
pub use station::{Station, StationRunner};
pub use topology::{Topology, merge};
pub use topology_station::TopologyStation;
pub use types::{Delivery, Disposition, LanguagePath, Outcome, PartitionStats, Receipt, Route};
