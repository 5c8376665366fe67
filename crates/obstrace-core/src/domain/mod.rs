//! Domain entities for the observability pipeline.

pub mod alert;
pub mod baseline;
pub mod decision;
pub mod drift;
pub mod profile;
pub mod run;
pub mod signal;

pub use alert::{AlertChannel, AlertLog, DeliveryStatus};
pub use baseline::{BaselineType, BehaviorBaseline};
pub use decision::{Decision, DecisionType};
pub use drift::{BehaviorDrift, DriftType, Severity, TestMethod};
pub use profile::{BehaviorProfile, DecisionDistributions, LatencyStats, SignalDistributions};
pub use run::{Environment, Failure, FailureType, Metadata, MetadataValue, Run, RunStatus, Step, StepType};
pub use signal::{QualitySignal, SignalType};
