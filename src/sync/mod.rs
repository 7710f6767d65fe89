//! Retrieval cycle orchestration and scheduling

pub mod orchestrator;
pub mod scheduler;

pub use orchestrator::{Clock, CycleSummary, SourceOutcome, Stage, SyncOrchestrator};
pub use scheduler::{ConfigFileReloader, ConfigReloader, CrlScheduler, CycleConfig};
