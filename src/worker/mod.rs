pub mod runner;

pub use runner::{CycleReport, Orchestrator, WorkerError};
