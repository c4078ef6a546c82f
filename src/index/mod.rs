pub mod bucket;
pub mod client;
pub mod dry_run;
pub mod lifecycle;
pub mod memory;

pub use client::{ClientError, Connector, ElasticClient, ElasticConnector, SearchClient};
pub use dry_run::{DryRunClient, DryRunConnector};
pub use lifecycle::{DeleteOutcome, EnsureOutcome, IndexLifecycle, LifecycleError};
pub use memory::{MemoryClient, MemoryConnector};
