pub(crate) mod processor;
pub(crate) mod store;

pub use processor::{BatchOutcome, DocumentProcessor};
pub use store::{DocumentStore, DocumentSummary, HealthStatus, StoreStats};
