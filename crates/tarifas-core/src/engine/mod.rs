pub mod ingest;

pub use ingest::{IngestOptions, Ingestor};
