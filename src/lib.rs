pub mod config;
pub mod ingest;
pub mod output;
pub mod pipeline;
