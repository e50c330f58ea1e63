//! # Election results ingestion
//!
//! Turns raw election-results CSV blobs into a single validated results
//! record per blob and hands it to a results repository.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV blob   │────▶│   Decode    │────▶│  Aggregate  │────▶│   Enrich    │────▶│   Insert    │
//! │  (stream)   │     │ (auto-enc)  │     │ (N parsers) │     │  (roster)   │     │ (at most 1) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!        │
//!        └── file name ──▶ descriptor ──▶ results_type / location / sequence
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use election_results::AppConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::load().unwrap();
//!     let processor = config.blob_processor();
//!     let file = tokio::fs::File::open("president_cluj_4.csv").await.unwrap();
//!     let record = processor.process_stream(file, "president_cluj_4.csv").await.unwrap();
//!     println!("Stored {}", record.id);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per stage
//! - [`models`] - Results record, tallies and candidates
//! - [`descriptor`] - Blob identifier parsing
//! - [`parser`] - Decoding and tabular CSV access
//! - [`aggregate`] - Parser strategies and the aggregator
//! - [`enrich`] - Candidate roster sources and merge
//! - [`processor`] - Pipeline controller
//! - [`storage`] - Results repositories
//! - [`validation`] - Record schema validation
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Input
pub mod descriptor;
pub mod parser;

// Pipeline stages
pub mod aggregate;
pub mod enrich;
pub mod processor;

// Output
pub mod storage;
pub mod validation;

pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{
    AggregationError, ConfigError, DecodeError, EnrichmentError, ParseError, PersistenceError,
    PipelineError, PipelineResult, ServerError,
};

pub use models::{
    Candidate, ElectionResultsData, ElectionStatistics, ResultsFragment, RoutingInfo,
    SectionTally,
};

pub use descriptor::{parse_file_name, parse_or_unknown};

pub use parser::{decode_bytes, decode_content, detect_delimiter, detect_encoding, CsvTable};

pub use aggregate::{
    default_parsers, CsvParser, DataAggregator, Evaluation, FailurePolicy, ParserOutcome,
    ResultsAggregator,
};

pub use enrich::{
    merge_candidates, CandidateEnricher, ElectionConfigurationSource, FileConfigurationSource,
    HttpConfigurationSource, StaticConfigurationSource,
};

pub use processor::{read_csv_as_string, BlobProcessor, ProcessContext};

pub use storage::{FileResultsRepository, InMemoryResultsRepository, ResultsRepository};

pub use validation::{is_valid_results_record, validate_results_record};

pub use config::{AppConfig, RosterSource};

pub use api::types::{error_response, ProcessResponse, RecordResponse};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
