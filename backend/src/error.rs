//! Error types for the election results ingestion pipeline.
//!
//! Every pipeline stage returns an explicit `Result`; this module defines the
//! error hierarchy they share:
//!
//! - [`ParseError`] - Blob identifier and row parser errors
//! - [`DecodeError`] - Byte stream decoding errors
//! - [`AggregationError`] - Parser dispatch and merge errors
//! - [`EnrichmentError`] - Candidate roster errors
//! - [`PersistenceError`] - Results repository errors
//! - [`PipelineError`] - Top-level `process_stream` errors
//!
//! Lower-level errors convert into [`PipelineError`] only through the variant
//! naming the stage that failed, so a caller always knows where a run stopped.

use thiserror::Error;

// =============================================================================
// Parse Errors (identifier + row parsers)
// =============================================================================

/// Errors raised by the filename descriptor and by row parsers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    /// The blob identifier does not match `<type>_<location>_<sequence>`.
    #[error("Malformed blob identifier '{identifier}': {reason}")]
    MalformedIdentifier { identifier: String, reason: String },

    /// The parser does not recognise this content. Not a failure.
    #[error("Content not recognised by this parser")]
    NotApplicable,

    /// The parser recognised the table but a row is invalid.
    #[error("Line {line}, column '{column}': {message}")]
    InvalidRow {
        line: usize,
        column: String,
        message: String,
    },

    /// The CSV could not be read at all.
    #[error("Invalid CSV: {0}")]
    InvalidCsv(String),
}

impl ParseError {
    /// Whether this is the "not my format" outcome rather than a hard failure.
    pub fn is_not_applicable(&self) -> bool {
        matches!(self, ParseError::NotApplicable)
    }
}

// =============================================================================
// Decode Errors
// =============================================================================

/// Errors while turning the input stream into text.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Reading the stream failed.
    #[error("Failed to read stream: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes are not text in any supported encoding.
    #[error("Unsupported or invalid encoding: {0}")]
    InvalidEncoding(String),
}

// =============================================================================
// Aggregation Errors
// =============================================================================

/// Errors from the data aggregator.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// The aggregator was configured without parsers.
    #[error("At least one CSV parser must be registered")]
    NoParsersRegistered,

    /// Every registered parser reported the content as not applicable.
    #[error("No registered parser recognised the content")]
    NoMatchingParser,

    /// Two parsers produced the same section.
    #[error("Section '{section}' produced by both '{first}' and '{second}'")]
    ConflictingSections {
        section: String,
        first: String,
        second: String,
    },

    /// A parser recognised the content but failed on it.
    #[error("Parser '{parser}' failed: {source}")]
    ParserFailed {
        parser: String,
        #[source]
        source: ParseError,
    },
}

// =============================================================================
// Enrichment Errors
// =============================================================================

/// Errors while fetching the candidate roster.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// The configuration source could not deliver the roster.
    #[error("Configuration source unavailable: {0}")]
    SourceUnavailable(String),

    /// The roster fetch did not complete in time.
    #[error("Candidate roster request timed out")]
    Timeout,

    /// The roster fetch was cancelled by the caller.
    #[error("Candidate roster request cancelled")]
    Cancelled,
}

// =============================================================================
// Persistence Errors
// =============================================================================

/// Errors from the results repository.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The repository rejected or failed the insert.
    #[error("Insert failed: {0}")]
    InsertFailed(String),

    /// Record lookup failed.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// IO error.
    #[error("Repository IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Repository JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The insert did not complete in time.
    #[error("Insert timed out")]
    Timeout,
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level error returned by [`crate::processor::BlobProcessor::process_stream`].
///
/// Each variant names the first stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The stream could not be decoded to text.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Aggregation failed.
    #[error("Aggregation failed: {0}")]
    AggregationFailed(#[source] AggregationError),

    /// Enrichment failed.
    #[error("Enrichment failed: {0}")]
    EnrichmentFailed(#[source] EnrichmentError),

    /// The finalized record could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The serialized record does not match the results schema.
    #[error("Invalid results record: {errors:?}")]
    InvalidRecord { errors: Vec<String> },

    /// The repository insert failed.
    #[error("Persistence failed: {0}")]
    PersistenceFailed(#[source] PersistenceError),

    /// The caller cancelled processing before the insert.
    #[error("Processing cancelled")]
    Cancelled,
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors while loading [`crate::config::AppConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable holds a value of the wrong shape.
    #[error("{name} is invalid: {message}")]
    InvalidValue { name: &'static str, message: String },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server IO error.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for identifier and row parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for aggregation.
pub type AggregationResult<T> = Result<T, AggregationError>;

/// Result type for enrichment.
pub type EnrichmentResult<T> = Result<T, EnrichmentError>;

/// Result type for repository operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
