//! Aggregation module.
//!
//! Turns decoded CSV text into an [`ElectionResultsData`](crate::models::ElectionResultsData):
//! - Parsers: pluggable row-parsing strategies, one results section each
//! - Aggregator: ordered parser registry, outcome classification and merge

pub mod aggregator;
pub mod parsers;

pub use aggregator::{DataAggregator, Evaluation, FailurePolicy, ResultsAggregator};
pub use parsers::{
    default_parsers, CandidateVotesParser, CsvParser, ParserOutcome, PrecinctVotesParser,
    TurnoutParser,
};
