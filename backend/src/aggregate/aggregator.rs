//! Data aggregator: runs the registered row parsers and merges their fragments.
//!
//! Algorithm:
//! 1. Run every parser on the decoded content (sequentially, or on scoped
//!    threads with outcomes collected before merging)
//! 2. Walk the outcomes in registration order
//! 3. Merge matched fragments by section key; a key claimed twice is a conflict
//! 4. Apply the failure policy to hard parser failures
//! 5. Fail with `NoMatchingParser` when nothing matched

use std::collections::BTreeMap;

use super::parsers::{default_parsers, CsvParser, ParserOutcome};
use crate::api::logs::{log_info, log_success, log_warning};
use crate::error::{AggregationError, AggregationResult};
use crate::models::ElectionResultsData;

/// What to do when a parser recognises the content but fails on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Propagate the first hard failure.
    #[default]
    FailFast,
    /// Log the failure and treat the parser as not matching.
    SkipFailed,
}

impl FailurePolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "fail-fast" | "failfast" | "strict" => Some(Self::FailFast),
            "skip-failed" | "skip" | "lenient" => Some(Self::SkipFailed),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FailFast => "fail-fast",
            Self::SkipFailed => "skip-failed",
        }
    }
}

/// How parsers are evaluated. Merge order is registration order either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Evaluation {
    #[default]
    Sequential,
    Parallel,
}

impl Evaluation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "sequential" => Some(Self::Sequential),
            "parallel" => Some(Self::Parallel),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }
}

/// Anything that turns decoded CSV text into an [`ElectionResultsData`].
pub trait ResultsAggregator: Send + Sync {
    fn retrieve_election_data(&self, content: &str) -> AggregationResult<ElectionResultsData>;

    /// Names of the registered parsers, in registration order.
    fn parser_names(&self) -> Vec<String>;
}

/// Owns the ordered, non-empty set of row parsers.
pub struct DataAggregator {
    parsers: Vec<Box<dyn CsvParser>>,
    policy: FailurePolicy,
    evaluation: Evaluation,
}

impl std::fmt::Debug for DataAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataAggregator")
            .field("parsers", &self.parser_names())
            .field("policy", &self.policy)
            .field("evaluation", &self.evaluation)
            .finish()
    }
}

impl DataAggregator {
    /// Create an aggregator; an empty parser list is a configuration error.
    pub fn new(parsers: Vec<Box<dyn CsvParser>>) -> AggregationResult<Self> {
        if parsers.is_empty() {
            return Err(AggregationError::NoParsersRegistered);
        }
        Ok(Self {
            parsers,
            policy: FailurePolicy::default(),
            evaluation: Evaluation::default(),
        })
    }

    /// Aggregator with the built-in turnout and candidate parsers.
    pub fn with_default_parsers() -> Self {
        Self {
            parsers: default_parsers(),
            policy: FailurePolicy::default(),
            evaluation: Evaluation::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_evaluation(mut self, evaluation: Evaluation) -> Self {
        self.evaluation = evaluation;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn csv_parsers(&self) -> impl Iterator<Item = &dyn CsvParser> {
        self.parsers.iter().map(|p| p.as_ref())
    }

    /// Run every parser and return the outcomes in registration order.
    pub fn evaluate(&self, content: &str) -> Vec<(&str, ParserOutcome)> {
        match self.evaluation {
            Evaluation::Sequential => self
                .parsers
                .iter()
                .map(|p| (p.name(), ParserOutcome::from(p.try_parse(content))))
                .collect(),
            Evaluation::Parallel => std::thread::scope(|scope| {
                let handles: Vec<_> = self
                    .parsers
                    .iter()
                    .map(|p| {
                        let parser = p.as_ref();
                        (
                            parser.name(),
                            scope.spawn(move || ParserOutcome::from(parser.try_parse(content))),
                        )
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|(name, handle)| {
                        let outcome = handle
                            .join()
                            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
                        (name, outcome)
                    })
                    .collect()
            }),
        }
    }

    /// Merge outcomes, in order, into one record.
    fn merge(&self, outcomes: Vec<(&str, ParserOutcome)>) -> AggregationResult<ElectionResultsData> {
        let mut data = ElectionResultsData::new();
        let mut owners: BTreeMap<String, String> = BTreeMap::new();
        let mut matched = 0usize;

        for (name, outcome) in outcomes {
            match outcome {
                ParserOutcome::Matched(fragment) => {
                    matched += 1;
                    for (section, tally) in fragment.sections {
                        if let Some(first) = owners.get(&section) {
                            return Err(AggregationError::ConflictingSections {
                                section,
                                first: first.clone(),
                                second: name.to_string(),
                            });
                        }
                        log_success(format!(
                            "Parser '{}' produced section '{}' ({} rows)",
                            name, section, tally.rows
                        ));
                        owners.insert(section.clone(), name.to_string());
                        data.sections.insert(section, tally);
                    }
                }
                ParserOutcome::NotApplicable => {
                    log_info(format!("Parser '{}' not applicable", name));
                }
                ParserOutcome::Failed(source) => match self.policy {
                    FailurePolicy::FailFast => {
                        return Err(AggregationError::ParserFailed {
                            parser: name.to_string(),
                            source,
                        });
                    }
                    FailurePolicy::SkipFailed => {
                        log_warning(format!("Parser '{}' failed, skipping: {}", name, source));
                    }
                },
            }
        }

        if matched == 0 {
            return Err(AggregationError::NoMatchingParser);
        }
        Ok(data)
    }
}

impl ResultsAggregator for DataAggregator {
    fn retrieve_election_data(&self, content: &str) -> AggregationResult<ElectionResultsData> {
        log_info(format!(
            "Applying {} parser(s) to {} bytes of CSV",
            self.parsers.len(),
            content.len()
        ));
        let outcomes = self.evaluate(content);
        self.merge(outcomes)
    }

    fn parser_names(&self) -> Vec<String> {
        self.parsers.iter().map(|p| p.name().to_string()).collect()
    }
}
