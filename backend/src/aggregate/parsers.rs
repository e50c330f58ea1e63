//! Row parsers: pluggable strategies extracting one section of the results.
//!
//! Each parser looks at the header row to decide whether the content is in
//! its format. Content in another format yields [`ParseError::NotApplicable`];
//! a recognised table with bad rows yields a hard error.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ParseError, ParseResult};
use crate::models::{ResultsFragment, SectionTally, CANDIDATES_SECTION, TURNOUT_SECTION};
use crate::parser::CsvTable;

/// Per-precinct candidate vote columns (`g1`, `g2`, ...).
static CANDIDATE_COLUMN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^g\d+$").expect("valid candidate column pattern"));

/// Add one cell to a tally; a sum past `u64::MAX` is a row error.
fn add_cell(
    tally: &mut SectionTally,
    key: &str,
    amount: u64,
    line: usize,
    column: &str,
) -> ParseResult<()> {
    match tally.add(key, amount) {
        Some(_) => Ok(()),
        None => Err(ParseError::InvalidRow {
            line,
            column: column.to_string(),
            message: "tally overflows".to_string(),
        }),
    }
}

/// A strategy that extracts a results fragment from decoded CSV text.
///
/// Implementations must be deterministic and free of I/O.
pub trait CsvParser: Send + Sync {
    /// Name used in logs and conflict reports.
    fn name(&self) -> &str;

    /// Try to extract a fragment from `content`.
    fn try_parse(&self, content: &str) -> ParseResult<ResultsFragment>;
}

/// Classified result of running one parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ParserOutcome {
    Matched(ResultsFragment),
    NotApplicable,
    Failed(ParseError),
}

impl From<ParseResult<ResultsFragment>> for ParserOutcome {
    fn from(result: ParseResult<ResultsFragment>) -> Self {
        match result {
            Ok(fragment) => ParserOutcome::Matched(fragment),
            Err(err) if err.is_not_applicable() => ParserOutcome::NotApplicable,
            Err(err) => ParserOutcome::Failed(err),
        }
    }
}

/// The parsers shipped with the binary, in registration order.
pub fn default_parsers() -> Vec<Box<dyn CsvParser>> {
    vec![
        Box::new(TurnoutParser),
        Box::new(CandidateVotesParser),
        Box::new(PrecinctVotesParser),
    ]
}

// =============================================================================
// Turnout
// =============================================================================

/// Sums turnout counters into the `turnout` section.
///
/// Requires `registered_voters` and `ballots_cast`; `valid_votes` and
/// `null_votes` are summed when present.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnoutParser;

impl TurnoutParser {
    const REQUIRED: [&'static str; 2] = ["registered_voters", "ballots_cast"];
    const OPTIONAL: [&'static str; 2] = ["valid_votes", "null_votes"];
}

impl CsvParser for TurnoutParser {
    fn name(&self) -> &str {
        "turnout"
    }

    fn try_parse(&self, content: &str) -> ParseResult<ResultsFragment> {
        let table = CsvTable::parse(content)?;
        if !table.has_columns(&Self::REQUIRED) {
            return Err(ParseError::NotApplicable);
        }

        let columns: Vec<(&str, usize)> = Self::REQUIRED
            .iter()
            .chain(Self::OPTIONAL.iter())
            .filter_map(|name| table.column(name).map(|idx| (*name, idx)))
            .collect();

        let mut tally = SectionTally::default();
        for (name, _) in &columns {
            tally.values.insert((*name).to_string(), 0);
        }
        for row in &table.rows {
            for (name, idx) in &columns {
                add_cell(&mut tally, name, table.count(row, *idx)?, row.line, name)?;
            }
            tally.rows += 1;
        }

        let registered = tally.get("registered_voters");
        let cast = tally.get("ballots_cast");
        if cast > registered {
            return Err(ParseError::InvalidRow {
                line: table.rows.last().map(|r| r.line).unwrap_or(1),
                column: "ballots_cast".to_string(),
                message: format!(
                    "{} ballots cast exceed {} registered voters",
                    cast, registered
                ),
            });
        }

        Ok(ResultsFragment::single(TURNOUT_SECTION, tally))
    }
}

// =============================================================================
// Candidate votes (long format)
// =============================================================================

/// One row per candidate (and optionally per precinct): `candidate_id,votes`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateVotesParser;

impl CsvParser for CandidateVotesParser {
    fn name(&self) -> &str {
        "candidate-votes"
    }

    fn try_parse(&self, content: &str) -> ParseResult<ResultsFragment> {
        let table = CsvTable::parse(content)?;
        let (Some(id_col), Some(votes_col)) = (table.column("candidate_id"), table.column("votes"))
        else {
            return Err(ParseError::NotApplicable);
        };

        let mut tally = SectionTally::default();
        for row in &table.rows {
            let id = table.value(row, id_col);
            if id.is_empty() {
                return Err(ParseError::InvalidRow {
                    line: row.line,
                    column: "candidate_id".to_string(),
                    message: "candidate id is empty".to_string(),
                });
            }
            add_cell(&mut tally, id, table.count(row, votes_col)?, row.line, "votes")?;
            tally.rows += 1;
        }

        Ok(ResultsFragment::single(CANDIDATES_SECTION, tally))
    }
}

// =============================================================================
// Precinct votes (wide format)
// =============================================================================

/// One row per precinct with a vote column per candidate (`g1..gN`).
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecinctVotesParser;

impl CsvParser for PrecinctVotesParser {
    fn name(&self) -> &str {
        "precinct-votes"
    }

    fn try_parse(&self, content: &str) -> ParseResult<ResultsFragment> {
        let table = CsvTable::parse(content)?;
        if table.column("precinct").is_none() {
            return Err(ParseError::NotApplicable);
        }

        let candidate_columns: Vec<(usize, &str)> = table
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| CANDIDATE_COLUMN.is_match(h))
            .map(|(idx, h)| (idx, h.as_str()))
            .collect();
        if candidate_columns.is_empty() {
            return Err(ParseError::NotApplicable);
        }

        let mut tally = SectionTally::default();
        for (_, id) in &candidate_columns {
            tally.values.insert((*id).to_string(), 0);
        }
        for row in &table.rows {
            for (idx, id) in &candidate_columns {
                add_cell(&mut tally, id, table.count(row, *idx)?, row.line, id)?;
            }
            tally.rows += 1;
        }

        Ok(ResultsFragment::single(CANDIDATES_SECTION, tally))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turnout_sums_columns() {
        let csv = "precinct;registered_voters;ballots_cast;valid_votes\n1;100;60;58\n2;200;150;149";
        let fragment = TurnoutParser.try_parse(csv).unwrap();
        let tally = &fragment.sections[TURNOUT_SECTION];
        assert_eq!(tally.rows, 2);
        assert_eq!(tally.get("registered_voters"), 300);
        assert_eq!(tally.get("ballots_cast"), 210);
        assert_eq!(tally.get("valid_votes"), 207);
        assert!(!tally.values.contains_key("null_votes"));
    }

    #[test]
    fn test_turnout_not_applicable() {
        let result = TurnoutParser.try_parse("candidate_id,votes\nc1,4");
        assert_eq!(result, Err(ParseError::NotApplicable));
        assert_eq!(TurnoutParser.try_parse(""), Err(ParseError::NotApplicable));
    }

    #[test]
    fn test_turnout_rejects_more_ballots_than_voters() {
        let err = TurnoutParser
            .try_parse("registered_voters,ballots_cast\n10,11")
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidRow { .. }));
    }

    #[test]
    fn test_candidate_votes_grouped_by_id() {
        let csv = "precinct,candidate_id,votes\n1,c1,10\n1,c2,5\n2,c1,7";
        let fragment = CandidateVotesParser.try_parse(csv).unwrap();
        let tally = &fragment.sections[CANDIDATES_SECTION];
        assert_eq!(tally.rows, 3);
        assert_eq!(tally.get("c1"), 17);
        assert_eq!(tally.get("c2"), 5);
    }

    #[test]
    fn test_candidate_votes_hard_failure_on_bad_count() {
        let err = CandidateVotesParser
            .try_parse("candidate_id,votes\nc1,ten")
            .unwrap_err();
        match err {
            ParseError::InvalidRow { line, column, .. } => {
                assert_eq!(line, 2);
                assert_eq!(column, "votes");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_candidate_votes_overflowing_tally() {
        let csv = format!("candidate_id,votes\nc1,{}\nc1,1", u64::MAX);
        let err = CandidateVotesParser.try_parse(&csv).unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidRow {
                line: 3,
                column: "votes".to_string(),
                message: "tally overflows".to_string(),
            }
        );
    }

    #[test]
    fn test_turnout_and_precinct_overflow_are_row_errors() {
        let max = u64::MAX;
        let turnout = format!("registered_voters,ballots_cast\n{max},1\n1,1");
        assert!(matches!(
            TurnoutParser.try_parse(&turnout),
            Err(ParseError::InvalidRow { line: 3, .. })
        ));

        let precinct = format!("precinct,g1\n1,{max}\n2,{max}");
        match PrecinctVotesParser.try_parse(&precinct).unwrap_err() {
            ParseError::InvalidRow { column, .. } => assert_eq!(column, "g1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_candidate_votes_empty_id() {
        let err = CandidateVotesParser
            .try_parse("candidate_id,votes\n,3")
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidRow { .. }));
    }

    #[test]
    fn test_precinct_votes_wide_format() {
        let csv = "precinct;g1;g2;g10\n1;3;4;0\n2;1;1;2";
        let fragment = PrecinctVotesParser.try_parse(csv).unwrap();
        let tally = &fragment.sections[CANDIDATES_SECTION];
        assert_eq!(tally.get("g1"), 4);
        assert_eq!(tally.get("g2"), 5);
        assert_eq!(tally.get("g10"), 2);
        assert_eq!(tally.rows, 2);
    }

    #[test]
    fn test_precinct_votes_needs_candidate_columns() {
        let result = PrecinctVotesParser.try_parse("precinct,registered_voters\n1,5");
        assert_eq!(result, Err(ParseError::NotApplicable));
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(
            ParserOutcome::from(Err(ParseError::NotApplicable)),
            ParserOutcome::NotApplicable
        );
        let failed = ParserOutcome::from(Err(ParseError::InvalidCsv("bad".into())));
        assert!(matches!(failed, ParserOutcome::Failed(_)));
    }

    #[test]
    fn test_default_parser_names_unique() {
        let parsers = default_parsers();
        let mut names: Vec<&str> = parsers.iter().map(|p| p.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 3);
    }
}
