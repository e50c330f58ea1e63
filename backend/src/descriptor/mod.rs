//! Blob identifier parsing.
//!
//! Blob names follow `<results_type>_<location>_<sequence>[.csv]`, for example
//! `provisional_cluj_1571513442.csv`. The routing metadata is advisory: the
//! processor tags the persisted record with it and falls back to
//! [`RoutingInfo::unknown`] when the name is malformed.

use crate::error::{ParseError, ParseResult};
use crate::models::RoutingInfo;

/// Token separator in blob identifiers.
pub const DELIMITER: char = '_';

/// Number of tokens in a well-formed identifier.
pub const EXPECTED_TOKENS: usize = 3;

/// Parse a blob identifier into routing metadata.
///
/// Leading path segments and a trailing `.csv` extension are ignored.
///
/// # Example
/// ```
/// use election_results::descriptor::parse_file_name;
///
/// let routing = parse_file_name("uploads/final_diaspora_42.csv").unwrap();
/// assert_eq!(routing.results_type, "final");
/// assert_eq!(routing.location, "diaspora");
/// assert_eq!(routing.sequence, 42);
/// ```
pub fn parse_file_name(identifier: &str) -> ParseResult<RoutingInfo> {
    let malformed = |reason: String| ParseError::MalformedIdentifier {
        identifier: identifier.to_string(),
        reason,
    };

    let base = identifier.rsplit('/').next().unwrap_or(identifier).trim();
    let stem = strip_csv_extension(base);

    let tokens: Vec<&str> = stem.split(DELIMITER).collect();
    if tokens.len() != EXPECTED_TOKENS {
        return Err(malformed(format!(
            "expected {} tokens separated by '{}', found {}",
            EXPECTED_TOKENS,
            DELIMITER,
            tokens.len()
        )));
    }

    let (results_type, location, sequence) = (tokens[0], tokens[1], tokens[2]);
    if results_type.is_empty() {
        return Err(malformed("results type is empty".to_string()));
    }
    if location.is_empty() {
        return Err(malformed("location is empty".to_string()));
    }
    let sequence = sequence
        .parse::<u64>()
        .map_err(|_| malformed(format!("sequence '{}' is not a number", sequence)))?;

    Ok(RoutingInfo {
        results_type: results_type.to_lowercase(),
        location: location.to_lowercase(),
        sequence,
    })
}

/// Parse an identifier, degrading to unknown routing on failure.
///
/// Returns the routing together with the error that caused the fallback, if any.
pub fn parse_or_unknown(identifier: &str) -> (RoutingInfo, Option<ParseError>) {
    match parse_file_name(identifier) {
        Ok(routing) => (routing, None),
        Err(err) => (RoutingInfo::unknown(), Some(err)),
    }
}

fn strip_csv_extension(name: &str) -> &str {
    match name.len().checked_sub(4) {
        Some(idx) if name.is_char_boundary(idx) && name[idx..].eq_ignore_ascii_case(".csv") => {
            &name[..idx]
        }
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_three_tokens() {
        let routing = parse_file_name("a_b_1").unwrap();
        assert_eq!(routing.results_type, "a");
        assert_eq!(routing.location, "b");
        assert_eq!(routing.sequence, 1);
    }

    #[test]
    fn test_strips_extension_and_path() {
        let routing = parse_file_name("container/PROVISIONAL_Cluj_1571513442.CSV").unwrap();
        assert_eq!(routing.results_type, "provisional");
        assert_eq!(routing.location, "cluj");
        assert_eq!(routing.sequence, 1571513442);
    }

    #[test]
    fn test_wrong_token_count() {
        let err = parse_file_name("a_b").unwrap_err();
        assert!(matches!(err, ParseError::MalformedIdentifier { .. }));
        assert!(err.to_string().contains("found 2"));

        assert!(parse_file_name("a_b_c_1").is_err());
        assert!(parse_file_name("").is_err());
    }

    #[test]
    fn test_non_numeric_sequence() {
        let err = parse_file_name("final_cluj_today").unwrap_err();
        assert!(err.to_string().contains("today"));
    }

    #[test]
    fn test_empty_tokens_rejected() {
        assert!(parse_file_name("_cluj_1").is_err());
        assert!(parse_file_name("final__1").is_err());
    }

    #[test]
    fn test_parse_or_unknown_degrades() {
        let (routing, err) = parse_or_unknown("not-a-blob-name");
        assert!(routing.is_unknown());
        assert!(err.is_some());

        let (routing, err) = parse_or_unknown("final_diaspora_3.csv");
        assert_eq!(routing.location, "diaspora");
        assert!(err.is_none());
    }
}
