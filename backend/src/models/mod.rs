//! Domain models for the election results pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`RoutingInfo`] - Metadata parsed from a blob identifier
//! - [`SectionTally`] - One structured table of counts
//! - [`ResultsFragment`] - The sections a single row parser extracted
//! - [`ElectionResultsData`] - The aggregated, enriched results record
//! - [`Candidate`] - Candidate identity and vote totals
//! - [`ElectionStatistics`] - The envelope handed to the results repository

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Section key holding per-candidate vote tallies, keyed by candidate id.
pub const CANDIDATES_SECTION: &str = "candidates";

/// Section key holding turnout counters.
pub const TURNOUT_SECTION: &str = "turnout";

/// Placeholder used when a blob identifier cannot be parsed.
pub const UNKNOWN_ROUTING: &str = "unknown";

// =============================================================================
// Routing
// =============================================================================

/// Routing metadata carried by a blob identifier (`<type>_<location>_<sequence>`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoutingInfo {
    /// Results type, e.g. `provisional` or `final`.
    pub results_type: String,
    /// Location the blob covers, e.g. a county or `diaspora`.
    pub location: String,
    /// Upload sequence, usually a unix timestamp.
    pub sequence: u64,
}

impl RoutingInfo {
    /// Degraded routing used when the identifier is malformed.
    pub fn unknown() -> Self {
        Self {
            results_type: UNKNOWN_ROUTING.to_string(),
            location: UNKNOWN_ROUTING.to_string(),
            sequence: 0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.results_type == UNKNOWN_ROUTING && self.location == UNKNOWN_ROUTING
    }
}

// =============================================================================
// Tallies and fragments
// =============================================================================

/// A structured table of counts, e.g. votes per candidate or turnout counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SectionTally {
    /// Number of CSV data rows that contributed to this tally.
    pub rows: usize,
    /// Counter name to value, in key order.
    pub values: BTreeMap<String, u64>,
}

impl SectionTally {
    /// Add `amount` to the counter `key` and return the new value.
    ///
    /// Returns `None`, leaving the counter untouched, when the sum exceeds `u64::MAX`.
    pub fn add(&mut self, key: impl Into<String>, amount: u64) -> Option<u64> {
        let counter = self.values.entry(key.into()).or_insert(0);
        *counter = counter.checked_add(amount)?;
        Some(*counter)
    }

    pub fn get(&self, key: &str) -> u64 {
        self.values.get(key).copied().unwrap_or(0)
    }

    /// Sum of all counters. Wide enough that valid counters never overflow it.
    pub fn total(&self) -> u128 {
        self.values.values().map(|&v| u128::from(v)).sum()
    }
}

/// Partial results produced by a single row parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultsFragment {
    pub sections: BTreeMap<String, SectionTally>,
}

impl ResultsFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragment holding a single section.
    pub fn single(key: impl Into<String>, tally: SectionTally) -> Self {
        let mut fragment = Self::new();
        fragment.sections.insert(key.into(), tally);
        fragment
    }
}

// =============================================================================
// Candidate
// =============================================================================

/// A candidate on the ballot.
///
/// Identity fields come from the configured roster; `votes` and `percentage`
/// are derived from the [`CANDIDATES_SECTION`] tally during enrichment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Stable identifier, matches the keys of the candidates section.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Party or affiliation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    /// Portrait URL for UIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Total votes across all rows.
    #[serde(default)]
    pub votes: u64,
    /// Share of all candidate votes, in percent.
    #[serde(default)]
    pub percentage: f64,
}

impl Candidate {
    /// Create a candidate with no votes.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            party: None,
            image_url: None,
            votes: 0,
            percentage: 0.0,
        }
    }

    pub fn with_party(mut self, party: impl Into<String>) -> Self {
        self.party = Some(party.into());
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Stub for a candidate that appears in the tallies but not on the roster.
    pub fn stub(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), id)
    }
}

// =============================================================================
// Election results record
// =============================================================================

/// The aggregated results record for one blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResultsData {
    /// Section key to tally, in key order.
    pub sections: BTreeMap<String, SectionTally>,
    /// Full candidate slate.
    pub candidates: Vec<Candidate>,
}

impl ElectionResultsData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self, key: &str) -> Option<&SectionTally> {
        self.sections.get(key)
    }

    /// Candidate ids referenced by the candidates section, in id order.
    pub fn referenced_candidate_ids(&self) -> Vec<&str> {
        self.sections
            .get(CANDIDATES_SECTION)
            .map(|tally| tally.values.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn candidate(&self, id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == id)
    }
}

// =============================================================================
// Persisted envelope
// =============================================================================

/// The record handed to the results repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElectionStatistics {
    /// Unique record id (UUID v4).
    pub id: String,
    pub results_type: String,
    pub location: String,
    pub sequence: u64,
    /// Blob identifier as received.
    pub file_name: String,
    /// RFC 3339 timestamp of processing.
    pub processed_at: String,
    /// Canonical JSON of the finalized [`ElectionResultsData`].
    pub statistics_json: String,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_tally_add_and_total() {
        let mut tally = SectionTally::default();
        tally.add("c1", 10);
        tally.add("c2", 5);
        tally.add("c1", 2);
        assert_eq!(tally.get("c1"), 12);
        assert_eq!(tally.get("missing"), 0);
        assert_eq!(tally.total(), 17);
    }

    #[test]
    fn test_section_tally_overflow_leaves_counter() {
        let mut tally = SectionTally::default();
        assert_eq!(tally.add("c1", u64::MAX), Some(u64::MAX));
        assert_eq!(tally.add("c1", 1), None);
        assert_eq!(tally.get("c1"), u64::MAX);

        tally.add("c2", u64::MAX);
        assert_eq!(tally.total(), 2 * u128::from(u64::MAX));
    }

    #[test]
    fn test_referenced_candidate_ids_sorted() {
        let mut tally = SectionTally::default();
        tally.add("zeta", 1);
        tally.add("alpha", 1);
        let mut data = ElectionResultsData::new();
        data.sections.insert(CANDIDATES_SECTION.into(), tally);
        assert_eq!(data.referenced_candidate_ids(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_results_serialization_uses_camel_case() {
        let mut data = ElectionResultsData::new();
        data.candidates
            .push(Candidate::new("c1", "Ana Pop").with_image_url("https://img/1.png"));
        let json = serde_json::to_value(&data).unwrap();
        assert!(json["candidates"][0].get("imageUrl").is_some());
        assert!(json["candidates"][0].get("party").is_none());
        assert!(json["sections"].is_object());
    }

    #[test]
    fn test_unknown_routing() {
        assert!(RoutingInfo::unknown().is_unknown());
        let routing = RoutingInfo {
            results_type: "final".into(),
            location: "cluj".into(),
            sequence: 7,
        };
        assert!(!routing.is_unknown());
    }
}
