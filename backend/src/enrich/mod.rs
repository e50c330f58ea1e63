//! Candidate enrichment.
//!
//! Merges the configured candidate roster into an aggregated record so that
//! downstream consumers always see the full slate:
//!
//! - roster candidates come first, in roster order, with votes from the tallies
//! - candidates present in the tallies but not on the roster are kept as stubs
//! - candidates already on the record but in neither are kept as they are
//!
//! The merge is idempotent for a given roster.

pub mod source;

use std::collections::HashSet;
use std::sync::Arc;

pub use source::{
    ElectionConfigurationSource, FileConfigurationSource, HttpConfigurationSource,
    StaticConfigurationSource,
};

use crate::api::logs::{log_info, log_success, log_warning};
use crate::error::{EnrichmentError, EnrichmentResult};
use crate::models::{Candidate, ElectionResultsData, CANDIDATES_SECTION};
use crate::processor::{Interrupted, ProcessContext};

/// Fetches the roster and merges it into results records.
#[derive(Clone)]
pub struct CandidateEnricher {
    source: Arc<dyn ElectionConfigurationSource>,
}

impl CandidateEnricher {
    pub fn new(source: Arc<dyn ElectionConfigurationSource>) -> Self {
        Self { source }
    }

    /// Fetch the roster under the caller's timeout/cancellation and merge it.
    pub async fn enrich(
        &self,
        data: ElectionResultsData,
        ctx: &ProcessContext,
    ) -> EnrichmentResult<ElectionResultsData> {
        log_info("Fetching candidate roster...");
        let roster = ctx
            .run(self.source.get_list_of_candidates())
            .await
            .map_err(|interrupted| match interrupted {
                Interrupted::TimedOut => EnrichmentError::Timeout,
                Interrupted::Cancelled => EnrichmentError::Cancelled,
            })??;

        if roster.is_empty() {
            log_warning("Candidate roster is empty");
        } else {
            log_success(format!("Roster has {} candidate(s)", roster.len()));
        }

        let enriched = merge_candidates(data, &roster);
        log_success(format!("Record carries {} candidate(s)", enriched.candidates.len()));
        Ok(enriched)
    }
}

/// Merge a roster into a record. Pure and idempotent.
pub fn merge_candidates(mut data: ElectionResultsData, roster: &[Candidate]) -> ElectionResultsData {
    let tallies = data
        .sections
        .get(CANDIDATES_SECTION)
        .cloned()
        .unwrap_or_default();
    let total = tallies.total();
    let existing = std::mem::take(&mut data.candidates);

    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<Candidate> = Vec::with_capacity(roster.len() + tallies.values.len());

    for candidate in roster {
        if seen.insert(candidate.id.clone()) {
            merged.push(candidate.clone());
        }
    }

    for id in tallies.values.keys() {
        if seen.insert(id.clone()) {
            let stub = existing
                .iter()
                .find(|c| c.id == *id)
                .cloned()
                .unwrap_or_else(|| Candidate::stub(id.as_str()));
            merged.push(stub);
        }
    }

    for candidate in existing {
        if seen.insert(candidate.id.clone()) {
            merged.push(candidate);
        }
    }

    for candidate in &mut merged {
        candidate.votes = tallies.get(&candidate.id);
        candidate.percentage = percentage(candidate.votes, total);
    }

    data.candidates = merged;
    data
}

/// Share of `total`, in percent, rounded to two decimals.
fn percentage(votes: u64, total: u128) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (votes as f64 * 10_000.0 / total as f64).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SectionTally, TURNOUT_SECTION};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn record_with_votes(votes: &[(&str, u64)]) -> ElectionResultsData {
        let mut tally = SectionTally::default();
        for (id, count) in votes {
            tally.add(*id, *count);
        }
        let mut data = ElectionResultsData::new();
        data.sections.insert(CANDIDATES_SECTION.into(), tally);
        data
    }

    fn roster() -> Vec<Candidate> {
        vec![
            Candidate::new("g2", "Ion Ionescu").with_party("PB"),
            Candidate::new("g1", "Ana Pop").with_party("PA"),
            Candidate::new("g3", "Maria Stan"),
        ]
    }

    #[test]
    fn test_roster_order_votes_and_zero_slate() {
        let data = merge_candidates(record_with_votes(&[("g1", 75), ("g2", 25)]), &roster());
        let ids: Vec<&str> = data.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["g2", "g1", "g3"]);
        assert_eq!(data.candidate("g1").unwrap().votes, 75);
        assert_eq!(data.candidate("g1").unwrap().percentage, 75.0);
        assert_eq!(data.candidate("g3").unwrap().votes, 0);
        assert_eq!(data.candidate("g3").unwrap().percentage, 0.0);
    }

    #[test]
    fn test_tally_candidates_missing_from_roster_kept_as_stubs() {
        let data = merge_candidates(record_with_votes(&[("g1", 1), ("g9", 2)]), &roster());
        let stub = data.candidate("g9").unwrap();
        assert_eq!(stub.name, "g9");
        assert_eq!(stub.votes, 2);
        assert_eq!(data.candidates.last().unwrap().id, "g9");
    }

    #[test]
    fn test_empty_roster_without_tallies_leaves_record_unchanged() {
        let mut data = ElectionResultsData::new();
        let mut turnout = SectionTally::default();
        turnout.add("ballots_cast", 10);
        data.sections.insert(TURNOUT_SECTION.into(), turnout);

        let enriched = merge_candidates(data.clone(), &[]);
        assert_eq!(enriched, data);
        assert!(enriched.candidates.is_empty());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let once = merge_candidates(record_with_votes(&[("g1", 3), ("g7", 4)]), &roster());
        let twice = merge_candidates(once.clone(), &roster());
        assert_eq!(once, twice);
        assert_eq!(twice.candidates.len(), 4);
    }

    #[test]
    fn test_duplicate_roster_entries_collapsed() {
        let mut dup = roster();
        dup.push(Candidate::new("g1", "Ana Pop (duplicate)"));
        let data = merge_candidates(record_with_votes(&[("g1", 1)]), &dup);
        assert_eq!(data.candidates.len(), 3);
        assert_eq!(data.candidate("g1").unwrap().name, "Ana Pop");
    }

    #[test]
    fn test_near_max_tallies_do_not_overflow_total() {
        let data = merge_candidates(record_with_votes(&[("c1", u64::MAX), ("c2", 1)]), &[]);
        assert_eq!(data.candidate("c1").unwrap().votes, u64::MAX);
        assert_eq!(data.candidate("c1").unwrap().percentage, 100.0);
        assert_eq!(data.candidate("c2").unwrap().percentage, 0.0);

        let data = merge_candidates(
            record_with_votes(&[("c1", u64::MAX), ("c2", u64::MAX)]),
            &[],
        );
        assert_eq!(data.candidate("c2").unwrap().percentage, 50.0);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(0, 0), 0.0);
    }

    struct SlowSource;

    #[async_trait::async_trait]
    impl ElectionConfigurationSource for SlowSource {
        async fn get_list_of_candidates(&self) -> EnrichmentResult<Vec<Candidate>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_enrich_times_out() {
        let enricher = CandidateEnricher::new(Arc::new(SlowSource));
        let ctx = ProcessContext::new().with_timeout(Duration::from_millis(10));
        let err = enricher
            .enrich(ElectionResultsData::new(), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichmentError::Timeout));
    }

    #[tokio::test]
    async fn test_enrich_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let enricher = CandidateEnricher::new(Arc::new(StaticConfigurationSource::default()));
        let ctx = ProcessContext::new().with_cancellation(token);
        let err = enricher
            .enrich(ElectionResultsData::new(), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichmentError::Cancelled));
    }

    #[tokio::test]
    async fn test_enrich_with_static_roster() {
        let enricher = CandidateEnricher::new(Arc::new(StaticConfigurationSource::new(roster())));
        let data = enricher
            .enrich(record_with_votes(&[("g1", 10)]), &ProcessContext::new())
            .await
            .unwrap();
        assert_eq!(data.candidates.len(), 3);
        assert_eq!(data.candidate("g1").unwrap().percentage, 100.0);
    }
}
