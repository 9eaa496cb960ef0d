//! Cross-backend merge: dedup, association, scoring, ordering.
//!
//! Every step is order-independent, so backends may complete in any order
//! and still produce an identical ranked list.

use crate::association::AssociationDetector;
use crate::models::{AssociationGroup, MatchedRecord, RecordKey, ScoredGroup};
use crate::scoring::{rank, RelevanceScorer};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Ranked groups plus the pre-truncation count
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    pub results: Vec<ScoredGroup>,
    pub total_groups: usize,
}

/// Preference between two matches of the same record
fn better(candidate: &MatchedRecord, current: &MatchedRecord) -> bool {
    let a = &candidate.result;
    let b = &current.result;
    a.score()
        .total_cmp(&b.score())
        .then_with(|| a.tag_score.is_some().cmp(&b.tag_score.is_some()))
        .then_with(|| a.matched_terms.cmp(&b.matched_terms))
        == Ordering::Greater
}

/// Deduplicated records grouped per backend, with each record's match score
#[derive(Debug, Clone, Default)]
pub struct Merged {
    pub groups: Vec<AssociationGroup>,
    pub match_quality: BTreeMap<RecordKey, f64>,
}

/// Deduplicate by `(backend_id, path)` and run association per backend
pub fn merge<I>(matches: I) -> Merged
where
    I: IntoIterator<Item = MatchedRecord>,
{
    let mut unique: BTreeMap<RecordKey, MatchedRecord> = BTreeMap::new();
    for candidate in matches {
        let key = candidate.record.key();
        match unique.get(&key) {
            Some(current) if !better(&candidate, current) => {}
            _ => {
                unique.insert(key, candidate);
            }
        }
    }

    let match_quality = unique
        .iter()
        .map(|(key, matched)| (key.clone(), matched.result.score()))
        .collect();
    let records = unique.into_values().map(|m| m.record).collect();

    Merged {
        groups: AssociationDetector::new().group(records),
        match_quality,
    }
}

/// Score every group, sort into result order and truncate
pub fn score_and_rank(merged: Merged, scorer: &RelevanceScorer, max_results: usize) -> Ranked {
    let Merged {
        groups,
        match_quality,
    } = merged;

    let mut results: Vec<ScoredGroup> = groups
        .into_iter()
        .map(|group| {
            let quality = match_quality
                .get(&group.primary.key())
                .copied()
                .unwrap_or(0.0);
            scorer.score(group, quality)
        })
        .collect();

    rank(&mut results);
    let total_groups = results.len();
    results.truncate(max_results);

    Ranked {
        results,
        total_groups,
    }
}

/// [`merge`] followed by [`score_and_rank`]
pub fn merge_and_rank<I>(matches: I, scorer: &RelevanceScorer, max_results: usize) -> Ranked
where
    I: IntoIterator<Item = MatchedRecord>,
{
    score_and_rank(merge(matches), scorer, max_results)
}
