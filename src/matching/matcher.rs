use super::similarity::{best_similarity, tokenize};
use crate::models::{FileRecord, MatchResult, Query, TagSet};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Ceiling for a term that is not a literal substring of the haystack
const PARTIAL_MATCH_CAP: f64 = 0.95;

/// Matcher tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct MatchSettings {
    /// Path scores at or above this skip the tag lookup
    #[validate(range(min = 0.0, max = 1.0))]
    pub confident_threshold: f64,

    /// Fuzzy similarities below this count as no match
    #[validate(range(min = 0.0, max = 1.0))]
    pub fuzzy_floor: f64,

    /// Whether tags are consulted at all
    pub tag_search_enabled: bool,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            confident_threshold: 0.8,
            fuzzy_floor: 0.6,
            tag_search_enabled: true,
        }
    }
}

/// Text a term is matched against
struct Haystack {
    text: String,
    tokens: Vec<String>,
}

impl Haystack {
    fn new(text: String) -> Self {
        let text = text.to_lowercase();
        let tokens = tokenize(&text);
        Self { text, tokens }
    }

    fn from_tags(tags: &TagSet) -> Self {
        let text = tags
            .iter()
            .map(|(k, v)| format!("{k} {v}"))
            .collect::<Vec<_>>()
            .join(" ");
        Self::new(text)
    }
}

/// Scores records against one query's terms
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    terms: Vec<String>,
    settings: MatchSettings,
}

impl PatternMatcher {
    pub fn new(query: &Query, settings: MatchSettings) -> Self {
        Self {
            terms: query.normalized_terms(),
            settings,
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// A query without terms matches everything
    pub fn matches_everything(&self) -> bool {
        self.terms.is_empty()
    }

    /// Score a record by its path alone
    pub fn match_path(&self, record: &FileRecord) -> MatchResult {
        if self.matches_everything() {
            return MatchResult::path_only(1.0, Vec::new());
        }

        let (score, matched_terms) = self.score(&Haystack::new(record.path.clone()));
        MatchResult::path_only(score, matched_terms)
    }

    /// Whether the tag score should be computed for this path result
    pub fn needs_tags(&self, result: &MatchResult) -> bool {
        self.settings.tag_search_enabled
            && !self.matches_everything()
            && result.path_score < self.settings.confident_threshold
    }

    /// Fold tag evidence into a path result
    pub fn apply_tags(&self, mut result: MatchResult, tags: &TagSet) -> MatchResult {
        if tags.is_empty() {
            result.tag_score = Some(0.0);
            return result;
        }

        let (tag_score, tag_terms) = self.score(&Haystack::from_tags(tags));
        result.tag_score = Some(tag_score);
        for term in tag_terms {
            if !result.matched_terms.contains(&term) {
                result.matched_terms.push(term);
            }
        }
        result
    }

    /// Full match using whatever tags the record already carries
    pub fn match_record(&self, record: &FileRecord) -> MatchResult {
        let result = self.match_path(record);
        match &record.tags {
            Some(tags) if self.needs_tags(&result) => self.apply_tags(result, tags),
            _ => result,
        }
    }

    /// Mean of the per-term scores plus the terms that scored
    fn score(&self, haystack: &Haystack) -> (f64, Vec<String>) {
        let mut total = 0.0;
        let mut matched = Vec::new();

        for term in &self.terms {
            let score = self.term_score(term, haystack);
            if score > 0.0 {
                matched.push(term.clone());
            }
            total += score;
        }

        (total / self.terms.len() as f64, matched)
    }

    fn term_score(&self, term: &str, haystack: &Haystack) -> f64 {
        if haystack.text.contains(term) {
            return 1.0;
        }

        let term_tokens = tokenize(term);
        if term_tokens.is_empty() {
            return 0.0;
        }

        let sum: f64 = term_tokens
            .iter()
            .map(|token| {
                if haystack.text.contains(token.as_str()) {
                    1.0
                } else {
                    let fuzzy = best_similarity(token, &haystack.tokens);
                    if fuzzy >= self.settings.fuzzy_floor {
                        fuzzy
                    } else {
                        0.0
                    }
                }
            })
            .sum();

        (sum / term_tokens.len() as f64).min(PARTIAL_MATCH_CAP)
    }
}
