//! Query-to-record matching over paths and tags.
//!
//! Each term scores 1.0 when it is a case-insensitive substring of the path
//! (or of the joined tag keys and values). Otherwise its tokens are compared
//! against the haystack tokens by substring and normalized edit distance,
//! with similarities below the fuzzy floor discarded. The record score is
//! the mean over terms, so partial coverage lowers the score instead of
//! dropping the record.

mod matcher;
mod similarity;

pub use matcher::{MatchSettings, PatternMatcher};
pub use similarity::{levenshtein, similarity, tokenize};
