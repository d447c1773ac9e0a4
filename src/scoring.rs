use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::search::normalize_for_search;
use crate::types::{CategoryCandidate, CategoryHit};

const EXACT_MATCH_POINTS: f64 = 10.0;
const PARTIAL_MATCH_POINTS: f64 = 1.0;
const SIMILARITY_WEIGHT: f64 = 5.0;
const PARTIAL_MATCH_MIN_CHARS: usize = 3;

struct CategoryProfile {
    token_bag: HashSet<String>,
    flat_text: String,
}

impl CategoryProfile {
    fn new(category: &str) -> Self {
        let segments = category
            .split('>')
            .map(|segment| segment.trim().to_lowercase())
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<String>>();

        let token_bag = segments
            .iter()
            .flat_map(|segment| {
                normalize_for_search(segment)
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<String>>()
            })
            .collect::<HashSet<String>>();

        Self {
            token_bag,
            flat_text: segments.join(" "),
        }
    }
}

fn bigrams(text: &str) -> Vec<(char, char)> {
    let chars = text.chars().collect::<Vec<char>>();
    chars.windows(2).map(|pair| (pair[0], pair[1])).collect()
}

/// Dice coefficient over character bigrams, ignoring whitespace. Always in `[0, 1]`.
pub(crate) fn string_similarity(left: &str, right: &str) -> f64 {
    let left = left
        .chars()
        .filter(|character| !character.is_whitespace())
        .collect::<String>();
    let right = right
        .chars()
        .filter(|character| !character.is_whitespace())
        .collect::<String>();

    if left == right {
        return if left.is_empty() { 0.0 } else { 1.0 };
    }

    let left_bigrams = bigrams(&left);
    let right_bigrams = bigrams(&right);
    if left_bigrams.is_empty() || right_bigrams.is_empty() {
        return 0.0;
    }

    let mut counts = HashMap::<(char, char), usize>::new();
    for bigram in &left_bigrams {
        *counts.entry(*bigram).or_insert(0) += 1;
    }

    let mut intersection = 0_usize;
    for bigram in &right_bigrams {
        if let Some(count) = counts.get_mut(bigram) {
            if *count > 0 {
                *count -= 1;
                intersection += 1;
            }
        }
    }

    (2.0 * intersection as f64) / (left_bigrams.len() + right_bigrams.len()) as f64
}

fn score_candidate(
    raw_query: &str,
    tokens: &[String],
    candidate: CategoryCandidate,
) -> Option<CategoryHit> {
    let profile = CategoryProfile::new(&candidate.category);

    let mut score = 0.0;
    let mut exact_matches = 0_usize;
    let mut partial_matches = 0_usize;
    for token in tokens {
        if profile.token_bag.contains(token) {
            score += EXACT_MATCH_POINTS;
            exact_matches += 1;
        } else if token.chars().count() >= PARTIAL_MATCH_MIN_CHARS
            && profile.flat_text.contains(token.as_str())
        {
            score += PARTIAL_MATCH_POINTS;
            partial_matches += 1;
        }
    }

    // Similarity only reorders categories that matched at least one token.
    if exact_matches + partial_matches == 0 {
        return None;
    }

    let similarity = string_similarity(raw_query, &profile.flat_text);
    score += SIMILARITY_WEIGHT * similarity;

    Some(CategoryHit {
        category: candidate.category,
        imageurl: candidate.imageurl,
        comment: candidate.comment,
        exact_matches,
        partial_matches,
        score,
        similarity,
    })
}

fn compare_hits(left: &CategoryHit, right: &CategoryHit) -> Ordering {
    right
        .exact_matches
        .cmp(&left.exact_matches)
        .then(right.score.total_cmp(&left.score))
        .then(right.similarity.total_cmp(&left.similarity))
        .then(left.category.cmp(&right.category))
}

/// Scores every distinct category against the query and returns the matching
/// ones, best first.
pub(crate) fn rank_categories(
    raw_query: &str,
    tokens: &[String],
    candidates: Vec<CategoryCandidate>,
) -> Vec<CategoryHit> {
    if tokens.is_empty() {
        return Vec::new();
    }

    let raw_query = raw_query.trim().to_lowercase();
    let mut seen = HashSet::new();
    let distinct = candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.category.clone()))
        .collect::<Vec<CategoryCandidate>>();

    let mut hits = distinct
        .into_par_iter()
        .filter_map(|candidate| score_candidate(&raw_query, tokens, candidate))
        .collect::<Vec<CategoryHit>>();
    hits.sort_by(compare_hits);
    hits
}
