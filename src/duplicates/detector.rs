//! Scores pairs of transactions that look like the same real-world payment.
//!
//! Two transactions are only compared when they have the same amount to the
//! cent and their dates are at most `window_days` apart. The score is the mean
//! of a text similarity of the descriptions and a date proximity score.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::{Error, transaction::Transaction};

/// The default maximum number of days between two duplicates.
pub const DEFAULT_WINDOW_DAYS: i64 = 3;
/// The largest accepted `window_days`.
pub const MAX_WINDOW_DAYS: i64 = 365;
/// The default minimum score for a pair to be reported.
pub const DEFAULT_THRESHOLD: f64 = 0.75;

/// The tuning knobs of the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorOptions {
    /// The maximum number of days between the dates of a pair.
    pub window_days: i64,
    /// The minimum score, between zero and one, for a pair to be reported.
    pub threshold: f64,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl DetectorOptions {
    /// Build options from optional request values, filling in defaults.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidQuery] if `window_days` is not between zero and
    /// [MAX_WINDOW_DAYS] or `threshold` is not between zero and one.
    pub fn new(window_days: Option<i64>, threshold: Option<f64>) -> Result<Self, Error> {
        let window_days = window_days.unwrap_or(DEFAULT_WINDOW_DAYS);
        let threshold = threshold.unwrap_or(DEFAULT_THRESHOLD);

        if !(0..=MAX_WINDOW_DAYS).contains(&window_days) {
            return Err(Error::InvalidQuery(format!(
                "window_days must be between 0 and {MAX_WINDOW_DAYS}"
            )));
        }

        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidQuery(
                "threshold must be between 0 and 1".to_owned(),
            ));
        }

        Ok(Self {
            window_days,
            threshold,
        })
    }
}

/// Two transactions that are probably the same payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicatePair {
    /// The transaction with the lower ID.
    pub first: Transaction,
    /// The transaction with the higher ID.
    pub second: Transaction,
    /// The combined score between zero and one.
    pub score: f64,
    /// How alike the descriptions are, between zero and one.
    pub text_similarity: f64,
    /// How close the dates are, between zero and one.
    pub date_score: f64,
    /// The number of days between the two dates.
    pub days_apart: i64,
}

/// Lowercase `text`, turn anything that is not a letter or digit into a
/// space and collapse runs of whitespace.
pub fn normalize_description(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|character| {
            if character.is_alphanumeric() {
                character
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn grapheme_bigrams(text: &str) -> Vec<String> {
    let graphemes: Vec<&str> = text.graphemes(true).collect();

    graphemes
        .windows(2)
        .map(|pair| pair.concat())
        .collect()
}

/// The Dice coefficient of the grapheme bigrams of two normalized strings,
/// ignoring spaces.
pub fn bigram_similarity(a: &str, b: &str) -> f64 {
    let a: String = a.chars().filter(|character| *character != ' ').collect();
    let b: String = b.chars().filter(|character| *character != ' ').collect();

    if a.graphemes(true).count() < 2 && b.graphemes(true).count() < 2 {
        return if a == b { 1.0 } else { 0.0 };
    }

    let a_bigrams = grapheme_bigrams(&a);
    let b_bigrams = grapheme_bigrams(&b);

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for bigram in &a_bigrams {
        *counts.entry(bigram.as_str()).or_default() += 1;
    }

    let mut shared = 0;
    for bigram in &b_bigrams {
        match counts.get_mut(bigram.as_str()) {
            Some(count) if *count > 0 => {
                *count -= 1;
                shared += 1;
            }
            _ => {}
        }
    }

    (2 * shared) as f64 / (a_bigrams.len() + b_bigrams.len()) as f64
}

/// The number of grapheme insertions, deletions and substitutions that turn
/// `a` into `b`.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<&str> = a.graphemes(true).collect();
    let b: Vec<&str> = b.graphemes(true).collect();

    if a.is_empty() {
        return b.len();
    }

    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, a_grapheme) in a.iter().enumerate() {
        current[0] = i + 1;

        for (j, b_grapheme) in b.iter().enumerate() {
            let substitution_cost = usize::from(a_grapheme != b_grapheme);

            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + substitution_cost);
        }

        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// `1 - distance / max_len`, or one when both strings are empty.
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.graphemes(true).count().max(b.graphemes(true).count());

    if max_len == 0 {
        return 1.0;
    }

    1.0 - levenshtein_distance(a, b) as f64 / max_len as f64
}

/// The Jaccard index of the word sets of two normalized strings.
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let a_words: HashSet<&str> = a.split_whitespace().collect();
    let b_words: HashSet<&str> = b.split_whitespace().collect();

    if a_words.is_empty() && b_words.is_empty() {
        return 1.0;
    }

    let intersection = a_words.intersection(&b_words).count();
    let union = a_words.union(&b_words).count();

    intersection as f64 / union as f64
}

/// The mean of the bigram, Levenshtein and word overlap similarities of two
/// descriptions.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_description(a);
    let b = normalize_description(b);

    (bigram_similarity(&a, &b) + levenshtein_similarity(&a, &b) + word_overlap(&a, &b)) / 3.0
}

/// `1 - days_apart / (window_days + 1)`.
pub fn date_score(days_apart: i64, window_days: i64) -> f64 {
    1.0 - days_apart as f64 / window_days.saturating_add(1) as f64
}

fn amount_in_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Find the pairs of `transactions` that score at least `options.threshold`.
///
/// Pairs are sorted by score, highest first, then by the ID of the earlier
/// transaction.
pub fn find_duplicates(transactions: &[Transaction], options: DetectorOptions) -> Vec<DuplicatePair> {
    let mut buckets: HashMap<i64, Vec<&Transaction>> = HashMap::new();
    for transaction in transactions {
        buckets
            .entry(amount_in_cents(transaction.amount))
            .or_default()
            .push(transaction);
    }

    let mut pairs = Vec::new();

    for bucket in buckets.values() {
        for (i, a) in bucket.iter().enumerate() {
            for b in &bucket[i + 1..] {
                let days_apart = (a.date - b.date).whole_days().abs();

                if days_apart > options.window_days {
                    continue;
                }

                let text_similarity = text_similarity(&a.description, &b.description);
                let date_score = date_score(days_apart, options.window_days);
                let score = (text_similarity + date_score) / 2.0;

                if score < options.threshold {
                    continue;
                }

                let (first, second) = if a.id <= b.id { (a, b) } else { (b, a) };

                pairs.push(DuplicatePair {
                    first: (*first).clone(),
                    second: (*second).clone(),
                    score,
                    text_similarity,
                    date_score,
                    days_apart,
                });
            }
        }
    }

    pairs.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.first.id.cmp(&b.first.id))
            .then(a.second.id.cmp(&b.second.id))
    });

    pairs
}
