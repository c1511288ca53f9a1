//! Fuzzy name similarity and the name index built on top of it.
//!
//! Scores are on a 0-100 scale. Names are case-folded, stripped of diacritics
//! and punctuation before any engine sees them, and a "Family, Given" rendering
//! is also tried as "Given Family".

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Pluggable ratio backend. Both inputs are already normalized.
pub trait SimilarityEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Similarity ratio in `[0, 100]`.
    fn ratio(&self, a: &str, b: &str) -> f64;
}

/// Order-independent edit ratio: tokens are sorted before a normalized
/// Levenshtein comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSortRatio;

impl SimilarityEngine for TokenSortRatio {
    fn name(&self) -> &'static str {
        "token_sort"
    }

    fn ratio(&self, a: &str, b: &str) -> f64 {
        strsim::normalized_levenshtein(&sort_tokens(a), &sort_tokens(b)) * 100.0
    }
}

/// Character-bigram overlap (Sorensen-Dice). Sequence based, so it relies on
/// the reversed-name form for inverted orderings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BigramDice;

impl SimilarityEngine for BigramDice {
    fn name(&self) -> &'static str {
        "bigram"
    }

    fn ratio(&self, a: &str, b: &str) -> f64 {
        strsim::sorensen_dice(a, b) * 100.0
    }
}

/// Engine selector as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    #[default]
    TokenSort,
    Bigram,
}

impl EngineKind {
    #[must_use]
    pub fn build(self) -> Arc<dyn SimilarityEngine> {
        match self {
            Self::TokenSort => Arc::new(TokenSortRatio),
            Self::Bigram => Arc::new(BigramDice),
        }
    }
}

fn sort_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Case-folds, strips diacritics and punctuation, collapses whitespace.
#[must_use]
pub fn normalize(s: &str) -> String {
    s.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c.is_whitespace() {
                Some(' ')
            } else {
                None
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized forms of one name: as written, plus "Given Family" when the
/// source wrote "Family, Given".
#[derive(Debug, Clone, PartialEq, Eq)]
struct NameForms {
    forward: String,
    reversed: Option<String>,
}

impl NameForms {
    fn of(name: &str) -> Option<Self> {
        let forward = normalize(name);
        if forward.is_empty() {
            return None;
        }

        let reversed = name.split_once(',').and_then(|(family, given)| {
            let flipped = normalize(&format!("{given} {family}"));
            (!flipped.is_empty() && flipped != forward).then_some(flipped)
        });

        Some(Self { forward, reversed })
    }

    fn iter(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.forward.as_str()).chain(self.reversed.as_deref())
    }
}

/// Scores names with an injected [`SimilarityEngine`].
#[derive(Clone)]
pub struct NameMatcher {
    engine: Arc<dyn SimilarityEngine>,
}

impl fmt::Debug for NameMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameMatcher")
            .field("engine", &self.engine.name())
            .finish()
    }
}

impl Default for NameMatcher {
    fn default() -> Self {
        Self::new(Arc::new(TokenSortRatio))
    }
}

impl NameMatcher {
    #[must_use]
    pub fn new(engine: Arc<dyn SimilarityEngine>) -> Self {
        Self { engine }
    }

    #[must_use]
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Similarity of two names in `[0, 100]`, or `None` when either side is
    /// empty after normalization.
    ///
    /// ```rust
    /// use franchise_sync::matching::name::NameMatcher;
    ///
    /// let matcher = NameMatcher::default();
    /// let score = matcher.similarity("Kamado, Tanjiro", "Tanjiro Kamado").unwrap();
    /// assert!(score >= 95.0);
    /// assert!(matcher.similarity("", "Tanjiro Kamado").is_none());
    /// ```
    #[must_use]
    pub fn similarity(&self, a: &str, b: &str) -> Option<f64> {
        let a = NameForms::of(a)?;
        let b = NameForms::of(b)?;
        Some(self.score_forms(&a, &b))
    }

    /// Like [`similarity`](Self::similarity) but zero for empty input.
    #[must_use]
    pub fn score(&self, a: &str, b: &str) -> f64 {
        self.similarity(a, b).unwrap_or(0.0)
    }

    /// Best score of `target` against any of `candidates`.
    pub fn best_score<'a, I>(&self, target: &str, candidates: I) -> f64
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .map(|c| self.score(target, c))
            .fold(0.0, f64::max)
    }

    fn score_forms(&self, a: &NameForms, b: &NameForms) -> f64 {
        if a.iter().any(|x| b.iter().any(|y| x == y)) {
            return 100.0;
        }

        a.iter()
            .flat_map(|x| b.iter().map(move |y| (x, y)))
            .map(|(x, y)| self.engine.ratio(x, y))
            .fold(0.0, f64::max)
            .clamp(0.0, 100.0)
    }
}

/// Name → id index with exact-first lookup and a fuzzy fallback scan.
///
/// Exact lookups hit a hash map keyed by every normalized form of each added
/// name. Fuzzy lookups walk all entries and return the best scorer at or above
/// the caller's threshold. On ties the earliest added entry wins.
#[derive(Debug, Clone)]
pub struct NameIndex<T> {
    matcher: NameMatcher,
    exact: HashMap<String, T>,
    entries: Vec<(NameForms, T)>,
}

impl<T: Clone> NameIndex<T> {
    #[must_use]
    pub fn new(matcher: NameMatcher) -> Self {
        Self {
            matcher,
            exact: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Adds a name. Empty names are ignored; a form already claimed by an
    /// earlier entry keeps pointing at that entry.
    pub fn add(&mut self, name: &str, id: T) {
        let Some(forms) = NameForms::of(name) else {
            return;
        };

        for form in forms.iter() {
            self.exact
                .entry(form.to_string())
                .or_insert_with(|| id.clone());
        }
        self.entries.push((forms, id));
    }

    /// Best id at or above `threshold`, or `None`.
    #[must_use]
    pub fn lookup(&self, query: &str, threshold: f64) -> Option<T> {
        self.lookup_scored(query, threshold).map(|(id, _)| id)
    }

    /// Exact-normalized hit only.
    #[must_use]
    pub fn lookup_exact(&self, query: &str) -> Option<T> {
        let forms = NameForms::of(query)?;
        forms.iter().find_map(|form| self.exact.get(form).cloned())
    }

    /// Lookup returning the winning score alongside the id.
    #[must_use]
    pub fn lookup_scored(&self, query: &str, threshold: f64) -> Option<(T, f64)> {
        let forms = NameForms::of(query)?;

        if let Some(id) = forms.iter().find_map(|form| self.exact.get(form)) {
            return Some((id.clone(), 100.0));
        }

        let mut best: Option<(&T, f64)> = None;
        for (entry, id) in &self.entries {
            let score = self.matcher.score_forms(&forms, entry);
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((id, score));
            }
        }

        best.filter(|(_, score)| *score >= threshold)
            .map(|(id, score)| (id.clone(), score))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matchers() -> Vec<NameMatcher> {
        vec![
            NameMatcher::new(Arc::new(TokenSortRatio)),
            NameMatcher::new(Arc::new(BigramDice)),
        ]
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Kamado,   Tanjirō "), "kamado tanjiro");
        assert_eq!(normalize("Re:Zero!"), "rezero");
        assert_eq!(normalize("..."), "");
    }

    #[test]
    fn test_similarity_reflexive() {
        for matcher in matchers() {
            for name in ["Tanjiro Kamado", "Zenitsu", "花江夏樹", "Kana Hanazawa"] {
                assert_eq!(matcher.similarity(name, name), Some(100.0), "{name}");
            }
        }
    }

    #[test]
    fn test_similarity_name_inversion() {
        for matcher in matchers() {
            let score = matcher
                .similarity("Kamado, Tanjiro", "Tanjiro Kamado")
                .unwrap();
            assert!(score >= 95.0, "{} scored {score}", matcher.engine_name());
        }
    }

    #[test]
    fn test_similarity_unrelated_names() {
        for matcher in matchers() {
            let score = matcher
                .similarity("Muzan Kibutsuji", "Tanjiro Kamado")
                .unwrap();
            assert!(score < 40.0, "{} scored {score}", matcher.engine_name());
        }
    }

    #[test]
    fn test_similarity_empty_is_no_match() {
        let matcher = NameMatcher::default();
        assert_eq!(matcher.similarity("", "Tanjiro Kamado"), None);
        assert_eq!(matcher.similarity("Tanjiro Kamado", "  "), None);
        assert_eq!(matcher.similarity("!!", "?"), None);
        assert!(matcher.score("", "x").abs() < f64::EPSILON);
    }

    #[test]
    fn test_similarity_diacritics() {
        let matcher = NameMatcher::default();
        assert_eq!(matcher.similarity("Yūki Kaji", "Yuki Kaji"), Some(100.0));
    }

    #[test]
    fn test_index_reversed_exact_lookup() {
        let mut index = NameIndex::new(NameMatcher::default());
        index.add("Kamado, Tanjiro", 1);
        index.add("Hashibira, Inosuke", 2);
        index.add("Agatsuma, Zenitsu", 3);

        assert_eq!(index.lookup("Inosuke Hashibira", 80.0), Some(2));
        assert_eq!(index.lookup_exact("Tanjiro Kamado"), Some(1));
        assert_eq!(index.lookup("Muzan Kibutsuji", 80.0), None);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_index_fuzzy_lookup() {
        let mut index = NameIndex::new(NameMatcher::default());
        index.add("Zenitsu Agatsuma", "z");
        index.add("Kanao Tsuyuri", "k");

        assert_eq!(index.lookup("Zenitsu Agatuma", 80.0), Some("z"));
        assert_eq!(index.lookup("Zenitsu Agatuma", 99.0), None);
        assert!(index.lookup_exact("Zenitsu Agatuma").is_none());
    }

    #[test]
    fn test_index_empty_inputs() {
        let mut index: NameIndex<i32> = NameIndex::new(NameMatcher::default());
        index.add("", 1);
        assert!(index.is_empty());
        assert_eq!(index.lookup("", 0.0), None);
        assert_eq!(index.lookup("anyone", 0.0), None);
    }

    #[test]
    fn test_index_first_entry_keeps_exact_form() {
        let mut index = NameIndex::new(NameMatcher::default());
        index.add("Studio Pierrot", 1);
        index.add("studio pierrot", 2);
        assert_eq!(index.lookup("Studio Pierrot", 90.0), Some(1));
    }

    #[test]
    fn test_best_score() {
        let matcher = NameMatcher::default();
        let best = matcher.best_score("Attack on Titan", ["Shingeki no Kyojin", "Attack on Titan"]);
        assert!((best - 100.0).abs() < f64::EPSILON);
    }
}
